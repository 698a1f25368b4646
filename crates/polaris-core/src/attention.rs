//! Attention filter (spec.md §4.5) — shared by the Ingestion Orchestrator's
//! map phase and the Memory Service's per-turn procedure. Decides whether a
//! piece of text is worth the cost of an LLM extraction call.

const STOP_PHRASES: &[&str] = &[
    "ok", "okay", "thanks", "thank you", "bye", "goodbye", "yes", "no", "sure", "cool", "nice",
    "got it", "sounds good",
];

const LOGICAL_MARKERS: &[&str] = &[
    "because", "so", "if", "define", "therefore", "since", "which means", "in order to",
];

/// Word-boundary regex over `LOGICAL_MARKERS`, built once. Plain substring
/// matching would false-positive on words like "lesson" (contains "so") or
/// "chief" (contains "if"), so markers are matched as whole words.
fn logical_marker_regex() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        let pattern = LOGICAL_MARKERS
            .iter()
            .map(|m| regex::escape(m))
            .collect::<Vec<_>>()
            .join("|");
        regex::Regex::new(&format!(r"\b(?:{pattern})\b")).expect("logical marker pattern is valid")
    })
}

/// Accepts text only if it is long enough, not a bare acknowledgement, and
/// carries either a configured strategic keyword or a logical marker.
pub fn passes(text: &str, core_keywords: &[String]) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < 20 {
        return false;
    }
    let lower = trimmed.to_lowercase();
    if STOP_PHRASES.contains(&lower.as_str()) {
        return false;
    }
    let has_keyword = core_keywords.iter().any(|kw| lower.contains(&kw.to_lowercase()));
    let has_marker = logical_marker_regex().is_match(&lower);
    has_keyword || has_marker
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords() -> Vec<String> {
        vec!["goal".to_string(), "project".to_string()]
    }

    #[test]
    fn rejects_short_text() {
        assert!(!passes("hi there", &keywords()));
    }

    #[test]
    fn rejects_stop_phrase() {
        assert!(!passes("  Thanks  ", &keywords()));
    }

    #[test]
    fn accepts_text_with_core_keyword() {
        assert!(passes("I want to finish this project by Friday", &keywords()));
    }

    #[test]
    fn accepts_text_with_logical_marker_even_without_keyword() {
        assert!(passes("I skipped the gym today because I was exhausted", &keywords()));
    }

    #[test]
    fn rejects_long_text_with_neither_keyword_nor_marker() {
        assert!(!passes("The weather has been pretty mild around here lately.", &keywords()));
    }

    #[test]
    fn marker_match_is_whole_word_not_substring() {
        // "lesson" contains "so"; "chief" contains "if" — neither should trigger.
        assert!(!passes("That lesson from the chief engineer stuck with me quite a bit.", &keywords()));
    }
}
