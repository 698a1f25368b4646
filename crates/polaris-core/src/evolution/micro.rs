//! Micro-evolution: a lesson extracted from a single chat turn (spec.md
//! §4.6). Runs after every `ProcessChatInteraction`, independent of it.

use crate::error::IngestResult;
use crate::model::stable_id;

use super::EvolutionService;

const MICRO_EVOLUTION_SYSTEM_PROMPT: &str = "You review one conversation turn for a durable \
    lesson about the user's working style or strategy. If there is nothing worth remembering, \
    reply with exactly PASS. Otherwise reply with three lines:\n\
    TRIGGER: <the situation that prompted this>\n\
    INSIGHT: <what you learned about the user>\n\
    STRATEGY: <a concrete, reusable strategy>";

impl EvolutionService {
    /// On non-`PASS`, persists the lesson as an Experience in both stores.
    /// Returns `true` if a lesson was recorded.
    pub async fn micro_evolve(
        &self,
        user_id: &str,
        user_query: &str,
        ai_response: &str,
        feedback: Option<&str>,
    ) -> IngestResult<bool> {
        let mut turn = format!("User: {user_query}\nAssistant: {ai_response}");
        if let Some(feedback) = feedback {
            turn.push_str(&format!("\nFeedback: {feedback}"));
        }

        let raw = self.perception.complete_raw(MICRO_EVOLUTION_SYSTEM_PROMPT, &turn).await;
        if raw.trim().eq_ignore_ascii_case("PASS") || raw.trim().is_empty() {
            return Ok(false);
        }

        let Some((trigger, insight, strategy)) = parse_lesson(&raw) else {
            tracing::warn!("micro-evolution response did not match the expected shape, discarding");
            return Ok(false);
        };

        persist_experience(self, user_id, &trigger, &insight, &strategy).await?;
        Ok(true)
    }
}

/// Shared by micro- and nightly-evolution: embeds `insight + strategy` and
/// writes the Experience to both the graph and the experience collection.
pub(super) async fn persist_experience(
    service: &EvolutionService,
    user_id: &str,
    trigger: &str,
    insight: &str,
    strategy: &str,
) -> IngestResult<()> {
    let id = stable_id(&format!("{user_id}:{trigger}:{insight}:{strategy}"));
    service.graph.add_experience(user_id, &id, trigger, insight, strategy)?;

    let text = format!("{insight}\n{strategy}");
    let embeddings = service.perception.embed_batch(vec![text.clone()]).await;
    if let Some(embedding) = embeddings.into_iter().next() {
        if let Err(e) = service.vectors.add_experience_vector(&id, &text, embedding) {
            tracing::warn!(error = %e, id, "failed to write experience vector");
        }
    }
    Ok(())
}

/// Parses the `TRIGGER:`/`INSIGHT:`/`STRATEGY:` line shape. Any missing
/// line means the response is unusable.
pub(super) fn parse_lesson(raw: &str) -> Option<(String, String, String)> {
    let mut trigger = None;
    let mut insight = None;
    let mut strategy = None;
    for line in raw.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("TRIGGER:") {
            trigger = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("INSIGHT:") {
            insight = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("STRATEGY:") {
            strategy = Some(rest.trim().to_string());
        }
    }
    match (trigger, insight, strategy) {
        (Some(t), Some(i), Some(s)) if !t.is_empty() && !i.is_empty() && !s.is_empty() => Some((t, i, s)),
        _ => None,
    }
}
