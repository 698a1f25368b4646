//! File-type parser dispatch (spec.md §4.4 step 1).
//!
//! Produces a list of logical documents — not yet character-chunked — one
//! per format-specific unit (a whole file for text/Markdown/PDF, one per
//! conversation for a ChatGPT export, one per record for a Gemini-style
//! activity export). `ingestion::chunker` splits each of these further.

use serde_json::Value;

use crate::error::{IngestError, IngestResult};

pub fn parse(extension: &str, raw: &[u8]) -> IngestResult<Vec<String>> {
    match extension.to_ascii_lowercase().as_str() {
        "txt" | "md" | "markdown" => {
            let text = String::from_utf8_lossy(raw).into_owned();
            Ok(vec![text])
        }
        "pdf" => {
            let text = pdf_extract::extract_text_from_mem(raw)
                .map_err(|e| IngestError::Io(std::io::Error::other(e.to_string())))?;
            Ok(vec![text])
        }
        "json" => {
            let text = String::from_utf8_lossy(raw);
            let value: Value = serde_json::from_str(&text)
                .map_err(|e| IngestError::Io(std::io::Error::other(e.to_string())))?;
            Ok(parse_json(&value))
        }
        other => Err(IngestError::UnsupportedFileType(other.to_string())),
    }
}

fn parse_json(value: &Value) -> Vec<String> {
    if let Some(conversations) = value.as_array() {
        if conversations.iter().all(|c| c.get("mapping").is_some()) && !conversations.is_empty() {
            return conversations.iter().map(render_chatgpt_conversation).collect();
        }
        if conversations
            .iter()
            .all(|c| c.get("time").is_some() || c.get("timestamp").is_some())
            && !conversations.is_empty()
        {
            return conversations.iter().map(render_activity_record).collect();
        }
    }
    vec![value.to_string()]
}

/// Flattens a ChatGPT export conversation's `mapping` tree into plain text,
/// ordered by each message node's `create_time`.
fn render_chatgpt_conversation(conversation: &Value) -> String {
    let title = conversation.get("title").and_then(Value::as_str).unwrap_or("untitled");
    let mut messages: Vec<(f64, String)> = Vec::new();

    if let Some(mapping) = conversation.get("mapping").and_then(Value::as_object) {
        for node in mapping.values() {
            let Some(message) = node.get("message") else { continue };
            if message.is_null() {
                continue;
            }
            let create_time = message.get("create_time").and_then(Value::as_f64).unwrap_or(0.0);
            let role = message
                .get("author")
                .and_then(|a| a.get("role"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let text = message
                .get("content")
                .and_then(|c| c.get("parts"))
                .and_then(Value::as_array)
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .unwrap_or_default();
            if !text.trim().is_empty() {
                messages.push((create_time, format!("{role}: {text}")));
            }
        }
    }

    messages.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let body: Vec<String> = messages.into_iter().map(|(_, line)| line).collect();
    format!("# {title}\n\n{}", body.join("\n\n"))
}

fn render_activity_record(record: &Value) -> String {
    let title = record.get("title").and_then(Value::as_str).unwrap_or("");
    let time = record
        .get("time")
        .or_else(|| record.get("timestamp"))
        .and_then(Value::as_str)
        .unwrap_or("");
    format!("[{time}] {title}\n{}", record.to_string())
}
