//! Nightly reflect/strategize cycle (spec.md §4.6) and its scheduler.
//!
//! The scheduler is deliberately thin: a `tokio` interval task that wakes
//! once a minute and checks whether the configured hour has just turned
//! over, not a full cron daemon (there is no cron-style dependency anywhere
//! in the workspace to draw on).

use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};

use crate::error::IngestResult;
use crate::model::NodeType;

use super::micro::persist_experience;
use super::EvolutionService;

const REFLECTOR_LOG_CAP: usize = 50;
const MAX_TRIGGER_INSIGHT_PAIRS: usize = 3;
const SCHEDULER_POLL_INTERVAL: Duration = Duration::from_secs(60);

const REFLECTOR_SYSTEM_PROMPT: &str = "You review a day's worth of logged activity for a single \
    user. Identify up to 3 notable TRIGGER/INSIGHT pairs — a situation and what it reveals about \
    the user's strategy or habits. Reply with one pair per two lines, in this exact shape, and \
    nothing else:\n\
    TRIGGER: <situation>\n\
    INSIGHT: <what it reveals>";

const STRATEGIST_SYSTEM_PROMPT: &str = "Given one insight about a user, propose a single \
    concrete strategy they could apply in under two minutes. Reply with exactly one line:\n\
    STRATEGY: <the strategy>";

impl EvolutionService {
    /// Runs one nightly cycle for `user_id`: collects yesterday's logs,
    /// reflects, strategizes, and persists each pair as an Experience.
    /// Returns the number of experiences written; `0` if there were no
    /// logs to reflect on.
    pub async fn run_nightly_cycle(&self, user_id: &str) -> IngestResult<usize> {
        let yesterday = (Utc::now() - chrono::Duration::days(1)).date_naive();
        let logs = self.graph.get_nodes_by_type(user_id, NodeType::Log)?;
        let mut yesterdays_logs: Vec<_> =
            logs.into_iter().filter(|log| log.created_at.date_naive() == yesterday).collect();
        if yesterdays_logs.is_empty() {
            return Ok(0);
        }
        yesterdays_logs.truncate(REFLECTOR_LOG_CAP);

        let concatenated = yesterdays_logs
            .iter()
            .map(|log| log.content.as_str())
            .collect::<Vec<_>>()
            .join("\n---\n");

        let reflection = self.perception.complete_raw(REFLECTOR_SYSTEM_PROMPT, &concatenated).await;
        let pairs = parse_trigger_insight_pairs(&reflection);

        let mut persisted = 0;
        for (trigger, insight) in pairs {
            let strategist_input = format!("Insight: {insight}");
            let raw = self.perception.complete_raw(STRATEGIST_SYSTEM_PROMPT, &strategist_input).await;
            let Some(strategy) = raw.trim().strip_prefix("STRATEGY:").map(|s| s.trim().to_string()) else {
                tracing::warn!("strategist response did not match the expected shape, skipping insight");
                continue;
            };
            if strategy.is_empty() {
                continue;
            }
            persist_experience(self, user_id, &trigger, &insight, &strategy).await?;
            persisted += 1;
        }

        Ok(persisted)
    }
}

/// Parses the Reflector's repeated `TRIGGER:`/`INSIGHT:` pairs, capped at 3.
fn parse_trigger_insight_pairs(raw: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut pending_trigger: Option<String> = None;
    for line in raw.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("TRIGGER:") {
            pending_trigger = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("INSIGHT:") {
            if let Some(trigger) = pending_trigger.take() {
                let insight = rest.trim().to_string();
                if !trigger.is_empty() && !insight.is_empty() {
                    pairs.push((trigger, insight));
                }
            }
        }
        if pairs.len() >= MAX_TRIGGER_INSIGHT_PAIRS {
            break;
        }
    }
    pairs
}

/// Spawns the background scheduler: wakes every minute, and when the local
/// hour just turned to `config.nightly_cycle_hour`, runs the cycle once per
/// user in `user_ids`. Intended to be spawned once per process.
pub fn spawn_nightly_scheduler(
    service: Arc<EvolutionService>,
    user_ids: Vec<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_run_hour: Option<u32> = None;
        let mut interval = tokio::time::interval(SCHEDULER_POLL_INTERVAL);
        loop {
            interval.tick().await;
            let now = Utc::now();
            if now.hour() != service.config.nightly_cycle_hour {
                continue;
            }
            if last_run_hour == Some(now.hour()) {
                continue;
            }
            last_run_hour = Some(now.hour());

            for user_id in &user_ids {
                match service.run_nightly_cycle(user_id).await {
                    Ok(count) => tracing::info!(user_id, count, "nightly cycle completed"),
                    Err(e) => tracing::warn!(user_id, error = %e, "nightly cycle failed"),
                }
            }
        }
    })
}
