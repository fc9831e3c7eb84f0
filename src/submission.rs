use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::ledger::TransitionRecord;
use crate::outcome;
use crate::scenario::graph::ScenarioGraph;
use crate::scenario::node::{Node, Outcome};

// ---------------------------------------------------------------------------
// Submission payload
// ---------------------------------------------------------------------------

/// Exportable record of one learner's path. Built on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub scenario_id: String,
    pub doctrine_id: String,
    pub session_id: String,
    #[serde(serialize_with = "iso_millis")]
    pub completed_at: DateTime<Utc>,
    pub outcome: Option<Outcome>,
    pub history: Vec<TransitionRecord>,
}

fn iso_millis<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Everything the builder reads; borrowed from the session.
pub struct SubmissionInput<'a> {
    pub graph: &'a ScenarioGraph,
    pub scenario_id: &'a str,
    pub history: &'a [TransitionRecord],
    pub current: Option<&'a Node>,
    pub session_id: &'a str,
    pub doctrine_override: Option<&'a str>,
}

impl SubmissionInput<'_> {
    pub fn build(&self) -> SubmissionPayload {
        self.build_at(Utc::now())
    }

    pub fn build_at(&self, completed_at: DateTime<Utc>) -> SubmissionPayload {
        SubmissionPayload {
            scenario_id: self.scenario_id.to_string(),
            doctrine_id: outcome::classify(self.history, self.doctrine_override),
            session_id: self.session_id.to_string(),
            completed_at,
            outcome: outcome::resolve(self.graph, self.current, self.history),
            history: self.history.to_vec(),
        }
    }

    /// Summary view shown to the learner before export.
    pub fn summary(&self) -> Summary {
        let rows = self
            .history
            .iter()
            .enumerate()
            .map(|(idx, h)| SummaryRow {
                index: idx + 1,
                decision: non_empty_or(&h.from_label, &h.from_id),
                choice: h.choice.letter(),
                next: non_empty_or(&h.to_label, &h.to_id),
                feedback: self
                    .graph
                    .get(&h.from_id)
                    .map(|n| n.feedback().to_string())
                    .unwrap_or_default(),
            })
            .collect::<Vec<_>>();
        debug!("Summary assembled with {} rows", rows.len());

        Summary {
            scenario_id: self.scenario_id.to_string(),
            doctrine_id: outcome::classify(self.history, self.doctrine_override),
            session_id: self.session_id.to_string(),
            outcome: outcome::resolve(self.graph, self.current, self.history),
            rows,
        }
    }
}

fn non_empty_or(preferred: &str, fallback: &str) -> String {
    if preferred.is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub scenario_id: String,
    pub doctrine_id: String,
    pub session_id: String,
    pub outcome: Option<Outcome>,
    pub rows: Vec<SummaryRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    /// 1-based.
    pub index: usize,
    pub decision: String,
    pub choice: char,
    pub next: String,
    /// Instructor explanation attached to the decision node.
    pub feedback: String,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Replace everything outside `[A-Za-z0-9._-]` with `_`.
///
/// Ids differing only in replaced characters map to the same name.
pub fn sanitize(s: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE
        .get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid filename pattern"))
        .replace_all(s, "_")
        .into_owned()
}

pub fn export_filename(payload: &SubmissionPayload) -> String {
    format!(
        "submission_{}_{}_{}.json",
        sanitize(&payload.scenario_id),
        sanitize(&payload.doctrine_id),
        sanitize(&payload.session_id)
    )
}

/// Write the payload as pretty JSON into `dir`. Returns the file path.
pub fn write_export(payload: &SubmissionPayload, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;
    let path = dir.join(export_filename(payload));
    let json = serde_json::to_string_pretty(payload).context("failed to encode submission")?;
    std::fs::write(&path, json)
        .with_context(|| format!("failed to write submission {}", path.display()))?;
    info!("Exported submission to {}", path.display());
    Ok(path)
}
