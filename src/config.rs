use std::path::PathBuf;

use crate::submission::sanitize;

pub const DEFAULT_SCENARIO_ID: &str = "Scenario-001";

// ---------------------------------------------------------------------------
// Deck configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckConfig {
    pub scenario_id: String,
    /// Fixed doctrine id. When unset it is inferred from the first decision.
    pub doctrine_id: Option<String>,
    /// Session store file. `None` keeps the session in memory only.
    pub store_path: Option<PathBuf>,
    /// Where exported submissions are written.
    pub export_dir: PathBuf,
    /// Reset also forgets the session id.
    pub rotate_session_on_reset: bool,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            scenario_id: DEFAULT_SCENARIO_ID.into(),
            doctrine_id: None,
            store_path: None,
            export_dir: PathBuf::from("."),
            rotate_session_on_reset: false,
        }
    }
}

impl DeckConfig {
    /// Resolve the configuration from positional arguments
    /// (`[scenario] [scenario_id] [doctrine_id]`), the scenario document's own
    /// ids, and the `FLOWDECK_*` environment variables.
    pub fn resolve(
        args: &[String],
        doc_scenario_id: Option<&str>,
        doc_doctrine_id: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let scenario_id = args
            .get(2)
            .map(String::as_str)
            .or(doc_scenario_id)
            .unwrap_or(DEFAULT_SCENARIO_ID)
            .to_string();
        let doctrine_id = args
            .get(3)
            .map(String::as_str)
            .filter(|id| !id.trim().is_empty())
            .or(doc_doctrine_id.filter(|id| !id.trim().is_empty()))
            .map(str::to_string);

        let store_path = match env("FLOWDECK_STORE") {
            Some(p) if p.is_empty() => None,
            Some(p) => Some(PathBuf::from(p)),
            None => Some(
                std::env::temp_dir()
                    .join("flowdeck")
                    .join(format!("{}.session.json", sanitize(&scenario_id))),
            ),
        };

        Self {
            scenario_id,
            doctrine_id,
            store_path,
            export_dir: env("FLOWDECK_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            rotate_session_on_reset: env("FLOWDECK_ROTATE_SESSION")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}
