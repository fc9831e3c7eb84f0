use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single slide in the scenario graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Node {
    /// Unique identifier for this node (e.g. "TORT_DUTY", "OUTCOME_LIABLE").
    pub id: String,
    /// Short human-readable name. Falls back to `id` when absent.
    pub label: Option<String>,
    /// First descriptive text of the slide.
    pub body: Option<String>,
    /// Target when the learner answers "yes".
    pub yes: Option<String>,
    /// Target when the learner answers "no".
    pub no: Option<String>,
    /// Authoring override that turns a node with both targets back into a
    /// plain slide.
    pub decision_disabled: bool,
    /// Terminal outcome slide.
    pub outcome: bool,
    pub outcome_text: Option<String>,
    /// Instructor note shown in the summary once the decision was taken.
    pub feedback: Option<String>,
}

impl Node {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    /// Both targets present and not disabled. Evaluated from authoring data
    /// on every call.
    pub fn is_decision(&self) -> bool {
        !self.decision_disabled && self.yes.is_some() && self.no.is_some()
    }

    pub fn is_outcome(&self) -> bool {
        self.outcome
    }

    pub fn target(&self, choice: Choice) -> Option<&str> {
        match choice {
            Choice::Yes => self.yes.as_deref(),
            Choice::No => self.no.as_deref(),
        }
    }

    pub fn outcome_text(&self) -> Option<&str> {
        self.outcome_text.as_deref().or(self.body.as_deref())
    }

    pub fn feedback(&self) -> &str {
        self.feedback.as_deref().unwrap_or("")
    }
}

/// Answer to a yes/no prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Yes,
    No,
}

impl Choice {
    /// Single-letter form used in breadcrumbs and the summary table.
    pub fn letter(self) -> char {
        match self {
            Choice::Yes => 'Y',
            Choice::No => 'N',
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Yes => f.write_str("yes"),
            Choice::No => f.write_str("no"),
        }
    }
}

impl FromStr for Choice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "y" | "yes" => Ok(Choice::Yes),
            "n" | "no" => Ok(Choice::No),
            other => anyhow::bail!("not a yes/no answer: '{other}'"),
        }
    }
}

/// The terminal outcome a learner reached, as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub id: String,
    pub label: String,
    pub text: String,
}

impl Outcome {
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            label: node.label().to_string(),
            text: node.outcome_text().unwrap_or("").to_string(),
        }
    }
}
