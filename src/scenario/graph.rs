use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;

use crate::scenario::node::{Choice, Node};

/// Authoring defects found while loading a scenario.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("scenario has no nodes")]
    Empty,

    #[error("node id '{0}' is declared more than once")]
    DuplicateNode(String),

    #[error("start node '{0}' does not exist")]
    MissingStart(String),

    #[error("node '{from}' routes {choice} to '{target}', which does not exist")]
    DanglingEdge {
        from: String,
        choice: Choice,
        target: String,
    },
}

/// The full scenario: a map of node-id -> Node plus the entry point.
///
/// Read-only once constructed.
#[derive(Debug, Clone)]
pub struct ScenarioGraph {
    nodes: BTreeMap<String, Node>,
    start_id: String,
}

impl ScenarioGraph {
    /// Build a graph without checking its edges. A later duplicate id
    /// replaces an earlier one.
    pub fn new(start_id: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            start_id: start_id.into(),
        }
    }

    /// Build a graph and reject it if any edge or the start node dangles.
    pub fn try_new(start_id: impl Into<String>, nodes: Vec<Node>) -> Result<Self, GraphError> {
        if nodes.is_empty() {
            return Err(GraphError::Empty);
        }
        let mut seen = BTreeMap::new();
        for node in &nodes {
            if seen.insert(node.id.as_str(), ()).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }
        let graph = Self::new(start_id, nodes);
        graph.validate()?;
        Ok(graph)
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        if !self.contains(&self.start_id) {
            return Err(GraphError::MissingStart(self.start_id.clone()));
        }
        for node in self.nodes.values() {
            for choice in [Choice::Yes, Choice::No] {
                if let Some(target) = node.target(choice) {
                    if !self.contains(target) {
                        return Err(GraphError::DanglingEdge {
                            from: node.id.clone(),
                            choice,
                            target: target.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn start_id(&self) -> &str {
        &self.start_id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

// ---------------------------------------------------------------------------
// Scenario documents
// ---------------------------------------------------------------------------

/// On-disk form of a scenario.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDocument {
    #[serde(default)]
    pub scenario_id: Option<String>,
    #[serde(default)]
    pub doctrine_id: Option<String>,
    pub start_id: String,
    pub nodes: Vec<Node>,
}

impl ScenarioDocument {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("scenario document is not valid JSON")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let doc = Self::from_json(&raw)?;
        info!(
            "Loaded scenario from {} ({} nodes, start={})",
            path.display(),
            doc.nodes.len(),
            doc.start_id
        );
        Ok(doc)
    }

    pub fn build_graph(&self) -> Result<ScenarioGraph, GraphError> {
        ScenarioGraph::try_new(self.start_id.clone(), self.nodes.clone())
    }
}

// ---------------------------------------------------------------------------
// Negligence demo scenario
// ---------------------------------------------------------------------------

pub fn negligence_scenario() -> ScenarioDocument {
    fn decision(id: &str, label: &str, body: &str, yes: &str, no: &str, feedback: &str) -> Node {
        Node {
            id: id.into(),
            label: Some(label.into()),
            body: Some(body.into()),
            yes: Some(yes.into()),
            no: Some(no.into()),
            feedback: Some(feedback.into()),
            ..Node::default()
        }
    }

    fn outcome(id: &str, label: &str, text: &str) -> Node {
        Node {
            id: id.into(),
            label: Some(label.into()),
            outcome: true,
            outcome_text: Some(text.into()),
            ..Node::default()
        }
    }

    let nodes = vec![
        decision(
            "TORT_DUTY",
            "Duty",
            "A grocer leaves a crate of pistachios in the aisle. Did the grocer owe shoppers a duty of care?",
            "TORT_BREACH",
            "OUTCOME_NO_DUTY",
            "Business owners owe invitees a duty of reasonable care.",
        ),
        decision(
            "TORT_BREACH",
            "Breach",
            "Was leaving the crate unattended for an hour unreasonable?",
            "TORT_CAUSATION",
            "OUTCOME_NO_BREACH",
            "A reasonable grocer inspects aisles more often than hourly.",
        ),
        decision(
            "TORT_CAUSATION",
            "Causation",
            "Would the shopper have fallen but for the crate?",
            "TORT_DAMAGES",
            "OUTCOME_NO_CAUSATION",
            "But-for causation: no crate, no fall.",
        ),
        decision(
            "TORT_DAMAGES",
            "Damages",
            "Did the shopper suffer a compensable injury?",
            "OUTCOME_LIABLE",
            "OUTCOME_NO_DAMAGES",
            "A broken wrist and medical bills are compensable harm.",
        ),
        outcome("OUTCOME_LIABLE", "Liable", "Liable: every element of negligence is met."),
        outcome("OUTCOME_NO_DUTY", "No duty", "Not liable: no duty was owed."),
        outcome("OUTCOME_NO_BREACH", "No breach", "Not liable: the grocer acted reasonably."),
        outcome(
            "OUTCOME_NO_CAUSATION",
            "No causation",
            "Not liable: the crate did not cause the fall.",
        ),
        outcome("OUTCOME_NO_DAMAGES", "No damages", "Not liable: there was no injury."),
    ];

    ScenarioDocument {
        scenario_id: Some("Negligence-Pistachio-01".into()),
        doctrine_id: None,
        start_id: "TORT_DUTY".into(),
        nodes,
    }
}
