use log::{debug, info};

use crate::ledger::{HistoryLedger, LastRoute, TransitionRecord};
use crate::scenario::graph::ScenarioGraph;
use crate::scenario::node::{Choice, Node};

/// Applies yes/no answers to the scenario graph and records them.
///
/// The only writer of the history ledger.
pub struct Router<'g> {
    graph: &'g ScenarioGraph,
}

impl<'g> Router<'g> {
    pub fn new(graph: &'g ScenarioGraph) -> Self {
        Self { graph }
    }

    /// Follow `choice` out of `current`. Returns the id to navigate to, or
    /// `None` when the move is rejected (no decision here, or the edge
    /// dangles). Rejected moves touch nothing.
    pub fn advance(
        &self,
        ledger: &mut HistoryLedger<'_>,
        current: Option<&Node>,
        choice: Choice,
    ) -> Option<String> {
        let node = current?;
        if !node.is_decision() {
            debug!("Ignoring {choice} on non-decision node {}", node.id);
            return None;
        }

        let Some(target) = node.target(choice).and_then(|id| self.graph.get(id)) else {
            debug!(
                "Ignoring {choice} on {}: target {:?} does not exist",
                node.id,
                node.target(choice)
            );
            return None;
        };

        let record = TransitionRecord {
            from_id: node.id.clone(),
            from_label: node.label().to_string(),
            choice,
            to_id: target.id.clone(),
            to_label: target.label().to_string(),
        };
        info!("Transition: {} -{}-> {}", record.from_id, choice, record.to_id);

        let route = LastRoute::from(&record);
        ledger.append(record);
        ledger.set_last_route(&route);
        Some(target.id.clone())
    }

    /// Reverse the newest transition. Returns the node it started from.
    pub fn undo(&self, ledger: &mut HistoryLedger<'_>) -> Option<String> {
        let last = ledger.pop_last()?;
        ledger.clear_last_route();
        info!("Undo: back to {} (was at {})", last.from_id, last.to_id);
        Some(last.from_id)
    }
}
