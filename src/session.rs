use std::path::PathBuf;

use anyhow::Result;
use log::info;
use uuid::Uuid;

use crate::config::DeckConfig;
use crate::ledger::{load_history, HistoryLedger, TransitionRecord};
use crate::outcome;
use crate::router::Router;
use crate::scenario::graph::ScenarioGraph;
use crate::scenario::node::{Choice, Node, Outcome};
use crate::store::SessionStore;
use crate::submission::{self, SubmissionInput, SubmissionPayload, Summary};

pub const KEY_SESSION_ID: &str = "ldt_session_id";

// ---------------------------------------------------------------------------
// Deck session
// ---------------------------------------------------------------------------

/// All navigation state of one learner session. Built once at startup and
/// driven by the host through the command methods below.
pub struct DeckSession {
    graph: ScenarioGraph,
    store: SessionStore,
    config: DeckConfig,
    current_id: String,
}

impl DeckSession {
    /// Resume at the target of the newest recorded transition, or at the
    /// start node for a fresh history.
    pub fn new(graph: ScenarioGraph, store: SessionStore, config: DeckConfig) -> Self {
        let current_id = load_history(&store)
            .last()
            .map(|h| h.to_id.clone())
            .filter(|id| graph.contains(id))
            .unwrap_or_else(|| graph.start_id().to_string());

        let mut session = Self {
            graph,
            store,
            config,
            current_id,
        };
        let sid = session.session_id();
        info!(
            "Session {sid} started for {} at node {}",
            session.config.scenario_id, session.current_id
        );
        session
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    pub fn current_id(&self) -> &str {
        &self.current_id
    }

    pub fn current_node(&self) -> Option<&Node> {
        self.graph.get(&self.current_id)
    }

    pub fn history(&self) -> Vec<TransitionRecord> {
        load_history(&self.store)
    }

    /// Opaque token for this session, created on first use.
    pub fn session_id(&mut self) -> String {
        if let Some(existing) = self.store.get(KEY_SESSION_ID).filter(|s| !s.is_empty()) {
            return existing;
        }
        let sid = Uuid::new_v4().to_string();
        self.store.set(KEY_SESSION_ID, &sid);
        sid
    }

    // -- navigation affordances --

    pub fn can_answer(&self) -> bool {
        self.current_node().is_some_and(Node::is_decision)
    }

    pub fn can_undo(&self) -> bool {
        !self.history().is_empty()
    }

    /// How the learner just arrived at `node_id`, if the newest transition
    /// landed there.
    pub fn arrival_marker(&mut self, node_id: &str) -> Option<Choice> {
        HistoryLedger::new(&mut self.store)
            .last_route()
            .filter(|route| route.to_id == node_id)
            .map(|route| route.choice)
    }

    // -- commands --

    pub fn advance(&mut self, choice: Choice) -> Option<String> {
        let mut ledger = HistoryLedger::new(&mut self.store);
        let current = self.graph.get(&self.current_id);
        let to = Router::new(&self.graph).advance(&mut ledger, current, choice)?;
        self.current_id = to.clone();
        Some(to)
    }

    pub fn undo(&mut self) -> Option<String> {
        let mut ledger = HistoryLedger::new(&mut self.store);
        let back = Router::new(&self.graph).undo(&mut ledger)?;
        if self.graph.contains(&back) {
            self.current_id = back.clone();
        }
        Some(back)
    }

    /// Reposition without recording anything, e.g. to review an earlier slide.
    pub fn goto(&mut self, node_id: &str) -> bool {
        if !self.graph.contains(node_id) {
            return false;
        }
        self.current_id = node_id.to_string();
        true
    }

    pub fn outcome(&self) -> Option<Outcome> {
        outcome::resolve(&self.graph, self.current_node(), &self.history())
    }

    pub fn doctrine_id(&self) -> String {
        outcome::classify(&self.history(), self.config.doctrine_id.as_deref())
    }

    pub fn request_summary(&mut self) -> Summary {
        let session_id = self.session_id();
        let history = self.history();
        self.input(&history, &session_id).summary()
    }

    pub fn submission(&mut self) -> SubmissionPayload {
        let session_id = self.session_id();
        let history = self.history();
        self.input(&history, &session_id).build()
    }

    pub fn export_submission(&mut self) -> Result<PathBuf> {
        let payload = self.submission();
        submission::write_export(&payload, &self.config.export_dir)
    }

    /// Forget the path taken and return to the start node. The session id
    /// survives unless rotation is configured.
    pub fn reset(&mut self) {
        let mut ledger = HistoryLedger::new(&mut self.store);
        ledger.clear();
        ledger.clear_last_route();
        if self.config.rotate_session_on_reset {
            self.store.remove(KEY_SESSION_ID);
        }
        self.current_id = self.graph.start_id().to_string();
        info!("Session reset");
    }

    fn input<'a>(
        &'a self,
        history: &'a [TransitionRecord],
        session_id: &'a str,
    ) -> SubmissionInput<'a> {
        SubmissionInput {
            graph: &self.graph,
            scenario_id: &self.config.scenario_id,
            history,
            current: self.current_node(),
            session_id,
            doctrine_override: self.config.doctrine_id.as_deref(),
        }
    }
}
