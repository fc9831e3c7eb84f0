use log::debug;
use serde::{Deserialize, Serialize};

use crate::scenario::node::Choice;
use crate::store::SessionStore;

pub const KEY_HISTORY: &str = "ldt_history";
pub const KEY_LAST_ROUTE: &str = "ldt_last_route";

/// One taken edge of the scenario graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub from_id: String,
    pub from_label: String,
    pub choice: Choice,
    pub to_id: String,
    pub to_label: String,
}

/// The most recent arrival, kept only to mark the node it landed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRoute {
    pub from_id: String,
    pub choice: Choice,
    pub to_id: String,
}

impl From<&TransitionRecord> for LastRoute {
    fn from(record: &TransitionRecord) -> Self {
        Self {
            from_id: record.from_id.clone(),
            choice: record.choice,
            to_id: record.to_id.clone(),
        }
    }
}

/// Ordered log of transitions, oldest first, stored as one JSON array.
pub struct HistoryLedger<'s> {
    store: &'s mut SessionStore,
}

impl<'s> HistoryLedger<'s> {
    pub fn new(store: &'s mut SessionStore) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Vec<TransitionRecord> {
        load_history(self.store)
    }

    pub fn append(&mut self, record: TransitionRecord) {
        let mut hist = self.load();
        hist.push(record);
        self.store.save_json(KEY_HISTORY, &hist);
    }

    /// Remove and return the newest record. Storage is untouched when the
    /// history is empty.
    pub fn pop_last(&mut self) -> Option<TransitionRecord> {
        let mut hist = self.load();
        let last = hist.pop()?;
        self.store.save_json(KEY_HISTORY, &hist);
        Some(last)
    }

    pub fn clear(&mut self) {
        self.store.remove(KEY_HISTORY);
    }

    pub fn last_route(&self) -> Option<LastRoute> {
        self.store.load_json(KEY_LAST_ROUTE)
    }

    pub fn set_last_route(&mut self, route: &LastRoute) {
        self.store.save_json(KEY_LAST_ROUTE, route);
    }

    pub fn clear_last_route(&mut self) {
        self.store.remove(KEY_LAST_ROUTE);
    }
}

/// Read-only view of the persisted history.
pub fn load_history(store: &SessionStore) -> Vec<TransitionRecord> {
    let hist = store.load_json_or(KEY_HISTORY, Vec::new());
    debug!("Loaded {} history records", hist.len());
    hist
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(from: &str, choice: Choice, to: &str) -> TransitionRecord {
        TransitionRecord {
            from_id: from.into(),
            from_label: from.into(),
            choice,
            to_id: to.into(),
            to_label: to.into(),
        }
    }

    #[test]
    fn test_append_then_pop_restores_history() {
        let mut store = SessionStore::in_memory();
        let mut ledger = HistoryLedger::new(&mut store);
        ledger.append(record("A", Choice::Yes, "B"));
        let before = ledger.load();

        ledger.append(record("B", Choice::No, "C"));
        assert_eq!(ledger.load().len(), 2);

        assert_eq!(ledger.pop_last(), Some(record("B", Choice::No, "C")));
        assert_eq!(ledger.load(), before);
    }

    #[test]
    fn test_pop_on_empty_leaves_storage_alone() {
        let mut store = SessionStore::in_memory();
        let mut ledger = HistoryLedger::new(&mut store);
        assert_eq!(ledger.pop_last(), None);
        assert_eq!(store.get(KEY_HISTORY), None);
    }

    #[test]
    fn test_clear_removes_key() {
        let mut store = SessionStore::in_memory();
        let mut ledger = HistoryLedger::new(&mut store);
        ledger.append(record("A", Choice::Yes, "B"));
        ledger.clear();
        assert!(ledger.load().is_empty());
        assert_eq!(store.get(KEY_HISTORY), None);
    }

    #[test]
    fn test_malformed_history_reads_empty() {
        let mut store = SessionStore::in_memory();
        store.set(KEY_HISTORY, r#"{"oops": true}"#);
        assert!(load_history(&store).is_empty());
    }

    #[test]
    fn test_persisted_layout() {
        let mut store = SessionStore::in_memory();
        let mut ledger = HistoryLedger::new(&mut store);
        let rec = record("A", Choice::Yes, "B");
        ledger.set_last_route(&LastRoute::from(&rec));
        ledger.append(rec);

        assert_eq!(
            store.get(KEY_HISTORY).unwrap(),
            r#"[{"fromId":"A","fromLabel":"A","choice":"yes","toId":"B","toLabel":"B"}]"#
        );
        assert_eq!(
            store.get(KEY_LAST_ROUTE).unwrap(),
            r#"{"fromId":"A","choice":"yes","toId":"B"}"#
        );
    }
}
