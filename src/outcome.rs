use crate::ledger::TransitionRecord;
use crate::scenario::graph::ScenarioGraph;
use crate::scenario::node::{Node, Outcome};

/// Category reported when nothing better is known.
pub const MIXED_DOCTRINE: &str = "mixed";

/// Decision-id prefixes and the doctrine they belong to.
const DOCTRINE_PREFIXES: &[(&str, &str)] = &[
    ("TORT_", "torts_negligence"),
    ("CRIM_", "criminal_law"),
    ("CON_", "constitutional_law"),
];

/// Outcome reached by the learner, if any.
///
/// Standing on an outcome node wins; otherwise the target of the newest
/// transition is checked, so reviewing an earlier slide still reports the
/// outcome the recorded path reached.
pub fn resolve(
    graph: &ScenarioGraph,
    current: Option<&Node>,
    history: &[TransitionRecord],
) -> Option<Outcome> {
    if let Some(node) = current.filter(|n| n.is_outcome()) {
        return Some(Outcome::from_node(node));
    }
    let last = history.last()?;
    graph
        .get(&last.to_id)
        .filter(|n| n.is_outcome())
        .map(Outcome::from_node)
}

/// Doctrine id for a run: the configured non-empty override, else looked up
/// from the first decision taken.
pub fn classify(history: &[TransitionRecord], doctrine_override: Option<&str>) -> String {
    if let Some(id) = doctrine_override.filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    let Some(first) = history.first() else {
        return MIXED_DOCTRINE.to_string();
    };
    DOCTRINE_PREFIXES
        .iter()
        .find(|(prefix, _)| first.from_id.starts_with(*prefix))
        .map_or(MIXED_DOCTRINE, |&(_, doctrine)| doctrine)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::node::Choice;

    fn record(from: &str, to: &str) -> TransitionRecord {
        TransitionRecord {
            from_id: from.into(),
            from_label: from.into(),
            choice: Choice::Yes,
            to_id: to.into(),
            to_label: to.into(),
        }
    }

    fn graph() -> ScenarioGraph {
        ScenarioGraph::new(
            "A",
            vec![
                Node {
                    id: "A".into(),
                    yes: Some("B".into()),
                    no: Some("C".into()),
                    ..Node::default()
                },
                Node {
                    id: "B".into(),
                    outcome: true,
                    outcome_text: Some("Liable".into()),
                    ..Node::default()
                },
                Node {
                    id: "C".into(),
                    outcome: true,
                    body: Some("Not liable".into()),
                    ..Node::default()
                },
            ],
        )
    }

    #[test]
    fn test_resolve_prefers_current_position() {
        let graph = graph();
        let history = vec![record("A", "B")];
        let outcome = resolve(&graph, graph.get("C"), &history).unwrap();
        assert_eq!(outcome.id, "C");
        assert_eq!(outcome.text, "Not liable");
    }

    #[test]
    fn test_resolve_falls_back_to_last_target() {
        let graph = graph();
        let history = vec![record("A", "B")];
        let outcome = resolve(&graph, graph.get("A"), &history).unwrap();
        assert_eq!(outcome.id, "B");
        assert_eq!(outcome.text, "Liable");
    }

    #[test]
    fn test_resolve_in_progress() {
        let graph = graph();
        assert_eq!(resolve(&graph, graph.get("A"), &[]), None);
        assert_eq!(resolve(&graph, None, &[record("X", "A")]), None);
        assert_eq!(resolve(&graph, None, &[record("A", "GONE")]), None);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&[], None), "mixed");
        assert_eq!(classify(&[record("TORT_DUTY", "X")], None), "torts_negligence");
        assert_eq!(classify(&[record("CRIM_MENS_REA", "X")], None), "criminal_law");
        assert_eq!(classify(&[record("CON_STANDING", "X")], None), "constitutional_law");
        assert_eq!(classify(&[record("EVID_HEARSAY", "X")], None), "mixed");
        assert_eq!(
            classify(&[record("CON_X", "Y"), record("TORT_X", "Y")], None),
            "constitutional_law"
        );
    }

    #[test]
    fn test_classify_override_wins() {
        assert_eq!(classify(&[], Some("contracts")), "contracts");
        assert_eq!(classify(&[record("TORT_DUTY", "X")], Some("contracts")), "contracts");
        // An empty override counts as unset.
        assert_eq!(classify(&[record("TORT_DUTY", "X")], Some("")), "torts_negligence");
        assert_eq!(classify(&[], Some("")), "mixed");
    }
}
