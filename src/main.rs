mod config;
mod ledger;
mod outcome;
mod router;
mod scenario;
mod session;
mod store;
mod submission;

use anyhow::{Context, Result};
use log::info;

use config::DeckConfig;
use scenario::graph::{negligence_scenario, ScenarioDocument};
use session::DeckSession;
use store::{FileBackend, SessionStore};

fn main() -> Result<()> {
    // Initialize logging. Control verbosity with RUST_LOG env var:
    //   RUST_LOG=info   cargo run -- scenario.json   # transitions, undo, export
    //   RUST_LOG=debug  cargo run -- scenario.json   # + rejected moves, storage fallbacks
    //   RUST_LOG=trace  cargo run -- scenario.json   # + raw session store traffic
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();

    let doc = match args.get(1).map(String::as_str) {
        None | Some("demo") => negligence_scenario(),
        Some(path) => ScenarioDocument::load(path).context(
            "Usage: flowdeck [scenario.json|demo] [scenario_id] [doctrine_id]\n\
             \n\
             Environment:\n  FLOWDECK_STORE           session file (empty = memory only)\n  \
             FLOWDECK_EXPORT_DIR      where submissions are written\n  \
             FLOWDECK_ROTATE_SESSION  set to 1 to renew the session id on reset",
        )?,
    };
    let graph = doc.build_graph().context("scenario failed validation")?;

    let config = DeckConfig::resolve(
        &args,
        doc.scenario_id.as_deref(),
        doc.doctrine_id.as_deref(),
        |key| std::env::var(key).ok(),
    );

    println!("Scenario: {} ({} slides)", config.scenario_id, graph.node_count());
    let store = match &config.store_path {
        Some(path) => {
            println!("  Session file : {}", path.display());
            SessionStore::new(FileBackend::new(path))
        }
        None => {
            println!("  Session file : (memory only)");
            SessionStore::in_memory()
        }
    };
    println!("  Exports      : {}", config.export_dir.display());
    info!("Doctrine override: {:?}", config.doctrine_id);

    let mut session = DeckSession::new(graph, store, config);
    scenario::run(&mut session)
}
