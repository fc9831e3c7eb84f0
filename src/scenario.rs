pub mod graph;
pub mod node;

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use anyhow::Result;
use log::{debug, info, warn};

use crate::ledger::TransitionRecord;
use crate::scenario::node::Choice;
use crate::session::DeckSession;
use crate::submission::Summary;

// ---------------------------------------------------------------------------
// Terminal commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Answer(Choice),
    Back,
    Summary,
    Export,
    Reset,
    Goto(String),
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        let (head, rest) = input.split_once(' ').unwrap_or((input, ""));
        if let Ok(choice) = head.parse::<Choice>() {
            return Ok(Command::Answer(choice));
        }
        let cmd = match head.to_lowercase().as_str() {
            "b" | "back" => Command::Back,
            "s" | "summary" => Command::Summary,
            "e" | "export" => Command::Export,
            "r" | "reset" => Command::Reset,
            "h" | "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            "g" | "goto" if !rest.trim().is_empty() => Command::Goto(rest.trim().to_string()),
            _ => anyhow::bail!("unknown command '{input}' (h for help)"),
        };
        Ok(cmd)
    }
}

const HELP: &str = "  [y] yes  [n] no  [b] back  [s] summary  [e] export  [r] reset  [g ID] go to slide  [q] quit";

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render_breadcrumbs(history: &[TransitionRecord]) -> String {
    if history.is_empty() {
        return "Path: —".to_string();
    }
    let crumbs = history
        .iter()
        .map(|h| format!("{} [{}]", h.from_label, h.choice.letter()))
        .collect::<Vec<_>>()
        .join(" > ");
    format!("Path: {crumbs}")
}

pub fn render_summary(summary: &Summary) -> String {
    let mut s = String::new();
    s.push_str(&format!(
        "Scenario: {}   Doctrine: {}   Session: {}\n",
        summary.scenario_id, summary.doctrine_id, summary.session_id
    ));

    match summary.outcome.as_ref().filter(|o| !o.text.is_empty()) {
        Some(outcome) => s.push_str(&format!("Outcome: {}\n", outcome.text)),
        None => s.push_str("Outcome: In progress (no terminal outcome reached yet).\n"),
    }

    if summary.rows.is_empty() {
        s.push_str("No decisions recorded yet. Go to a decision slide and press y/n.\n");
        return s;
    }

    s.push_str("  # | Decision | Choice | Next | Instructor explanation\n");
    for row in &summary.rows {
        s.push_str(&format!(
            "  {} | {} | {} | {} | {}\n",
            row.index, row.decision, row.choice, row.next, row.feedback
        ));
    }
    s
}

fn show_slide(session: &mut DeckSession) {
    let current_id = session.current_id().to_string();
    let marker = session.arrival_marker(&current_id);
    let history = session.history();

    println!("\n----------------------------------------");
    println!("{}", render_breadcrumbs(&history));
    println!("----------------------------------------");

    let Some(node) = session.current_node() else {
        println!("[{current_id}] (missing slide)");
        return;
    };

    match marker {
        Some(choice) => println!("[{}] (you answered {choice})", node.label()),
        None => println!("[{}]", node.label()),
    }
    if let Some(body) = &node.body {
        println!("{body}");
    }
    if let Some(outcome) = session.outcome().filter(|o| !o.text.is_empty()) {
        println!("\n>> Outcome: {}", outcome.text);
        println!("   Press [s] for the summary or [e] to export your submission.");
    }

    let mut affordances = Vec::new();
    if session.can_answer() {
        affordances.push("[y] yes  [n] no");
    }
    if session.can_undo() {
        affordances.push("[b] back");
    }
    if !affordances.is_empty() {
        println!("\n  {}", affordances.join("  "));
    }
}

/// What the loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Show,
    Stay,
    Quit,
}

/// Run one command. Failures are printed; none of them end the session.
fn apply(session: &mut DeckSession, command: Command) -> Flow {
    match command {
        Command::Answer(choice) => {
            if session.advance(choice).is_none() {
                println!("  (no {choice} route from this slide)");
                return Flow::Stay;
            }
        }
        Command::Back => {
            if session.undo().is_none() {
                println!("  (nothing to undo)");
                return Flow::Stay;
            }
        }
        Command::Summary => {
            let summary = session.request_summary();
            println!("\n{}", render_summary(&summary));
            return Flow::Stay;
        }
        Command::Export => {
            match session.export_submission() {
                Ok(path) => println!("  Saved {}", path.display()),
                Err(e) => {
                    warn!("Export failed: {e:#}");
                    println!("  export failed: {e:#}");
                }
            }
            return Flow::Stay;
        }
        Command::Reset => session.reset(),
        Command::Goto(id) => {
            if !session.goto(&id) {
                println!("  (no slide '{id}')");
                return Flow::Stay;
            }
        }
        Command::Help => {
            println!("{HELP}");
            return Flow::Stay;
        }
        Command::Quit => return Flow::Quit,
    }
    Flow::Show
}

// ---------------------------------------------------------------------------
// Public entry point — reads commands until the learner quits
// ---------------------------------------------------------------------------

pub fn run(session: &mut DeckSession) -> Result<()> {
    println!("\n========================================");
    println!("   {}", session.config().scenario_id);
    println!("========================================");
    println!("{HELP}");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    show_slide(session);
    loop {
        print!("\n> ");
        io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(c) => c,
            Err(e) => {
                println!("  {e}");
                continue;
            }
        };
        debug!("Command: {command:?}");

        match apply(session, command) {
            Flow::Show => show_slide(session),
            Flow::Stay => {}
            Flow::Quit => break,
        }
    }

    info!(
        "Learner left at {} (doctrine {})",
        session.current_id(),
        session.doctrine_id()
    );
    println!("Goodbye.");
    Ok(())
}
