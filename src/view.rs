//! Terminal dashboard (out of scope; contract sketch only).
//!
//! SPEC_FULL.md §1/§4.9 explicitly excludes the rendering layer from this
//! engine's scope. What follows is the minimal proof that the Shared
//! Snapshot's read contract is satisfiable from a terminal frontend — one
//! table, redrawn once — not the dashboard itself. A real view layer
//! would own its own event loop, scrolling, and theming the way
//! `vadv-rpglot`'s and `omgpointless-aspy`'s TUIs do.

use std::io;

use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Constraint;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Cell, Row, Table};
use ratatui::Terminal;

use crate::db::{ChosenWindow, OutcomeState, Target};
use crate::snapshot::SharedSnapshot;
use crate::stats::{classify, AnomalyLabel};

fn label_color(label: AnomalyLabel) -> Color {
    match label {
        AnomalyLabel::Normal => Color::Green,
        AnomalyLabel::Variable => Color::Yellow,
        AnomalyLabel::Anomalous => Color::LightRed,
        AnomalyLabel::Critical => Color::Red,
        AnomalyLabel::Collecting => Color::DarkGray,
        AnomalyLabel::Neutral => Color::White,
    }
}

/// Build the rows for one frame of the dashboard table from the current
/// snapshot. Exposed separately from `run_once` so it's testable without
/// a real terminal.
pub fn build_rows(targets: &[Target], snapshot: &SharedSnapshot) -> Vec<(String, String, String, String)> {
    targets
        .iter()
        .map(|target| {
            let (outcome, stats) = snapshot.target_view(target.target_id);

            let state_text = match outcome.as_ref().map(|o| &o.state) {
                Some(OutcomeState::Ok) => "OK".to_string(),
                Some(OutcomeState::Error) => "ERROR".to_string(),
                Some(OutcomeState::DnsError) => "DNS ERROR".to_string(),
                Some(OutcomeState::Waiting) | None => "WAITING".to_string(),
            };

            let window_text = stats
                .as_ref()
                .map(|s| s.chosen_window.as_str().to_string())
                .unwrap_or_else(|| ChosenWindow::Collecting.as_str().to_string());

            let label = match (&outcome, &stats) {
                (Some(o), Some(s)) => classify(o.state == OutcomeState::Ok, o.latency_ms, s),
                _ => AnomalyLabel::Collecting,
            };

            (target.description.clone(), state_text, window_text, format!("{:?}", label))
        })
        .collect()
}

/// Render exactly one frame of the dashboard and return, leaving the
/// terminal restored. A real view layer would loop on a tick interval
/// instead.
pub fn run_once(targets: &[Target], snapshot: &SharedSnapshot) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let rows = build_rows(targets, snapshot);

    terminal.draw(|frame| {
        let table_rows: Vec<Row> = rows
            .iter()
            .map(|(desc, state, window, label)| {
                Row::new(vec![
                    Cell::from(desc.clone()),
                    Cell::from(state.clone()),
                    Cell::from(window.clone()),
                    Cell::from(label.clone()).style(Style::default()),
                ])
            })
            .collect();

        let table = Table::new(
            table_rows,
            [
                Constraint::Percentage(40),
                Constraint::Percentage(20),
                Constraint::Percentage(20),
                Constraint::Percentage(20),
            ],
        )
        .header(Row::new(vec!["Target", "State", "Window", "Label"]))
        .block(Block::default().borders(Borders::ALL).title("icmp-monitor"));

        frame.render_widget(table, frame.area());
    })?;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{LastOutcome, TargetSnapshot};

    #[test]
    fn test_build_rows_reflects_waiting_state() {
        let target = Target {
            target_id: 1,
            address: "1.1.1.1".to_string(),
            description: "Cloudflare".to_string(),
            tests: vec!["icmp".to_string()],
        };
        let snapshot = SharedSnapshot::new();
        snapshot.init_waiting(1);

        let rows = build_rows(&[target], &snapshot);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, "WAITING");
    }

    #[test]
    fn test_build_rows_reflects_ok_state_with_stats() {
        let target = Target {
            target_id: 1,
            address: "1.1.1.1".to_string(),
            description: "Cloudflare".to_string(),
            tests: vec!["icmp".to_string()],
        };
        let snapshot = SharedSnapshot::new();
        snapshot.set_outcome(1, LastOutcome {
            state: OutcomeState::Ok,
            latency_ms: Some(20.0),
            ttl: Some(56),
            bytes: Some(64),
            timestamp_text: "10:00:00.000".to_string(),
            resolved_ip: None,
        });
        let mut map = std::collections::HashMap::new();
        map.insert(1, TargetSnapshot {
            chosen_window: ChosenWindow::OneMin,
            avg_latency: Some(20.0),
            success_rate: Some(100.0),
            total: 2,
            std_dev: Some(2.0),
        });
        snapshot.swap_stats(map);

        let rows = build_rows(&[target], &snapshot);
        assert_eq!(rows[0].1, "OK");
        assert_eq!(rows[0].2, "1m");
        assert_eq!(rows[0].3, "Normal");
    }

    fn label_color_is_total(label: AnomalyLabel) -> bool {
        // Every variant must map to a color; this just exercises the match
        // arms so an added variant can't silently fall through.
        matches!(
            label_color(label),
            Color::Green | Color::Yellow | Color::LightRed | Color::Red | Color::DarkGray | Color::White
        )
    }

    #[test]
    fn test_label_color_covers_all_variants() {
        for label in [
            AnomalyLabel::Normal,
            AnomalyLabel::Variable,
            AnomalyLabel::Anomalous,
            AnomalyLabel::Critical,
            AnomalyLabel::Collecting,
            AnomalyLabel::Neutral,
        ] {
            assert!(label_color_is_total(label));
        }
    }
}
