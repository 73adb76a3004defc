//! Subcommand implementations and terminal rendering.

use std::fmt::Write as _;

use civtech_core::{Attribute, CoreError, Directory, LoadReport, LocalLifecycle, Session};
use civtech_crypto::{CancelToken, IdentitySigner};
use civtech_tree::{TechStatus, TechTree};
use civtech_types::{Civilization, CivilizationId};
use rust_decimal::Decimal;
use tracing::warn;

/// Attach the user-facing reason to a core error.
fn explain(err: CoreError) -> anyhow::Error {
    let reason = err.reason();
    anyhow::Error::new(err).context(reason)
}

pub fn print_load_report(report: &LoadReport) {
    if !report.store_available {
        warn!("record store unavailable, directory is empty");
    }
    for failure in &report.failures {
        let id = failure
            .id
            .as_ref()
            .map_or_else(|| String::from("<index>"), ToString::to_string);
        warn!(id = %id, kind = ?failure.kind, reason = %failure.reason, "skipped directory entry");
    }
}

/// Warn about records whose discovery history skips a prerequisite.
pub fn report_order_violations(lifecycle: &LocalLifecycle, directory: &Directory) {
    for (id, violation) in lifecycle.order_violations(directory) {
        warn!(
            civilization_id = %id,
            tech = %violation.tech,
            prerequisite = %violation.prerequisite,
            "technology recorded before its prerequisite"
        );
    }
}

pub fn render_directory(directory: &Directory) -> String {
    if directory.is_empty() {
        return String::from("No civilizations yet.\n");
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} civilization(s), snapshot v{}",
        directory.len(),
        directory.version
    );
    for entry in &directory.entries {
        let civ = &entry.civilization;
        let marker = if entry.is_player { "*" } else { " " };
        let _ = writeln!(
            out,
            "{marker} {:<24} {:>3} techs  updated {}  owner {}  [{}]",
            civ.name,
            civ.discovered_technologies.len(),
            format_time(civ),
            civ.owner,
            civ.id
        );
    }
    out
}

pub fn render_tree(tree: &TechTree, player: Option<&Civilization>) -> String {
    let discovered = player.map_or(&[][..], |civ| civ.discovered_technologies.as_slice());
    let mut out = String::new();
    for tech in tree.topological_order() {
        let status = match TechTree::status(tech, discovered) {
            TechStatus::Researched => "researched",
            TechStatus::Available => "available",
            TechStatus::Locked => "locked",
        };
        let requires = if tech.prerequisites.is_empty() {
            String::from("-")
        } else {
            tech.prerequisites
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = writeln!(
            out,
            "{:<18} {:<10} cost {:>4}  requires {:<24} {}",
            tech.id, status, tech.cost, requires, tech.description
        );
    }
    if let Some(civ) = player {
        let progress = tree.progress(&civ.discovered_technologies);
        let next = tree
            .candidates(&civ.discovered_technologies)
            .iter()
            .map(|tech| tech.id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "{}: {}/{} researched ({}%), next: {}",
            civ.name,
            progress.researched,
            progress.total,
            progress.percent,
            if next.is_empty() { "-" } else { next.as_str() }
        );
    }
    out
}

pub async fn create<S: IdentitySigner>(
    lifecycle: &LocalLifecycle,
    session: &Session<S>,
    name: &str,
    points: Decimal,
    power: Decimal,
) -> anyhow::Result<()> {
    let id = lifecycle
        .create(session, name, points, power)
        .await
        .map_err(explain)?;
    println!("Created civilization {id}");
    Ok(())
}

pub async fn research<S: IdentitySigner>(
    lifecycle: &LocalLifecycle,
    session: &Session<S>,
    civ: &CivilizationId,
    tech: &str,
    cancel: &CancelToken,
) -> anyhow::Result<()> {
    let outcome = lifecycle
        .research(session, civ, tech, cancel)
        .await
        .map_err(explain)?;
    println!(
        "Researched {} for {}; {} research points left",
        outcome.tech, outcome.civilization.name, outcome.remaining_points
    );
    Ok(())
}

pub async fn reveal<S: IdentitySigner>(
    lifecycle: &LocalLifecycle,
    session: &Session<S>,
    civ: &CivilizationId,
    attribute: Attribute,
    cancel: &CancelToken,
) -> anyhow::Result<()> {
    let value = lifecycle
        .reveal(session, civ, attribute, cancel)
        .await
        .map_err(explain)?;
    let label = match attribute {
        Attribute::ResearchPoints => "Research points",
        Attribute::MilitaryPower => "Military power",
    };
    println!("{label}: {value}");
    Ok(())
}

fn format_time(civ: &Civilization) -> String {
    civ.last_updated_at().map_or_else(
        || civ.last_updated.to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}
