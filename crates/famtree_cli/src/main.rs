//! Offline maintenance entry point.
//!
//! # Responsibility
//! - Report the core version linked into this build.
//! - Audit stored relationship graphs without a running server.
//!
//! # Invariants
//! - `audit` only opens an existing database file and never writes graph
//!   documents; it exits non-zero when any tree is inconsistent.

use clap::{Parser, Subcommand};
use famtree_core::{
    audit_stored_tree, core_version, open_db, AuditReport, FamilyResult, SqliteMemberStore,
    SqliteTreeStore, TreeStore,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "famtree", version, about = "famtree maintenance tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the linked core version.
    Version,
    /// Check every tree's member graph for broken or one-sided edges.
    Audit {
        #[arg(long, env = "FAMTREE_DB")]
        db: PathBuf,
        /// Audit a single tree.
        #[arg(long)]
        tree: Option<Uuid>,
        /// Print reports as JSON lines.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    match Cli::parse().command {
        Command::Version => {
            println!("famtree_core version={}", core_version());
            ExitCode::SUCCESS
        }
        Command::Audit { db, tree, json } => match audit(&db, tree) {
            Ok(reports) => {
                print_reports(&reports, json);
                if reports.iter().all(AuditReport::is_consistent) {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(1)
                }
            }
            Err(err) => {
                eprintln!("famtree: audit failed: {err}");
                ExitCode::from(2)
            }
        },
    }
}

fn audit(db: &Path, only: Option<Uuid>) -> Result<Vec<AuditReport>, Box<dyn std::error::Error>> {
    if !db.is_file() {
        return Err(format!("database file not found: {}", db.display()).into());
    }
    let conn = open_db(db)?;
    let trees = SqliteTreeStore::try_new(&conn)?;
    let members = SqliteMemberStore::try_new(&conn)?;

    let mut selected = trees.list_all_trees()?;
    if let Some(tree_id) = only {
        selected.retain(|tree| tree.id == tree_id);
        if selected.is_empty() {
            return Err(format!("family tree not found: {tree_id}").into());
        }
    }

    let reports: FamilyResult<Vec<AuditReport>> = selected
        .iter()
        .map(|tree| audit_stored_tree(&members, tree))
        .collect();
    Ok(reports?)
}

fn print_reports(reports: &[AuditReport], json: bool) {
    for report in reports {
        if json {
            match serde_json::to_string(report) {
                Ok(line) => println!("{line}"),
                Err(err) => eprintln!("famtree: cannot encode report {}: {err}", report.tree_id),
            }
            continue;
        }

        let status = if report.is_consistent() { "ok" } else { "broken" };
        println!(
            "tree={} members={} violations={} status={status}",
            report.tree_id,
            report.member_count,
            report.violations.len()
        );
        for violation in &report.violations {
            println!("  {violation}");
        }
    }
}
