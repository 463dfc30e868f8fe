//! Status command - report where the cache lives and whether it is usable

use crate::cache::{ArchiveStat, ValidityVerdict};
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::config::Config;
use crate::error::RootCacheResult;
use crate::lifecycle::RootCacheController;
use crate::ui::LogProgress;
use chrono::{DateTime, Local};
use console::{style, Emoji};
use serde::Serialize;
use std::path::PathBuf;
use std::time::SystemTime;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

#[derive(Serialize)]
struct StatusReport {
    directory: PathBuf,
    archive: PathBuf,
    compression: String,
    verdict: ValidityVerdict,
    age_days: Option<f64>,
    created: Option<DateTime<Local>>,
}

/// Execute the status command
pub fn execute(args: StatusArgs, config: &Config) -> RootCacheResult<()> {
    let controller = RootCacheController::from_config(config, Box::new(LogProgress))?;
    let location = controller.location();
    let stat = ArchiveStat::read(location.archive());

    let report = StatusReport {
        directory: location.dir().to_path_buf(),
        archive: location.archive().to_path_buf(),
        compression: controller.compression().to_string(),
        verdict: controller.verdict(),
        age_days: stat.map(|s| s.age_days(SystemTime::now())),
        created: stat.map(|s| DateTime::<Local>::from(s.changed)),
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }
    Ok(())
}

fn print_text(report: &StatusReport) {
    println!("{}", style("Root Cache Status").bold().cyan());
    println!();
    println!("  Directory:   {}", report.directory.display());
    println!("  Archive:     {}", report.archive.display());
    println!("  Compression: {}", report.compression);

    if let (Some(age), Some(created)) = (report.age_days, report.created) {
        println!(
            "  Created:     {} ({:.1} days ago)",
            created.format("%Y-%m-%d %H:%M"),
            age
        );
    }

    println!();
    match report.verdict {
        ValidityVerdict::Fresh => {
            println!("  {} {}", CHECK, style("Archive is fresh").green());
        }
        verdict => {
            println!("  {} {}", WARN, style(verdict).yellow());
        }
    }
}
