//! Replay command implementation

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::export::{ExportOutcome, ExportSink, FileSink, StdoutSink};
use crate::host::ManualClock;
use crate::runtime::{self, Trace, Watcher};

pub fn run(config: &Config, trace_path: &Path, export_at_end: bool, to_stdout: bool) -> Result<()> {
    let trace = Trace::load(trace_path)?;
    println!(
        "Replaying {} ({} steps)...\n",
        trace_path.display(),
        trace.steps.len()
    );

    if to_stdout {
        drive(config, &trace, StdoutSink, export_at_end)
    } else {
        let sink = FileSink::new(config.output_dir());
        println!("📂 Exports go to {}\n", sink.dir().display());
        drive(config, &trace, sink, export_at_end)
    }
}

fn drive<S: ExportSink>(config: &Config, trace: &Trace, sink: S, export_at_end: bool) -> Result<()> {
    let clock = ManualClock::new(trace.origin());
    let mut watcher =
        Watcher::new(config, sink, clock).context("Failed to start watcher")?;

    let mut report = runtime::replay(&mut watcher, trace, &config.scheduler);
    if export_at_end {
        report.exports.push(watcher.export());
    }

    for (identity, records) in watcher.aggregator().snapshot() {
        println!("💬 {} ({} msgs)", identity, records.len());
    }
    if watcher.aggregator().conversation_count() > 0 {
        println!();
    }

    println!(
        "   Scans: {} ({} failed) | New: {} | Duplicates: {} | Skipped elements: {}",
        report.scans,
        report.failed_scans,
        report.accepted,
        report.duplicates,
        report.element_failures
    );
    println!(
        "   Media announced: {} images, {} videos",
        watcher.resolver().ledger().image_count(),
        watcher.resolver().ledger().video_count()
    );

    for outcome in &report.exports {
        let marker = match outcome {
            ExportOutcome::Delivered { .. } => "✅",
            ExportOutcome::NothingToExport => "ℹ️ ",
            ExportOutcome::Failed { .. } => "❌",
        };
        println!("{} {}", marker, outcome.notice());
    }

    Ok(())
}
