//! The reactive watcher
//!
//! Every reaction (workspace poll, mutation batch, due debounce, backstop
//! tick, key press) runs to completion on the caller's thread before the next
//! one, so the watcher owns all mutable state outright.

mod replay;

pub use replay::{replay, ReplayReport, ReplayStep, Trace};

use tracing::{debug, info, warn};

use crate::aggregate::Aggregator;
use crate::config::{Config, ExportConfig};
use crate::export::{self, ExportOutcome, ExportSink};
use crate::extract::{self, ScanReport};
use crate::host::{Clock, HostTree};
use crate::media::MediaResolver;
use crate::scheduler::{ScanRequest, ScanScheduler, ScanState};
use crate::shortcut::{KeyPress, Shortcut};

pub struct Watcher<S: ExportSink, C: Clock> {
    scheduler: ScanScheduler,
    aggregator: Aggregator,
    resolver: MediaResolver,
    shortcut: Shortcut,
    export_config: ExportConfig,
    sink: S,
    clock: C,
    failed_scans: usize,
}

impl<S: ExportSink, C: Clock> Watcher<S, C> {
    pub fn new(config: &Config, sink: S, clock: C) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            scheduler: ScanScheduler::new(&config.scheduler),
            aggregator: Aggregator::new(),
            resolver: MediaResolver::new(&config.media),
            shortcut: config.shortcut()?,
            export_config: config.export.clone(),
            sink,
            clock,
            failed_scans: 0,
        })
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn resolver(&self) -> &MediaResolver {
        &self.resolver
    }

    pub fn state(&self) -> &ScanState {
        self.scheduler.state()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Scans abandoned because the host tree could not be read.
    pub fn failed_scans(&self) -> usize {
        self.failed_scans
    }

    pub fn awaiting_workspace(&self) -> bool {
        self.scheduler.awaiting_workspace()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    /// Poll for the workspace container. Returns true once it is found.
    ///
    /// The conversation already on screen when the workspace appears counts
    /// as the first mutation batch.
    pub fn poll_workspace<T: HostTree>(&mut self, host: &T, now_ms: u64) -> bool {
        if !self.scheduler.awaiting_workspace() {
            return true;
        }
        if host.workspace_present() {
            self.scheduler.on_workspace_found();
            self.on_mutations(host, now_ms);
            true
        } else {
            debug!("workspace not rendered yet, retrying");
            false
        }
    }

    /// A batch of structural mutations was observed.
    pub fn on_mutations<T: HostTree>(&mut self, host: &T, now_ms: u64) {
        self.scheduler
            .on_mutations(host.conversation_title().as_deref(), now_ms);
    }

    /// Run the pending scan if it is due.
    pub fn on_timer<T: HostTree>(&mut self, host: &T, now_ms: u64) -> Option<ScanReport> {
        let request = self.scheduler.fire_due(now_ms)?;
        self.run_scan(host, &request)
    }

    /// Backstop tick: rescan the current conversation immediately.
    pub fn on_tick<T: HostTree>(&mut self, host: &T) -> Option<ScanReport> {
        let request = self.scheduler.on_tick()?;
        self.run_scan(host, &request)
    }

    /// Export if `press` is the reserved chord.
    pub fn on_key(&mut self, press: &KeyPress) -> Option<ExportOutcome> {
        if !self.shortcut.matches(press) {
            return None;
        }
        Some(self.export())
    }

    pub fn export(&mut self) -> ExportOutcome {
        let outcome = export::export(
            &self.aggregator,
            &mut self.sink,
            &self.export_config,
            self.clock.now(),
        );
        info!(notice = %outcome.notice(), "export requested");
        outcome
    }

    fn run_scan<T: HostTree>(&mut self, host: &T, request: &ScanRequest) -> Option<ScanReport> {
        match extract::scan(
            host,
            &request.identity,
            &mut self.resolver,
            &mut self.aggregator,
            &self.clock,
        ) {
            Ok(report) => {
                debug!(
                    conversation = %report.identity,
                    trigger = ?request.trigger,
                    examined = report.examined,
                    accepted = report.accepted,
                    duplicates = report.duplicates,
                    failures = report.failures.len(),
                    "scan complete"
                );
                if report.accepted > 0 {
                    info!(
                        conversation = %report.identity,
                        accepted = report.accepted,
                        total = self.aggregator.records(&report.identity).len(),
                        "captured new messages"
                    );
                }
                Some(report)
            }
            Err(err) => {
                warn!(conversation = %request.identity, %err, "scan failed");
                self.failed_scans += 1;
                None
            }
        }
    }
}
