//! Trace replay
//!
//! Drives a [`Watcher`] from a recorded trace on a logical clock. Each step
//! may swap in a new tree snapshot (delivered as one mutation batch) and/or
//! a key press. Between steps the loop fires the workspace poll, the due
//! debounce timer and the backstop ticks in time order.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use super::Watcher;
use crate::config::SchedulerConfig;
use crate::export::{ExportOutcome, ExportSink};
use crate::extract::ScanReport;
use crate::host::{Clock, FixtureTree, LocalClock, ManualClock};
use crate::shortcut::KeyPress;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    /// Wall-clock time at `at_ms = 0`. Defaults to the local time of replay.
    #[serde(default)]
    pub started_at: Option<NaiveDateTime>,

    #[serde(default)]
    pub steps: Vec<ReplayStep>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayStep {
    pub at_ms: u64,

    #[serde(default)]
    pub tree: Option<FixtureTree>,

    #[serde(default)]
    pub key: Option<KeyPress>,
}

impl Trace {
    /// Load a trace from YAML, or JSON when the extension is `.json`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read trace {}", path.display()))?;

        let is_json = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let trace = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse trace {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse trace {}", path.display()))?
        };
        Ok(trace)
    }

    pub fn origin(&self) -> NaiveDateTime {
        self.started_at.unwrap_or_else(|| LocalClock.now())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub scans: usize,
    pub failed_scans: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub element_failures: usize,
    pub exports: Vec<ExportOutcome>,
}

impl ReplayReport {
    fn absorb(&mut self, scan: &ScanReport) {
        self.scans += 1;
        self.accepted += scan.accepted;
        self.duplicates += scan.duplicates;
        self.element_failures += scan.failures.len();
    }
}

struct Replayer<'a, S: ExportSink> {
    watcher: &'a mut Watcher<S, ManualClock>,
    tree: FixtureTree,
    poll_ms: u64,
    backstop_ms: u64,
    next_poll: u64,
    next_tick: u64,
    report: ReplayReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Poll,
    Debounce,
    Backstop,
}

/// Replay `trace` into `watcher`, then let pending work settle for one
/// debounce window plus one backstop interval.
pub fn replay<S: ExportSink>(
    watcher: &mut Watcher<S, ManualClock>,
    trace: &Trace,
    timing: &SchedulerConfig,
) -> ReplayReport {
    let mut steps = trace.steps.clone();
    steps.sort_by_key(|step| step.at_ms);

    let settle_at = steps
        .last()
        .map_or(0, |step| step.at_ms)
        .saturating_add(timing.debounce_ms)
        .saturating_add(timing.backstop_interval_ms);

    let mut replayer = Replayer {
        watcher,
        tree: FixtureTree::loading(),
        poll_ms: timing.workspace_poll_ms.max(1),
        backstop_ms: timing.backstop_interval_ms.max(1),
        next_poll: 0,
        next_tick: timing.backstop_interval_ms.max(1),
        report: ReplayReport::default(),
    };

    for step in steps {
        replayer.run_timers(step.at_ms);
        replayer.apply(step);
    }
    replayer.run_timers(settle_at);

    let failed_scans = replayer.watcher.failed_scans();
    let mut report = replayer.report;
    report.failed_scans = failed_scans;
    report
}

impl<S: ExportSink> Replayer<'_, S> {
    /// Fire every timer due at or before `until`.
    fn run_timers(&mut self, until: u64) {
        while let Some((at, timer)) = self.next_timer() {
            if at > until {
                break;
            }
            self.watcher.clock().set_elapsed(at);

            match timer {
                Timer::Poll => {
                    if !self.watcher.poll_workspace(&self.tree, at) {
                        self.next_poll = at.saturating_add(self.poll_ms);
                    }
                }
                Timer::Debounce => {
                    if let Some(scan) = self.watcher.on_timer(&self.tree, at) {
                        self.report.absorb(&scan);
                    }
                }
                Timer::Backstop => {
                    if let Some(scan) = self.watcher.on_tick(&self.tree) {
                        self.report.absorb(&scan);
                    }
                    self.next_tick = at.saturating_add(self.backstop_ms);
                }
            }
        }
        self.watcher.clock().set_elapsed(until);
    }

    fn next_timer(&self) -> Option<(u64, Timer)> {
        let poll = self
            .watcher
            .awaiting_workspace()
            .then_some((self.next_poll, Timer::Poll));
        let debounce = self
            .watcher
            .next_deadline()
            .map(|at| (at, Timer::Debounce));
        let backstop = Some((self.next_tick, Timer::Backstop));

        [poll, debounce, backstop].into_iter().flatten().min_by_key(|(at, _)| *at)
    }

    fn apply(&mut self, step: ReplayStep) {
        if let Some(tree) = step.tree {
            self.tree = tree;
            if self.watcher.awaiting_workspace() {
                debug!(at_ms = step.at_ms, "tree changed before workspace was observed");
            } else {
                self.watcher.on_mutations(&self.tree, step.at_ms);
            }
        }

        if let Some(key) = step.key {
            if let Some(outcome) = self.watcher.on_key(&key) {
                self.report.exports.push(outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ExportError;
    use crate::export::ExportDocument;
    use crate::host::FixtureMessage;
    use crate::record::ConversationId;
    use chrono::NaiveDate;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Vec<ExportDocument>,
    }

    impl ExportSink for RecordingSink {
        fn deliver(&mut self, document: &ExportDocument) -> Result<(), ExportError> {
            self.delivered.push(document.clone());
            Ok(())
        }
    }

    fn watcher(config: &Config) -> Watcher<RecordingSink, ManualClock> {
        let clock = ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 6, 5)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap(),
        );
        Watcher::new(config, RecordingSink::default(), clock).unwrap()
    }

    fn chord() -> KeyPress {
        KeyPress {
            ctrl: true,
            shift: true,
            key: "E".to_string(),
            ..Default::default()
        }
    }

    fn step(at_ms: u64, tree: FixtureTree) -> ReplayStep {
        ReplayStep {
            at_ms,
            tree: Some(tree),
            key: None,
        }
    }

    #[test]
    fn test_replay_alice_and_bob_then_export() {
        let config = Config::default();
        let mut watcher = watcher(&config);

        let alice = FixtureTree::conversation(
            "Alice",
            vec![FixtureMessage::text("[10:15, 05/06/2024] Alice: ", "Hello")],
        );
        let bob_first = FixtureTree::conversation(
            "Bob",
            vec![FixtureMessage::text("[11:00, 05/06/2024] Bob: ", "First")],
        );
        let mut bob_both = bob_first.clone();
        bob_both
            .messages
            .push(FixtureMessage::text("[11:01, 05/06/2024] Bob: ", "Second"));

        let trace = Trace {
            started_at: None,
            steps: vec![
                step(0, alice.clone()),
                step(1_500, alice.clone()),
                step(1_700, alice),
                step(4_000, bob_first),
                step(4_200, bob_both),
                ReplayStep {
                    at_ms: 9_000,
                    tree: None,
                    key: Some(chord()),
                },
            ],
        };

        let report = replay(&mut watcher, &trace, &config.scheduler);

        assert_eq!(report.accepted, 3);
        assert_eq!(report.failed_scans, 0);
        assert_eq!(report.exports.len(), 1);
        assert!(matches!(
            report.exports[0],
            ExportOutcome::Delivered {
                conversations: 2,
                records: 3,
                ..
            }
        ));

        let payload = &watcher.sink().delivered[0].payload;
        let alice_at = payload.find("=== Alice ===").unwrap();
        let bob_at = payload.find("=== Bob ===").unwrap();
        let first_at = payload.find("Text: First").unwrap();
        let second_at = payload.find("Text: Second").unwrap();
        assert!(alice_at < bob_at && bob_at < first_at && first_at < second_at);
    }

    #[test]
    fn test_replay_coalesces_bursts() {
        let config = Config::default();
        let mut watcher = watcher(&config);
        let alice = FixtureTree::conversation(
            "Alice",
            vec![FixtureMessage::text("[10:15, 05/06/2024]", "Hello")],
        );

        // workspace is found by the poll at 1000ms
        let mut steps = vec![step(500, alice.clone())];
        for at in (1_100..=1_900).step_by(200) {
            steps.push(step(at, alice.clone()));
        }
        let trace = Trace {
            started_at: None,
            steps,
        };

        let report = replay(&mut watcher, &trace, &config.scheduler);

        // debounced scan at 2900ms, backstop tick at 5000ms
        assert_eq!(report.scans, 2);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(
            watcher.state(),
            &crate::scheduler::ScanState::Watching(ConversationId::from("Alice"))
        );
    }

    #[test]
    fn test_single_snapshot_is_captured() {
        let config = Config::default();
        let alice = FixtureTree::conversation(
            "Alice",
            vec![FixtureMessage::text("[10:15, 05/06/2024] Alice: ", "Hello")],
        );

        for at_ms in [0, 300, 1_000] {
            let mut watcher = watcher(&config);
            let trace = Trace {
                started_at: None,
                steps: vec![step(at_ms, alice.clone())],
            };

            let report = replay(&mut watcher, &trace, &config.scheduler);
            assert_eq!(report.accepted, 1, "snapshot at {}ms", at_ms);
            assert_eq!(
                watcher
                    .aggregator()
                    .records(&ConversationId::from("Alice"))
                    .len(),
                1
            );
        }
    }

    #[test]
    fn test_zero_intervals_still_terminate() {
        let config = Config::default();
        let mut watcher = watcher(&config);
        let timing = SchedulerConfig {
            debounce_ms: 0,
            backstop_interval_ms: 0,
            workspace_poll_ms: 0,
        };
        let trace = Trace {
            started_at: None,
            steps: vec![step(200, FixtureTree::loading())],
        };

        let report = replay(&mut watcher, &trace, &timing);
        assert_eq!(report.accepted, 0);
        assert!(watcher.awaiting_workspace());
    }

    #[test]
    fn test_export_with_nothing_captured() {
        let config = Config::default();
        let mut watcher = watcher(&config);
        let trace = Trace {
            started_at: None,
            steps: vec![ReplayStep {
                at_ms: 100,
                tree: None,
                key: Some(chord()),
            }],
        };

        let report = replay(&mut watcher, &trace, &config.scheduler);
        assert_eq!(report.exports, vec![ExportOutcome::NothingToExport]);
        assert!(watcher.sink().delivered.is_empty());
    }

    #[test]
    fn test_demo_trace() {
        let trace: Trace =
            serde_yaml::from_str(include_str!("../../demos/two_conversations.yaml")).unwrap();
        let config = Config::default();
        let mut watcher = watcher(&config);

        let report = replay(&mut watcher, &trace, &config.scheduler);

        assert_eq!(report.accepted, 6);
        assert_eq!(report.element_failures, 0);
        assert_eq!(report.exports.len(), 1);
        assert_eq!(watcher.resolver().ledger().video_count(), 1);

        let payload = &watcher.sink().delivered[0].payload;
        assert!(payload.contains("Image: https://media.example.net/alice/beach.jpg"));
        assert!(payload.contains("Text: Second\nwith a second line"));
        assert!(payload.contains("Video: blob:https://web.example.net/3f2a"));
        assert!(payload.contains("Document: attached"));
        assert!(payload.contains("From: Bob"));
    }

    #[test]
    fn test_trace_yaml_parsing() {
        let yaml = r#"
started_at: "2024-06-05T18:00:00"
steps:
  - at_ms: 1500
    tree:
      title: Alice
      messages:
        - pre_plain_text: "[10:15, 05/06/2024] Alice: "
          spans: ["Hello"]
  - at_ms: 9000
    key: { ctrl: true, shift: true, key: "e" }
"#;
        let trace: Trace = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(trace.steps.len(), 2);
        assert_eq!(
            trace.origin(),
            NaiveDate::from_ymd_opt(2024, 6, 5)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap()
        );
        assert!(trace.steps[1].key.is_some());
    }
}
