//! Scan scheduling state machine
//!
//! Mutation batches arrive in bursts while a conversation renders. Each batch
//! pushes the pending scan out by the debounce window, so a burst collapses
//! into one scan once activity settles. A coarse backstop tick rescans the
//! current conversation regardless, for content that finished rendering
//! without further mutations.
//!
//! Time is a logical millisecond counter owned by the caller, which keeps
//! every transition testable without a real clock.

use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::record::ConversationId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    /// The workspace container has not rendered yet.
    AwaitingWorkspace,
    /// Workspace observed, no conversation seen yet.
    Idle,
    Watching(ConversationId),
    PendingScan { identity: ConversationId, due_at: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTrigger {
    Debounce,
    Backstop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub identity: ConversationId,
    pub trigger: ScanTrigger,
}

pub struct ScanScheduler {
    state: ScanState,
    debounce_ms: u64,
}

impl ScanScheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            state: ScanState::AwaitingWorkspace,
            debounce_ms: config.debounce_ms,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn awaiting_workspace(&self) -> bool {
        self.state == ScanState::AwaitingWorkspace
    }

    /// The conversation currently watched or pending a scan.
    pub fn current_identity(&self) -> Option<&ConversationId> {
        match &self.state {
            ScanState::Watching(identity) | ScanState::PendingScan { identity, .. } => {
                Some(identity)
            }
            ScanState::AwaitingWorkspace | ScanState::Idle => None,
        }
    }

    /// Due time of the pending scan, if one is scheduled.
    pub fn next_deadline(&self) -> Option<u64> {
        match self.state {
            ScanState::PendingScan { due_at, .. } => Some(due_at),
            _ => None,
        }
    }

    /// The workspace container was found. Returns true on the first call.
    pub fn on_workspace_found(&mut self) -> bool {
        if !self.awaiting_workspace() {
            return false;
        }
        info!("conversation workspace found, observing mutations");
        self.state = ScanState::Idle;
        true
    }

    /// A mutation batch arrived while `title` was displayed.
    pub fn on_mutations(&mut self, title: Option<&str>, now_ms: u64) {
        if self.awaiting_workspace() {
            return;
        }
        let Some(title) = title else {
            return;
        };

        if self.current_identity().map(ConversationId::as_str) != Some(title) {
            info!(conversation = title, "conversation changed");
        }

        let due_at = now_ms.saturating_add(self.debounce_ms);
        debug!(conversation = title, due_at, "scan scheduled");
        self.state = ScanState::PendingScan {
            identity: ConversationId::new(title),
            due_at,
        };
    }

    /// Fire the pending scan if its deadline has passed.
    pub fn fire_due(&mut self, now_ms: u64) -> Option<ScanRequest> {
        let identity = match &self.state {
            ScanState::PendingScan { identity, due_at } if *due_at <= now_ms => identity.clone(),
            _ => return None,
        };

        self.state = ScanState::Watching(identity.clone());
        Some(ScanRequest {
            identity,
            trigger: ScanTrigger::Debounce,
        })
    }

    /// Backstop tick. Leaves any pending deadline alone.
    pub fn on_tick(&self) -> Option<ScanRequest> {
        self.current_identity().map(|identity| ScanRequest {
            identity: identity.clone(),
            trigger: ScanTrigger::Backstop,
        })
    }
}
