//! Per-conversation record aggregation

use std::collections::{HashMap, HashSet};

use crate::record::{ConversationId, DedupKey, MessageRecord};

/// Accepted keys and records for one conversation.
#[derive(Debug)]
struct ConversationLog {
    identity: ConversationId,
    keys: HashSet<DedupKey>,
    records: Vec<MessageRecord>,
}

/// Owns every conversation log. Conversations keep the order in which they
/// first accepted a record; records keep acceptance order.
#[derive(Debug, Default)]
pub struct Aggregator {
    logs: Vec<ConversationLog>,
    index: HashMap<ConversationId, usize>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` under `identity` unless `key` was already accepted
    /// there. Returns whether the record was newly accepted.
    pub fn accept_if_new(
        &mut self,
        identity: &ConversationId,
        key: DedupKey,
        record: MessageRecord,
    ) -> bool {
        let slot = match self.index.get(identity) {
            Some(&slot) => slot,
            None => {
                self.logs.push(ConversationLog {
                    identity: identity.clone(),
                    keys: HashSet::new(),
                    records: vec![],
                });
                let slot = self.logs.len() - 1;
                self.index.insert(identity.clone(), slot);
                slot
            }
        };

        let log = &mut self.logs[slot];
        if !log.keys.insert(key) {
            return false;
        }
        log.records.push(record);
        true
    }

    pub fn contains(&self, identity: &ConversationId, key: &DedupKey) -> bool {
        self.index
            .get(identity)
            .map_or(false, |&slot| self.logs[slot].keys.contains(key))
    }

    /// Conversations in first-seen order with their records in acceptance
    /// order.
    pub fn snapshot(&self) -> impl Iterator<Item = (&ConversationId, &[MessageRecord])> + '_ {
        self.logs
            .iter()
            .map(|log| (&log.identity, log.records.as_slice()))
    }

    pub fn records(&self, identity: &ConversationId) -> &[MessageRecord] {
        self.index
            .get(identity)
            .map(|&slot| self.logs[slot].records.as_slice())
            .unwrap_or(&[])
    }

    pub fn conversation_count(&self) -> usize {
        self.logs.len()
    }

    pub fn record_count(&self) -> usize {
        self.logs.iter().map(|log| log.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}
