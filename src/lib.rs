pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod host;
pub mod logging;
pub mod media;
pub mod record;
pub mod runtime;
pub mod scheduler;
pub mod shortcut;
pub mod timestamp;

pub use aggregate::Aggregator;
pub use config::Config;
pub use record::{ConversationId, DedupKey, MessageRecord};
pub use runtime::Watcher;
