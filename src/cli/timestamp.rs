//! Timestamp command implementation

use anyhow::Result;

use crate::host::{Clock, LocalClock};
use crate::record::split_sender;
use crate::timestamp;

pub fn run(label: &str) -> Result<()> {
    let (stamp, sender) = split_sender(label);
    let normalized = timestamp::normalize(stamp, LocalClock.now());

    println!("Label:   {:?}", label);
    if let Some(sender) = sender {
        println!("Sender:  {}", sender);
    }
    println!("Value:   {}", normalized.value.format("%Y-%m-%d %H:%M:%S"));
    println!("Quality: {}", normalized.quality.as_str());
    Ok(())
}
