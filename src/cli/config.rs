//! Config command implementation

use anyhow::{Context, Result};

use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to encode config")?;
    print!("{}", yaml);
    Ok(())
}
