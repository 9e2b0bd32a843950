//! Database initialization — `sluice init`.

use std::path::Path;

use anyhow::{Context, Result};

use sluice::config::SluiceConfig;
use sluice::workorder::store::WorkOrderDb;

pub fn run(dir: &Path, config: SluiceConfig) -> Result<()> {
    let path = super::db_path(dir, &config);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    WorkOrderDb::new(&path).context("Failed to initialize workorder database")?;
    println!("Workorder database initialized at {}", path.display());
    Ok(())
}
