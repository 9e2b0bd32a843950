//! API server command — `sluice serve`.

use std::path::Path;

use anyhow::Result;

use sluice::config::SluiceConfig;
use sluice::workorder::server;

pub async fn run(
    dir: &Path,
    mut config: SluiceConfig,
    port: Option<u16>,
    dev: bool,
) -> Result<()> {
    // CLI flags win over file and environment
    if let Some(port) = port {
        config.server.port = port;
    }
    if dev {
        config.server.dev_mode = true;
    }
    config.database.path = super::db_path(dir, &config);

    server::start_server(config).await
}
