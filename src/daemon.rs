//! Startup, main loop and shutdown

use tokio::io::AsyncBufRead;
use tracing::info;

use crate::config::{ConnectionConfig, Settings};
use crate::db::AccessLogStore;
use crate::error::StartupError;
use crate::protocol::{self, SessionStats};

/// Validate the store, process `input` until it ends, then disconnect.
///
/// Errors only come from startup; once the loop runs, the daemon ends
/// normally when its input does.
pub async fn serve<R>(
    config: &ConnectionConfig,
    settings: &Settings,
    input: R,
) -> Result<SessionStats, StartupError>
where
    R: AsyncBufRead + Unpin,
{
    let mut store = AccessLogStore::connect(config, settings).await?;
    info!(table = store.table(), "Ready, reading log commands");

    let stats = protocol::run(input, &mut store).await;

    info!(
        appended = stats.appended,
        failed = stats.failed,
        ignored = stats.ignored,
        "Input closed"
    );
    store.close().await;

    Ok(stats)
}
