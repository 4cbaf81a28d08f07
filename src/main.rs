use sf_smartlead_sync::models::SyncMode;
use sf_smartlead_sync::{obs, sync};

/// Negative Review lead sync.
///
/// Runs once and exits; meant to be triggered by a scheduler. Failures are
/// logged and the process still exits with status 0.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    sync::run(SyncMode::LeadsOnly).await;

    Ok(())
}
