//! Negative Review sync that also pushes the lead's account colleagues.

use sf_smartlead_sync::models::SyncMode;
use sf_smartlead_sync::{obs, sync};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    if let Some(summary) = sync::run(SyncMode::WithColleagues).await {
        tracing::debug!("Run summary: {:?}", summary);
    }

    Ok(())
}
