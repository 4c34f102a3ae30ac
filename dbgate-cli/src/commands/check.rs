//! Check command - prove the configured database is reachable

use anyhow::{bail, Context, Result};
use dbgate_core::DataServices;
use tracing::info;

pub async fn run_check(services: &DataServices) -> Result<()> {
    let factory = services.factory();
    let mut session = factory
        .open_session()
        .await
        .context("Failed to open a session")?;
    let one: i64 = session.scalar("SELECT 1", None).await?;
    if one != 1 {
        bail!("SELECT 1 returned {one}");
    }

    let target = services.config().describe(factory.kind());
    info!(database = %target, "connection ok");
    println!("ok: {target}");
    Ok(())
}
