//! Background reclamation of expired rows.
//!
//! Redemption and session lookup never depend on this task; expired rows are
//! already inert. The sweeper only keeps the tables from growing unbounded.

use sqlx::PgPool;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error};

use super::{otc, storage};

/// Spawn a background task that deletes expired/used codes and expired
/// sessions on a fixed cadence.
pub fn spawn_sweeper(pool: PgPool, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = if interval.is_zero() {
            Duration::from_secs(1)
        } else {
            interval
        };

        loop {
            match otc::sweep_codes(&pool).await {
                Ok(swept) if swept > 0 => debug!("swept {swept} sign-in codes"),
                Ok(_) => {}
                Err(err) => error!("sign-in code sweep failed: {err}"),
            }
            match storage::sweep_sessions(&pool).await {
                Ok(swept) if swept > 0 => debug!("swept {swept} sessions"),
                Ok(_) => {}
                Err(err) => error!("session sweep failed: {err}"),
            }

            sleep(interval).await;
        }
    })
}
