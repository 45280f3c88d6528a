//! Periodic expiry sweeps. Holds and pickup requests carry wall-clock
//! deadlines but nothing pushes them; this task cancels lapsed ready
//! holds and expires overdue ready requests on an interval.

use chrono::Utc;
use sea_orm::DatabaseConnection;
use std::time::Duration;

use crate::services::{hold_service, pickup_service, policy_service};

pub async fn run_sweeper(db: DatabaseConnection, interval_secs: u64) {
    tracing::info!("expiry sweeper started (every {}s)", interval_secs);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;
        let now = Utc::now();
        let policy = policy_service::current_policy(&db).await;

        match hold_service::expire_ready(&db, &policy, None, now).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("expired {} ready hold(s)", n),
            Err(e) => tracing::error!("hold sweep failed: {}", e),
        }

        match pickup_service::expire_overdue(&db, now).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("expired {} pickup request(s)", n),
            Err(e) => tracing::error!("pickup sweep failed: {}", e),
        }
    }
}
