//! Rotation scheduling — fires at the next local midnight, then daily.

use std::time::Duration;

use chrono::{Local, TimeZone};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::store::LogStore;

const ONE_DAY: Duration = Duration::from_secs(24 * 3600);

/// Run retention rotation at every local midnight until shutdown.
pub async fn run_rotation(store: LogStore, mut shutdown: watch::Receiver<bool>) {
    loop {
        let wait = duration_until_next_midnight();
        debug!(seconds = wait.as_secs(), "next log rotation scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                match store.rotate() {
                    Ok(removed) => info!(removed, "scheduled log rotation completed"),
                    Err(e) => error!(error = %e, "scheduled log rotation failed"),
                }
            }
            _ = shutdown.changed() => {
                debug!("rotation loop shutting down");
                break;
            }
        }
    }
}

/// Wall-clock distance to the next local midnight; a full day when
/// the local calendar maths cannot resolve (DST edge).
fn duration_until_next_midnight() -> Duration {
    let now = Local::now();
    let Some(tomorrow) = now.date_naive().succ_opt() else {
        return ONE_DAY;
    };
    let Some(midnight) = tomorrow.and_hms_opt(0, 0, 0) else {
        return ONE_DAY;
    };
    match Local.from_local_datetime(&midnight).earliest() {
        Some(next) => (next - now).to_std().unwrap_or(ONE_DAY),
        None => ONE_DAY,
    }
}
