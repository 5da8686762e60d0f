//! Connection pool monitoring
//!
//! Transactions opened through [`begin_monitored`] log how long they waited
//! for a pooled connection and how long they held it, whichever way they end
//! (commit, rollback or drop).

use qdp_common::Result;
use sqlx::{Database, Pool, Transaction};
use std::time::Instant;

const SLOW_ACQUIRE_MS: u128 = 1000;
const LONG_HOLD_MS: u128 = 2000;

/// Transaction wrapper that reports connection hold time on release
pub struct MonitoredTransaction<DB: Database> {
    tx: Transaction<'static, DB>,
    timer: HoldTimer,
}

impl<DB: Database> MonitoredTransaction<DB> {
    /// Connection to run statements on
    pub fn conn(&mut self) -> &mut DB::Connection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        let MonitoredTransaction { tx, mut timer } = self;
        tx.commit().await?;
        timer.release("commit");
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        let MonitoredTransaction { tx, mut timer } = self;
        tx.rollback().await?;
        timer.release("rollback");
        Ok(())
    }
}

struct HoldTimer {
    caller: &'static str,
    acquired_at: Instant,
    released: bool,
}

impl HoldTimer {
    fn release(&mut self, how: &'static str) {
        self.released = true;
        let held_ms = self.acquired_at.elapsed().as_millis();
        if held_ms > LONG_HOLD_MS {
            tracing::warn!(
                caller = self.caller,
                held_ms,
                how,
                "Long transaction held a pooled connection"
            );
        } else {
            tracing::debug!(caller = self.caller, held_ms, how, "Connection released");
        }
    }
}

impl Drop for HoldTimer {
    fn drop(&mut self) {
        // sqlx rolls back an unfinished transaction when it is dropped
        if !self.released {
            self.release("drop");
        }
    }
}

/// Begin a transaction, logging connection acquisition time
pub async fn begin_monitored<DB: Database>(
    pool: &Pool<DB>,
    caller: &'static str,
) -> Result<MonitoredTransaction<DB>> {
    let start = Instant::now();
    tracing::debug!(caller, "Connection acquisition requested");

    let tx = pool.begin().await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > SLOW_ACQUIRE_MS {
        tracing::warn!(caller, wait_ms, "Slow connection acquisition, pool may be saturated");
    } else {
        tracing::debug!(caller, wait_ms, "Connection acquired");
    }

    Ok(MonitoredTransaction {
        tx,
        timer: HoldTimer {
            caller,
            acquired_at: Instant::now(),
            released: false,
        },
    })
}
