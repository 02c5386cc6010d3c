use std::future::Future;
use std::time::Duration;

use alloy::primitives::TxHash;
use tracing::{debug, warn};

use crate::config::PollConfig;
use crate::domain::{BatchHandle, CallsStatus};
use crate::error::ProviderError;
use crate::ports::{ClockPort, PortError};

/// Bounded wait for a batch to produce its first transaction hash.
pub struct StatusPoller<'a, C> {
    clock: &'a C,
    config: PollConfig,
}

impl<'a, C: ClockPort> StatusPoller<'a, C> {
    pub fn new(clock: &'a C, config: PollConfig) -> Self {
        Self { clock, config }
    }

    /// Calls `poll` with a per-attempt timeout until the batch resolves or the
    /// budget is spent. At least one attempt is always made.
    ///
    /// Backend errors end the wait; only unresolved statuses are retried.
    pub async fn wait_for_transaction_hash<F, Fut>(
        &self,
        handle: &BatchHandle,
        mut poll: F,
    ) -> Result<TxHash, ProviderError>
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = Result<CallsStatus, PortError>>,
    {
        let started = self.clock.now_ms()?;
        let budget = self.config.budget_ms;
        let mut polls: u32 = 0;

        loop {
            let elapsed = self.clock.now_ms()?.saturating_sub(started);
            let remaining = budget.saturating_sub(elapsed);
            let attempt_timeout = self.config.attempt_timeout_ms.min(remaining.max(1));

            let status = poll(Duration::from_millis(attempt_timeout)).await?;
            polls = polls.saturating_add(1);

            if status.is_resolved() {
                debug!(%handle, status = status.status, polls, "batch resolved");
                return status.first_transaction_hash().ok_or_else(|| {
                    ProviderError::MalformedBackendResponse(format!(
                        "batch {handle} resolved with status {} but no receipts",
                        status.status
                    ))
                });
            }

            let elapsed = self.clock.now_ms()?.saturating_sub(started);
            if elapsed >= budget {
                warn!(%handle, polls, elapsed_ms = elapsed, "gave up waiting for batch receipt");
                return Err(ProviderError::OperationTimedOut {
                    handle: handle.clone(),
                    elapsed: Duration::from_millis(elapsed),
                    polls,
                });
            }

            let pause = self.config.interval_ms.min(budget - elapsed);
            self.clock.sleep(Duration::from_millis(pause)).await;
        }
    }
}
