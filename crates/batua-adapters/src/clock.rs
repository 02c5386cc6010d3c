use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use batua_core::{ClockPort, PortError};

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

#[async_trait(?Send)]
impl ClockPort for SystemClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| PortError::Transport(format!("time error: {e}")))?;
        Ok(now.as_millis() as u64)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
