//! Connection manager configuration.

use std::time::Duration;

/// Tunables for the connection manager.
///
/// There is deliberately no maximum reconnect attempt count: reconnection is
/// unbounded and only stopped by an explicit disconnect, leaving the decision
/// to give up with the human driving the tool.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Timeout for the WebSocket handshake. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Base delay for exponential backoff between reconnect attempts.
    pub reconnect_base_delay: Duration,
    /// Ceiling for the backoff delay.
    pub reconnect_max_delay: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            reconnect_base_delay: Duration::from_millis(1000),
            reconnect_max_delay: Duration::from_millis(30_000),
        }
    }
}

impl ConnectionOptions {
    /// Backoff delay for the given attempt number: `base * 2^attempt`,
    /// capped at `reconnect_max_delay`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.reconnect_base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.reconnect_max_delay.as_millis() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let options = ConnectionOptions::default();
        let delays: Vec<u64> = (0..8)
            .map(|attempt| options.reconnect_delay(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]);
    }

    #[test]
    fn backoff_never_overflows_on_large_attempts() {
        let options = ConnectionOptions::default();
        assert_eq!(options.reconnect_delay(u32::MAX), Duration::from_millis(30_000));
    }
}
