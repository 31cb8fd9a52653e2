use std::time::Duration;

use thiserror::Error;

use crate::{
    client::{CarbonClient, ClientConfiguration},
    writer::SMALLEST_VALID_PAYLOAD,
};

const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_MAX_PAYLOAD_LEN: usize = 8192;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Errors that could occur while building a Carbon client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The maximum payload length cannot hold even the smallest possible line.
    #[error("maximum payload length must be at least {minimum} bytes (got {actual})")]
    InvalidMaximumPayloadLength {
        /// Smallest accepted payload length.
        minimum: usize,
        /// Configured payload length.
        actual: usize,
    },
}

/// Builder for a [`CarbonClient`].
#[derive(Clone, Debug)]
pub struct CarbonClientBuilder {
    write_timeout: Duration,
    connect_timeout: Duration,
    max_payload_len: usize,
    flush_interval: Duration,
    reconnect_delay: Duration,
    telemetry: bool,
}

impl CarbonClientBuilder {
    /// Creates a new `CarbonClientBuilder` with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the write timeout for sending payloads.
    ///
    /// When the write timeout is reached, the connection is considered broken: it is re-established and the write is
    /// retried once before the payload is dropped.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the timeout for establishing a connection to the Carbon server.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the maximum payload length.
    ///
    /// Lines are buffered into payloads of at most this many bytes before being written to the socket. A line longer
    /// than this on its own is dropped.
    ///
    /// Defaults to 8192 bytes.
    #[must_use]
    pub fn with_maximum_payload_length(mut self, max_payload_len: usize) -> Self {
        self.max_payload_len = max_payload_len;
        self
    }

    /// Set the flush interval.
    ///
    /// Buffered lines are written out by the first `send` after this much time has passed since the previous flush,
    /// even if the current payload is not full. Setting this to zero writes every line as soon as it is sent.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Set the minimum delay between failed connection attempts.
    ///
    /// Payloads flushed while waiting to reconnect are dropped.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self
    }

    /// Sets whether or not to enable telemetry for the client.
    ///
    /// When enabled, counters describing the client's own operation (lines written and dropped, payloads and bytes
    /// sent, connections made, and so on) are registered under the `carbon.client` namespace with the globally
    /// installed `metrics` recorder.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: bool) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Builds the client.
    ///
    /// The client must be initialized with [`CarbonClient::init`] before lines can be sent.
    ///
    /// # Errors
    ///
    /// If the maximum payload length is too small to hold any line, an error will be returned.
    pub fn build(self) -> Result<CarbonClient, BuildError> {
        if self.max_payload_len < SMALLEST_VALID_PAYLOAD.len() {
            return Err(BuildError::InvalidMaximumPayloadLength {
                minimum: SMALLEST_VALID_PAYLOAD.len(),
                actual: self.max_payload_len,
            });
        }

        Ok(CarbonClient::new(ClientConfiguration {
            write_timeout: self.write_timeout,
            connect_timeout: self.connect_timeout,
            max_payload_len: self.max_payload_len,
            flush_interval: self.flush_interval,
            reconnect_delay: self.reconnect_delay,
            telemetry: self.telemetry,
        }))
    }
}

impl Default for CarbonClientBuilder {
    fn default() -> Self {
        CarbonClientBuilder {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            telemetry: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BuildError, CarbonClientBuilder};

    #[test]
    fn rejects_tiny_payload_length() {
        let result = CarbonClientBuilder::new().with_maximum_payload_length(3).build();
        assert!(matches!(result, Err(BuildError::InvalidMaximumPayloadLength { minimum: 6, actual: 3 })));
    }

    #[test]
    fn builds_with_defaults() {
        let client = CarbonClientBuilder::default().build().expect("default builder should be valid");
        assert!(!client.is_connected());
    }
}
