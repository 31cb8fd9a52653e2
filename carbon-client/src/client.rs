use std::{
    io::{self, Write as _},
    net::{SocketAddr, TcpStream, ToSocketAddrs as _},
    time::{Duration, Instant, SystemTime},
};

use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::{
    telemetry::{Telemetry, TelemetryUpdate},
    writer::LineWriter,
};

/// Errors that could occur while sending metrics to a Carbon server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to resolve the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the resolution failure.
        reason: String,
    },

    /// The client was used before `init` was called.
    #[error("client has not been initialized")]
    NotInitialized,

    /// A line was not buffered because its path is unusable or it exceeds the maximum payload length.
    #[error("line for metric path '{path}' was dropped")]
    LineDropped {
        /// Metric path of the dropped line.
        path: String,
    },

    /// Buffered payloads could not be written to the remote server and were dropped.
    #[error("failed to send payload: {0}")]
    Io(#[from] io::Error),
}

/// Optional per-line metadata.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineMetadata {
    /// Unix timestamp, in seconds, to stamp the line with.
    ///
    /// When absent, the line is stamped with the current time.
    pub timestamp: Option<u64>,
}

impl LineMetadata {
    /// Creates metadata carrying an explicit timestamp.
    pub const fn with_timestamp(timestamp: u64) -> Self {
        Self { timestamp: Some(timestamp) }
    }
}

/// Client configuration.
#[derive(Clone, Debug)]
pub(crate) struct ClientConfiguration {
    pub write_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_payload_len: usize,
    pub flush_interval: Duration,
    pub reconnect_delay: Duration,
    pub telemetry: bool,
}

enum ClientState {
    // Intermediate state during send attempts.
    Inconsistent,

    // Not connected. Holds the time of the last failed connection attempt, if any.
    Disconnected(Option<Instant>),

    // Connected and ready to send.
    Ready(TcpStream),
}

struct Connection {
    addrs: Vec<SocketAddr>,
    config: ClientConfiguration,
    state: ClientState,
}

impl Connection {
    fn new(addrs: Vec<SocketAddr>, config: ClientConfiguration) -> Self {
        Connection { addrs, config, state: ClientState::Disconnected(None) }
    }

    fn open_stream(&self) -> io::Result<TcpStream> {
        let mut last_error = None;
        for addr in &self.addrs {
            match TcpStream::connect_timeout(addr, self.config.connect_timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(self.config.write_timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(%addr, error = %e, "Failed to connect to Carbon server.");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses to connect to")))
    }

    /// Attempts to connect if currently disconnected.
    ///
    /// Connection attempts are rate-limited by the reconnect delay after a failure.
    fn ensure_connected(&mut self, telemetry: &mut TelemetryUpdate) -> io::Result<()> {
        let old_state = std::mem::replace(&mut self.state, ClientState::Inconsistent);
        match old_state {
            ClientState::Inconsistent => unreachable!("transitioned _from_ inconsistent state"),
            ClientState::Ready(stream) => {
                self.state = ClientState::Ready(stream);
                Ok(())
            }
            ClientState::Disconnected(Some(last_attempt))
                if last_attempt.elapsed() < self.config.reconnect_delay =>
            {
                self.state = ClientState::Disconnected(Some(last_attempt));
                Err(io::Error::new(io::ErrorKind::NotConnected, "waiting before reconnecting"))
            }
            ClientState::Disconnected(_) => match self.open_stream() {
                Ok(stream) => {
                    debug!(addrs = ?self.addrs, "Connected to Carbon server.");
                    telemetry.track_connect();
                    self.state = ClientState::Ready(stream);
                    Ok(())
                }
                Err(e) => {
                    self.state = ClientState::Disconnected(Some(Instant::now()));
                    Err(e)
                }
            },
        }
    }

    /// Writes a payload, reconnecting and retrying once if an established connection turns out to be broken.
    fn try_send(&mut self, payload: &[u8], telemetry: &mut TelemetryUpdate) -> io::Result<()> {
        let mut retried = false;
        loop {
            self.ensure_connected(telemetry)?;

            let old_state = std::mem::replace(&mut self.state, ClientState::Inconsistent);
            let ClientState::Ready(mut stream) = old_state else {
                unreachable!("connection must be ready after connecting");
            };

            match stream.write_all(payload) {
                Ok(()) => {
                    self.state = ClientState::Ready(stream);
                    return Ok(());
                }
                Err(e) => {
                    self.state = ClientState::Disconnected(None);
                    if retried {
                        return Err(e);
                    }

                    debug!(error = %e, "Connection to Carbon server lost, reconnecting.");
                    retried = true;
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        matches!(self.state, ClientState::Ready(_))
    }

    fn close(&mut self) {
        if let ClientState::Ready(stream) = std::mem::replace(&mut self.state, ClientState::Disconnected(None)) {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

/// A synchronous client for the Graphite plaintext protocol.
///
/// Lines are buffered into payloads and written to the Carbon server whenever a payload fills up, the flush interval
/// has elapsed since the last flush, or [`flush`](CarbonClient::flush)/[`deinit`](CarbonClient::deinit) is called.
/// The connection is established lazily and re-established transparently when it breaks.
pub struct CarbonClient {
    config: ClientConfiguration,
    writer: LineWriter,
    connection: Option<Connection>,
    last_flush: Instant,
    telemetry: Option<Telemetry>,
    telemetry_update: TelemetryUpdate,
}

impl CarbonClient {
    pub(crate) fn new(config: ClientConfiguration) -> Self {
        CarbonClient {
            writer: LineWriter::new(config.max_payload_len),
            config,
            connection: None,
            last_flush: Instant::now(),
            telemetry: None,
            telemetry_update: TelemetryUpdate::default(),
        }
    }

    /// Prepares the client to send to the given Carbon server.
    ///
    /// The address is resolved immediately and a connection is attempted. A failed connection attempt is not an error:
    /// it is logged and retried on the next flush.
    ///
    /// # Errors
    ///
    /// If the address cannot be resolved, an error will be returned.
    pub fn init(&mut self, host: &str, port: u16) -> Result<(), ClientError> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| ClientError::InvalidRemoteAddress { reason: e.to_string() })?
            .collect::<Vec<_>>();
        if addrs.is_empty() {
            return Err(ClientError::InvalidRemoteAddress {
                reason: format!("'{}:{}' did not resolve to any address", host, port),
            });
        }

        info!(host, port, "Initializing Carbon client.");

        let mut connection = Connection::new(addrs, self.config.clone());
        if let Err(e) = connection.ensure_connected(&mut self.telemetry_update) {
            warn!(error = %e, "Failed to connect to Carbon server, will retry on next flush.");
        }

        self.connection = Some(connection);
        self.last_flush = Instant::now();
        self.update_telemetry();

        Ok(())
    }

    /// Returns `true` if the client currently holds an open connection.
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_connected)
    }

    /// Buffers a single line, flushing if a payload is full or the flush interval has elapsed.
    ///
    /// # Errors
    ///
    /// If the client has not been initialized, the line could not be buffered, or a flush triggered by this call failed
    /// to deliver buffered payloads, an error will be returned.
    pub fn send(&mut self, path: &str, value: u64, metadata: Option<LineMetadata>) -> Result<(), ClientError> {
        if self.connection.is_none() {
            return Err(ClientError::NotInitialized);
        }

        let timestamp = metadata.and_then(|m| m.timestamp).unwrap_or_else(unix_timestamp);

        let result = self.writer.write_line(path, value, timestamp);
        self.telemetry_update.track_lines(result.lines_written(), result.lines_dropped());
        if result.any_failures() {
            debug!(path, "Dropped line that could not be written.");
            self.update_telemetry();
            return Err(ClientError::LineDropped { path: path.to_string() });
        }

        trace!(path, value, timestamp, "Buffered line.");

        if self.writer.has_full_payload() || self.last_flush.elapsed() >= self.config.flush_interval {
            return self.flush();
        }

        Ok(())
    }

    /// Writes all buffered lines to the Carbon server.
    ///
    /// Payloads that cannot be written are dropped.
    ///
    /// # Errors
    ///
    /// If the client has not been initialized, or any payload could not be written, an error will be returned. The
    /// error describes the first failed payload.
    pub fn flush(&mut self) -> Result<(), ClientError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(ClientError::NotInitialized);
        };

        self.last_flush = Instant::now();
        if self.writer.is_empty() {
            return Ok(());
        }

        let mut payloads = self.writer.payloads();
        debug!(num_payloads = payloads.len(), "Flushing payloads.");

        let mut first_error = None;
        while let Some(payload) = payloads.next_payload() {
            match connection.try_send(payload, &mut self.telemetry_update) {
                Ok(()) => self.telemetry_update.track_payload_send_succeeded(payload.len()),
                Err(e) => {
                    error!(error = %e, payload_len = payload.len(), "Failed to send payload.");
                    self.telemetry_update.track_payload_send_failed(payload.len());
                    first_error.get_or_insert(e);
                }
            }
        }
        drop(payloads);

        self.update_telemetry();

        match first_error {
            Some(e) => Err(ClientError::Io(e)),
            None => Ok(()),
        }
    }

    /// Flushes any buffered lines and closes the connection.
    ///
    /// Calling `deinit` on a client that was never initialized does nothing.
    ///
    /// # Errors
    ///
    /// If the final flush fails, an error will be returned. The connection is closed regardless.
    pub fn deinit(&mut self) -> Result<(), ClientError> {
        if self.connection.is_none() {
            return Ok(());
        }

        info!("Shutting down Carbon client.");

        let result = self.flush();
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }

        result
    }

    fn update_telemetry(&mut self) {
        // Telemetry handles are registered lazily so that they go through whatever recorder is installed by the time
        // the client actually has something to report.
        if self.config.telemetry && self.telemetry_update.had_updates() {
            let telemetry = self.telemetry.get_or_insert_with(|| Telemetry::new("tcp"));
            telemetry.apply_update(&self.telemetry_update);
        }

        self.telemetry_update.clear();
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::{
        io::Read as _,
        net::{SocketAddr, TcpListener},
        time::Duration,
    };

    use super::{ClientConfiguration, Connection};
    use crate::telemetry::TelemetryUpdate;

    fn test_config() -> ClientConfiguration {
        ClientConfiguration {
            write_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_millis(200),
            max_payload_len: 1024,
            flush_interval: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(60),
            telemetry: false,
        }
    }

    fn unused_addr() -> SocketAddr {
        // Bind and immediately drop a listener so nothing is accepting on the port.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[test]
    fn connect_and_send() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut telemetry = TelemetryUpdate::default();
        let mut connection = Connection::new(vec![addr], test_config());
        connection.try_send(b"a.b 1 2\n", &mut telemetry).unwrap();
        assert!(connection.is_connected());
        assert_eq!(telemetry.connects(), 1);

        connection.close();
        assert!(!connection.is_connected());

        let (mut socket, _) = listener.accept().unwrap();
        let mut received = String::new();
        socket.read_to_string(&mut received).unwrap();
        assert_eq!(received, "a.b 1 2\n");
    }

    #[test]
    fn reconnect_is_rate_limited() {
        let mut telemetry = TelemetryUpdate::default();
        let mut connection = Connection::new(vec![unused_addr()], test_config());

        // The first attempt actually tries to connect and fails.
        let first = connection.try_send(b"a 1 1\n", &mut telemetry).unwrap_err();
        assert_ne!(first.kind(), std::io::ErrorKind::NotConnected);

        // The next attempt happens within the reconnect delay, so no connection is attempted at all.
        let second = connection.try_send(b"a 1 1\n", &mut telemetry).unwrap_err();
        assert_eq!(second.kind(), std::io::ErrorKind::NotConnected);
        assert_eq!(telemetry.connects(), 0);
    }
}
