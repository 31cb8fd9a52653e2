use std::error::Error;

use carbon_client::{CarbonClient, ClientError, LineMetadata};

/// The outbound side of the write path.
///
/// A transport owns the connection to the Graphite-compatible store, along with any buffering and reconnection
/// behavior. The write path only hands lines to it and never inspects whether they were delivered.
pub trait Transport {
    /// The error type returned by transport operations.
    type Error: Error + Send + Sync + 'static;

    /// Prepares the transport to send to the given server.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be prepared, for example because the server address does not resolve.
    fn init(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    /// Releases the transport's resources, delivering anything still buffered if possible.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered data could not be delivered.
    fn deinit(&mut self) -> Result<(), Self::Error>;

    /// Hands a single `<path> <value>` line to the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the line could not be accepted or sent.
    fn send(&mut self, path: &str, value: u64, metadata: Option<LineMetadata>) -> Result<(), Self::Error>;
}

impl Transport for CarbonClient {
    type Error = ClientError;

    fn init(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        CarbonClient::init(self, host, port)
    }

    fn deinit(&mut self) -> Result<(), Self::Error> {
        CarbonClient::deinit(self)
    }

    fn send(&mut self, path: &str, value: u64, metadata: Option<LineMetadata>) -> Result<(), Self::Error> {
        CarbonClient::send(self, path, value, metadata)
    }
}
