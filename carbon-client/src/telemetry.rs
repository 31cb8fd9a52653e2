use metrics::{counter, Counter};

/// Client telemetry.
///
/// `Telemetry` collects information about the client's behavior and can be optionally enabled to report it as normal
/// metrics through whichever `metrics` recorder is installed in the process.
pub struct Telemetry {
    lines_written: Counter,
    lines_dropped: Counter,
    payloads_sent: Counter,
    payloads_dropped: Counter,
    bytes_sent: Counter,
    bytes_dropped: Counter,
    connects: Counter,
}

impl Telemetry {
    /// Creates a `Telemetry` instance.
    pub fn new(transport: &'static str) -> Self {
        let labels = telemetry_tags!("client_transport" => transport);

        Self {
            lines_written: counter!("carbon.client.lines_written", labels.iter()),
            lines_dropped: counter!("carbon.client.lines_dropped", labels.iter()),
            payloads_sent: counter!("carbon.client.payloads_sent", labels.iter()),
            payloads_dropped: counter!("carbon.client.payloads_dropped", labels.iter()),
            bytes_sent: counter!("carbon.client.bytes_sent", labels.iter()),
            bytes_dropped: counter!("carbon.client.bytes_dropped", labels.iter()),
            connects: counter!("carbon.client.connects", labels.iter()),
        }
    }

    /// Applies the given telemetry update, updating the internal metrics.
    pub fn apply_update(&mut self, update: &TelemetryUpdate) {
        self.lines_written.increment(update.lines_written);
        self.lines_dropped.increment(update.lines_dropped);
        self.payloads_sent.increment(update.payloads_sent);
        self.payloads_dropped.increment(update.payloads_dropped);
        self.bytes_sent.increment(update.bytes_sent);
        self.bytes_dropped.increment(update.bytes_dropped);
        self.connects.increment(update.connects);
    }
}

/// A buffer for collecting telemetry updates.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TelemetryUpdate {
    lines_written: u64,
    lines_dropped: u64,
    payloads_sent: u64,
    payloads_dropped: u64,
    bytes_sent: u64,
    bytes_dropped: u64,
    connects: u64,
}

impl TelemetryUpdate {
    /// Clears the update buffer, resetting it back to an empty state.
    pub fn clear(&mut self) {
        *self = TelemetryUpdate::default();
    }

    /// Returns `true` if any updates have been recorded.
    pub fn had_updates(&self) -> bool {
        *self != TelemetryUpdate::default()
    }

    /// Tracks the outcome of writing lines into the payload buffer.
    pub fn track_lines(&mut self, written: u64, dropped: u64) {
        self.lines_written += written;
        self.lines_dropped += dropped;
    }

    /// Tracks a successful payload send.
    pub fn track_payload_send_succeeded(&mut self, bytes_len: usize) {
        self.payloads_sent += 1;
        self.bytes_sent += bytes_len as u64;
    }

    /// Tracks a failed payload send.
    pub fn track_payload_send_failed(&mut self, bytes_len: usize) {
        self.payloads_dropped += 1;
        self.bytes_dropped += bytes_len as u64;
    }

    /// Tracks a newly established connection.
    pub fn track_connect(&mut self) {
        self.connects += 1;
    }

    #[cfg(test)]
    pub fn connects(&self) -> u64 {
        self.connects
    }

    #[cfg(test)]
    pub fn payloads_dropped(&self) -> u64 {
        self.payloads_dropped
    }
}

macro_rules! _telemetry_tags {
    ($($k:literal => $v:expr),*) => {
        [
            ::metrics::Label::from_static_parts("client", "rust"),
            ::metrics::Label::from_static_parts("client_version", env!("CARGO_PKG_VERSION")),
            $(::metrics::Label::from_static_parts($k, $v),)*
        ]
    };
}

pub(crate) use _telemetry_tags as telemetry_tags;
