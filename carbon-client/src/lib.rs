//! A synchronous client for sending metrics to a [Carbon][carbon] server using the Graphite plaintext protocol.
//!
//! [carbon]: https://graphite.readthedocs.io/en/latest/feeding-carbon.html
//!
//! Every metric is sent as a single line:
//!
//! ```text
//! <metric path> <value> <unix timestamp>\n
//! ```
//!
//! # Usage
//!
//! ```no_run
//! # use carbon_client::{CarbonClientBuilder, LineMetadata};
//! let mut client = CarbonClientBuilder::default().build().expect("failed to build client");
//!
//! // Resolve the remote address and attempt a first connection.
//! client.init("localhost", 2003).expect("failed to resolve Carbon server");
//!
//! // Lines are buffered and written out in payloads.
//! client.send("systems.web01.cpu.0.idle.", 42, None).expect("failed to send line");
//! client.send("systems.web01.load", 3, Some(LineMetadata::with_timestamp(1_700_000_000))).expect("failed to send line");
//!
//! // Write anything still buffered and close the connection.
//! client.deinit().expect("failed to flush on shutdown");
//! ```
//!
//! # Buffering and reconnection
//!
//! Lines are collected into payloads of up to a configurable maximum length, and payloads are written when one fills
//! up, when the flush interval has elapsed, or on an explicit flush. Payloads never contain partial lines.
//!
//! The connection is opened lazily. If a write fails, the connection is re-established and the write retried once;
//! after that the payload is dropped, and connection attempts are spaced out by the configured reconnect delay.
//!
//! # Telemetry
//!
//! The client can report counters about its own operation through the [`metrics`] facade, under the `carbon.client`
//! namespace.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, CarbonClientBuilder};

mod client;
pub use self::client::{CarbonClient, ClientError, LineMetadata};

mod telemetry;
mod writer;
