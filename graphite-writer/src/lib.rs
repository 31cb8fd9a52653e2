//! A write plugin that forwards measurement batches from a host monitoring process to [Graphite][graphite].
//!
//! [graphite]: https://graphite.readthedocs.io/
//!
//! Every sub-value of a batch becomes one Graphite plaintext line, named by joining the configured prefix with the
//! batch's identity:
//!
//! ```text
//! <prefix>.<host>.<plugin>.<plugin instance>.<type>.<type instance> <value> <timestamp>
//! ```
//!
//! # Usage
//!
//! The host drives a [`WritePlugin`] through its lifecycle: configuration keys, `init`, one `write` per batch, and
//! `shutdown`. [`GraphitePlugin`] implements it on top of any [`Transport`], such as a
//! [`CarbonClient`](carbon_client::CarbonClient):
//!
//! ```no_run
//! # use carbon_client::CarbonClientBuilder;
//! # use graphite_writer::{Batch, GraphitePlugin, PluginHost, SubValue, WritePlugin};
//! # struct Host;
//! # impl PluginHost for Host { fn unregister_write(&self, _: &str) {} }
//! # let host = Host;
//! let client = CarbonClientBuilder::default().build().expect("failed to build Carbon client");
//! let mut plugin = GraphitePlugin::new(client);
//!
//! plugin.configure("forward_host", "10.0.0.5").expect("invalid key");
//! plugin.configure("forward_port", "2003").expect("invalid key");
//! plugin.init().expect("failed to initialize");
//!
//! // Sends `systems.web01.cpu.0.idle. 42 <now>`.
//! let batch = Batch::new("web01", "cpu", "idle").with_plugin_instance("0").with_value(SubValue::gauge(42.0));
//! plugin.write(&host, &batch).expect("failed to write batch");
//!
//! plugin.shutdown().expect("failed to shut down");
//! ```
//!
//! # Behavior
//!
//! - Without both `forward_host` and a non-zero `forward_port`, every write fails with
//!   [`WriteError::NotConfigured`], and the host is asked once to unregister the write callback.
//! - A batch containing any sub-value with an unknown type code is dropped entirely.
//! - Gauges are truncated to integers; see [`gauge_to_u64`] for the exact conversion.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod config;
pub use self::config::{normalize_prefix, parse_port, ConfigBuilder, ConfigError, ConfigKey, Configuration, CONFIG_KEYS};

mod plugin;
pub use self::plugin::{dispatch, GraphitePlugin, PluginError, PluginHost, WriteError, WritePlugin, PLUGIN_NAME};

mod translate;
pub use self::translate::{extract, gauge_to_u64, metric_path, translate, ForwardedLine, Lines, UnsupportedKind};

mod transport;
pub use self::transport::Transport;

mod value;
pub use self::value::{Batch, DataSourceType, SubValue, Value, ValueKind};

pub use carbon_client::LineMetadata;
