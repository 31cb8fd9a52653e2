use std::error::Error as StdError;

use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::{
    config::{ConfigBuilder, ConfigError, ConfigKey, Configuration, CONFIG_KEYS},
    transport::Transport,
    translate::{translate, UnsupportedKind},
    value::Batch,
};

/// Name the plugin registers its callbacks under.
pub const PLUGIN_NAME: &str = "graphite";

/// Errors that could occur while writing a batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WriteError {
    /// The Carbon server host or port is missing.
    #[error("forward_host or forward_port not specified")]
    NotConfigured,

    /// The batch contains a sub-value that cannot be forwarded, so none of it was sent.
    #[error(transparent)]
    UnsupportedKind(#[from] UnsupportedKind),
}

/// Errors that could occur while configuring, initializing or shutting down the plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A configuration key was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The transport failed to initialize or shut down.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),
}

impl PluginError {
    fn transport<E>(e: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        PluginError::Transport(Box::new(e))
    }
}

/// The host process, as seen from a plugin.
pub trait PluginHost {
    /// Asks the host to stop calling the plugin's write callback.
    fn unregister_write(&self, name: &str);
}

/// The callbacks a write plugin exposes to its host.
///
/// The host calls `configure` once per configuration key it finds for the plugin, then `init` once, then `write` once
/// per batch, and finally `shutdown` once.
pub trait WritePlugin {
    /// Returns the name the plugin is registered under.
    fn name(&self) -> &'static str;

    /// Returns the configuration keys the host should pass to [`configure`](WritePlugin::configure).
    fn config_keys(&self) -> &'static [&'static str];

    /// Handles a single configuration key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not recognized or arrives too late.
    fn configure(&mut self, key: &str, value: &str) -> Result<(), PluginError>;

    /// Called once configuration is complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin's resources could not be prepared.
    fn init(&mut self) -> Result<(), PluginError>;

    /// Called once before the host exits.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin's resources could not be released cleanly.
    fn shutdown(&mut self) -> Result<(), PluginError>;

    /// Writes one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch was not forwarded.
    fn write(&mut self, host: &dyn PluginHost, batch: &Batch) -> Result<(), WriteError>;
}

/// Forwards every sub-value of a batch to the transport.
///
/// Returns the number of lines handed to the transport. Whether the transport accepted them is not checked: delivery
/// is the transport's responsibility.
///
/// # Errors
///
/// Returns [`WriteError::NotConfigured`] if the host or port is missing, and [`WriteError::UnsupportedKind`] if any
/// sub-value has an unknown type code. In both cases nothing is sent.
pub fn dispatch<T>(config: &Configuration, transport: &mut T, batch: &Batch) -> Result<usize, WriteError>
where
    T: Transport,
{
    if !config.is_complete() {
        return Err(WriteError::NotConfigured);
    }

    // A single unsupported sub-value drops the whole batch, including the valid sub-values before and after it. The
    // batch is forwarded entirely or not at all.
    let mut lines = translate(config, batch)?;

    let mut sent = 0;
    while let Some(line) = lines.next_line() {
        trace!(path = line.path, value = line.value, "Forwarding line.");
        if let Err(e) = transport.send(line.path, line.value, None) {
            debug!(error = %e, path = line.path, "Transport did not accept line.");
        }
        sent += 1;
    }

    Ok(sent)
}

/// Write plugin forwarding batches to Graphite.
pub struct GraphitePlugin<T> {
    builder: ConfigBuilder,
    config: Option<Configuration>,
    transport: T,
    transport_ready: bool,
    unregistered: bool,
}

impl<T> GraphitePlugin<T>
where
    T: Transport,
{
    /// Creates a new `GraphitePlugin` that sends through the given transport.
    pub fn new(transport: T) -> Self {
        GraphitePlugin {
            builder: ConfigBuilder::new(),
            config: None,
            transport,
            transport_ready: false,
            unregistered: false,
        }
    }

    /// Returns the frozen configuration, once `init` or the first `write` has happened.
    pub fn configuration(&self) -> Option<&Configuration> {
        self.config.as_ref()
    }

    /// Returns a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T> WritePlugin for GraphitePlugin<T>
where
    T: Transport,
{
    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn config_keys(&self) -> &'static [&'static str] {
        &CONFIG_KEYS
    }

    fn configure(&mut self, key: &str, value: &str) -> Result<(), PluginError> {
        info!(key, value, "Configuring {}.", PLUGIN_NAME);

        let key = key.parse::<ConfigKey>()?;
        if self.config.is_some() {
            return Err(ConfigError::AlreadyInitialized(key.to_string()).into());
        }

        self.builder.set(key, value);
        Ok(())
    }

    fn init(&mut self) -> Result<(), PluginError> {
        info!("Initializing {}.", PLUGIN_NAME);

        let config = self.config.get_or_insert_with(|| self.builder.build());
        match config.remote() {
            Some((host, port)) => {
                self.transport.init(host, port).map_err(PluginError::transport)?;
                self.transport_ready = true;
            }
            None => warn!("forward_host or forward_port not specified, writes will fail."),
        }

        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), PluginError> {
        info!("Shutting down {}.", PLUGIN_NAME);

        if std::mem::replace(&mut self.transport_ready, false) {
            self.transport.deinit().map_err(PluginError::transport)?;
        }

        Ok(())
    }

    fn write(&mut self, host: &dyn PluginHost, batch: &Batch) -> Result<(), WriteError> {
        let config = self.config.get_or_insert_with(|| self.builder.build());

        match dispatch(config, &mut self.transport, batch) {
            Ok(sent) => {
                trace!(sent, "Forwarded batch.");
                Ok(())
            }
            Err(WriteError::NotConfigured) => {
                error!("forward_host or forward_port not specified");
                if !self.unregistered {
                    host.unregister_write(PLUGIN_NAME);
                    self.unregistered = true;
                }
                Err(WriteError::NotConfigured)
            }
            Err(e) => {
                debug!(error = %e, host = %batch.host, plugin = %batch.plugin, "Dropped batch.");
                Err(e)
            }
        }
    }
}
