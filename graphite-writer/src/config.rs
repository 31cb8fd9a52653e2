use std::{fmt, str::FromStr};

use thiserror::Error;
use tracing::warn;

const DEFAULT_METRIC_PREFIX: &str = "systems";

/// The configuration keys recognized by the plugin.
pub const CONFIG_KEYS: [&str; 3] =
    [ConfigKey::ForwardHost.as_str(), ConfigKey::ForwardPort.as_str(), ConfigKey::MetricPrefix.as_str()];

/// Errors that could occur while configuring the plugin.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The key is not one of [`CONFIG_KEYS`].
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    /// The key arrived after the configuration had already been frozen by `init`.
    #[error("configuration key '{0}' set after initialization")]
    AlreadyInitialized(String),
}

/// A configuration key.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ConfigKey {
    /// Host name or address of the Carbon server.
    ForwardHost,

    /// TCP port of the Carbon server.
    ForwardPort,

    /// Prefix prepended to every metric path.
    MetricPrefix,
}

impl ConfigKey {
    /// Returns the key as it appears in the host's configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            ConfigKey::ForwardHost => "forward_host",
            ConfigKey::ForwardPort => "forward_port",
            ConfigKey::MetricPrefix => "metric_prefix",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward_host" => Ok(ConfigKey::ForwardHost),
            "forward_port" => Ok(ConfigKey::ForwardPort),
            "metric_prefix" => Ok(ConfigKey::MetricPrefix),
            other => Err(ConfigError::UnknownKey(other.to_string())),
        }
    }
}

/// Strips every trailing `.` from a metric prefix.
///
/// An empty or all-dot prefix normalizes to the empty string.
pub fn normalize_prefix(prefix: &str) -> &str {
    prefix.trim_end_matches('.')
}

/// Parses a port number, yielding `0` ("not configured") for anything that isn't a valid `u16`.
pub fn parse_port(value: &str) -> u16 {
    value.trim().parse().unwrap_or(0)
}

/// Builder for a [`Configuration`].
///
/// Each key is normally set at most once while the host reads its configuration. Setting a key again overwrites the
/// previous value.
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    host: Option<String>,
    port: u16,
    prefix: String,
}

impl ConfigBuilder {
    /// Creates a new `ConfigBuilder` with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a configuration value.
    ///
    /// Values are never rejected: an unparseable port is stored as `0`, which makes the configuration incomplete and
    /// fails every write until fixed, and an empty prefix is accepted as-is.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> &mut Self {
        match key {
            ConfigKey::ForwardHost => self.host = Some(value.to_string()),
            ConfigKey::ForwardPort => {
                self.port = parse_port(value);
                if self.port == 0 {
                    warn!(%key, value, "Port is not a valid non-zero port number, writes will be disabled.");
                }
            }
            ConfigKey::MetricPrefix => self.prefix = normalize_prefix(value).to_string(),
        }

        self
    }

    /// Freezes the builder into a [`Configuration`].
    pub fn build(&self) -> Configuration {
        Configuration { host: self.host.clone(), port: self.port, prefix: self.prefix.clone() }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        ConfigBuilder { host: None, port: 0, prefix: DEFAULT_METRIC_PREFIX.to_string() }
    }
}

/// Immutable forwarding configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Configuration {
    host: Option<String>,
    port: u16,
    prefix: String,
}

impl Configuration {
    /// Returns the Carbon server host, if set.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns the Carbon server port, where `0` means unset.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the normalized metric prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the host and port when both are configured.
    pub fn remote(&self) -> Option<(&str, u16)> {
        match (self.host(), self.port) {
            (Some(host), port) if port != 0 => Some((host, port)),
            _ => None,
        }
    }

    /// Returns `true` if both the host and a non-zero port are configured.
    pub fn is_complete(&self) -> bool {
        self.remote().is_some()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        ConfigBuilder::default().build()
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_prefix, parse_port, ConfigBuilder, ConfigError, ConfigKey, Configuration, CONFIG_KEYS};

    #[test]
    fn defaults() {
        let config = Configuration::default();
        assert_eq!(config.host(), None);
        assert_eq!(config.port(), 0);
        assert_eq!(config.prefix(), "systems");
        assert!(!config.is_complete());
    }

    #[test]
    fn prefix_normalization() {
        // Cases are defined as: input prefix, normalized prefix.
        let cases = [
            ("systems", "systems"),
            ("systems.", "systems"),
            ("systems...", "systems"),
            ("a.b.c..", "a.b.c"),
            (".", ""),
            ("....", ""),
            ("", ""),
            (".leading", ".leading"),
        ];

        for (input, expected) in cases {
            assert_eq!(normalize_prefix(input), expected, "input: {:?}", input);

            let config = ConfigBuilder::new().set(ConfigKey::MetricPrefix, input).build();
            assert_eq!(config.prefix(), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn port_parsing() {
        // Cases are defined as: input value, parsed port.
        let cases = [
            ("2003", 2003),
            (" 2003 ", 2003),
            ("65535", 65535),
            ("65536", 0),
            ("-1", 0),
            ("abc", 0),
            ("2003abc", 0),
            ("", 0),
        ];

        for (input, expected) in cases {
            assert_eq!(parse_port(input), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn host_stored_verbatim() {
        let config = ConfigBuilder::new().set(ConfigKey::ForwardHost, " 10.0.0.5 ").build();
        assert_eq!(config.host(), Some(" 10.0.0.5 "));
    }

    #[test]
    fn completeness() {
        let mut builder = ConfigBuilder::new();
        assert!(!builder.build().is_complete());

        builder.set(ConfigKey::ForwardHost, "10.0.0.5");
        assert!(!builder.build().is_complete());

        builder.set(ConfigKey::ForwardPort, "not a port");
        assert!(!builder.build().is_complete());

        builder.set(ConfigKey::ForwardPort, "2003");
        let config = builder.build();
        assert!(config.is_complete());
        assert_eq!(config.remote(), Some(("10.0.0.5", 2003)));

        let portless = ConfigBuilder::new().set(ConfigKey::ForwardPort, "2003").build();
        assert_eq!(portless.remote(), None);
    }

    #[test]
    fn key_parsing() {
        for key in CONFIG_KEYS {
            let parsed: ConfigKey = key.parse().unwrap();
            assert_eq!(parsed.as_str(), key);
            assert_eq!(parsed.to_string(), key);
        }

        assert_eq!("graphite_host".parse::<ConfigKey>(), Err(ConfigError::UnknownKey("graphite_host".to_string())));
        assert_eq!("Forward_Host".parse::<ConfigKey>(), Err(ConfigError::UnknownKey("Forward_Host".to_string())));
    }
}
