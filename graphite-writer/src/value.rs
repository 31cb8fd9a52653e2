use std::fmt;

/// A data source type code, as reported by the host.
///
/// The host tags every sub-value with one of these codes. Only the four codes with associated constants are
/// understood, but any code is representable so that batches from newer hosts can still be described.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DataSourceType(pub i32);

impl DataSourceType {
    /// Counter: a monotonically increasing value.
    pub const COUNTER: DataSourceType = DataSourceType(0);

    /// Gauge: a floating point value that can go up and down.
    pub const GAUGE: DataSourceType = DataSourceType(1);

    /// Derive: a signed counter, whose rate of change is of interest.
    pub const DERIVE: DataSourceType = DataSourceType(2);

    /// Absolute: a counter that is reset every time it is read.
    pub const ABSOLUTE: DataSourceType = DataSourceType(3);
}

impl fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match ValueKind::try_from(*self) {
            Ok(kind) => write!(f, "{:?}", kind),
            Err(_) => write!(f, "unknown({})", self.0),
        }
    }
}

/// The kinds of value that can be forwarded.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValueKind {
    /// Counter.
    Counter,
    /// Gauge.
    Gauge,
    /// Derive.
    Derive,
    /// Absolute.
    Absolute,
}

impl TryFrom<DataSourceType> for ValueKind {
    type Error = DataSourceType;

    fn try_from(ds_type: DataSourceType) -> Result<Self, Self::Error> {
        match ds_type {
            DataSourceType::COUNTER => Ok(ValueKind::Counter),
            DataSourceType::GAUGE => Ok(ValueKind::Gauge),
            DataSourceType::DERIVE => Ok(ValueKind::Derive),
            DataSourceType::ABSOLUTE => Ok(ValueKind::Absolute),
            other => Err(other),
        }
    }
}

impl From<ValueKind> for DataSourceType {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Counter => DataSourceType::COUNTER,
            ValueKind::Gauge => DataSourceType::GAUGE,
            ValueKind::Derive => DataSourceType::DERIVE,
            ValueKind::Absolute => DataSourceType::ABSOLUTE,
        }
    }
}

/// A raw 64-bit measurement payload.
///
/// The payload carries no kind of its own: it is read back according to the [`DataSourceType`] of the sub-value that
/// holds it. Gauges are stored as the bit pattern of the `f64`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Value(u64);

impl Value {
    /// Creates a counter payload.
    pub const fn counter(value: u64) -> Self {
        Value(value)
    }

    /// Creates a gauge payload.
    pub fn gauge(value: f64) -> Self {
        Value(value.to_bits())
    }

    /// Creates a derive payload.
    #[allow(clippy::cast_sign_loss)]
    pub const fn derive(value: i64) -> Self {
        Value(value as u64)
    }

    /// Creates an absolute payload.
    pub const fn absolute(value: u64) -> Self {
        Value(value)
    }

    /// Reads the payload as a counter.
    pub const fn as_counter(self) -> u64 {
        self.0
    }

    /// Reads the payload as a gauge.
    pub fn as_gauge(self) -> f64 {
        f64::from_bits(self.0)
    }

    /// Reads the payload as a derive.
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_derive(self) -> i64 {
        self.0 as i64
    }

    /// Reads the payload as an absolute.
    pub const fn as_absolute(self) -> u64 {
        self.0
    }
}

/// A single typed reading within a [`Batch`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubValue {
    /// Type code reported by the host.
    pub ds_type: DataSourceType,
    /// Raw payload.
    pub value: Value,
}

impl SubValue {
    /// Creates a sub-value from a raw type code and payload.
    pub const fn new(ds_type: DataSourceType, value: Value) -> Self {
        SubValue { ds_type, value }
    }

    /// Creates a counter sub-value.
    pub const fn counter(value: u64) -> Self {
        SubValue::new(DataSourceType::COUNTER, Value::counter(value))
    }

    /// Creates a gauge sub-value.
    pub fn gauge(value: f64) -> Self {
        SubValue::new(DataSourceType::GAUGE, Value::gauge(value))
    }

    /// Creates a derive sub-value.
    pub const fn derive(value: i64) -> Self {
        SubValue::new(DataSourceType::DERIVE, Value::derive(value))
    }

    /// Creates an absolute sub-value.
    pub const fn absolute(value: u64) -> Self {
        SubValue::new(DataSourceType::ABSOLUTE, Value::absolute(value))
    }
}

/// One observation event from the host.
///
/// All sub-values were collected at the same instant for the same host/plugin/type combination. Instance fields may
/// be empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    /// Host the measurement was taken on.
    pub host: String,
    /// Plugin that took the measurement.
    pub plugin: String,
    /// Plugin instance, possibly empty.
    pub plugin_instance: String,
    /// Schema name of the measurement.
    pub type_name: String,
    /// Type instance, possibly empty.
    pub type_instance: String,
    /// Readings, in schema order.
    pub values: Vec<SubValue>,
}

impl Batch {
    /// Creates an empty batch for the given host, plugin and type, with empty instances.
    pub fn new<H, P, T>(host: H, plugin: P, type_name: T) -> Self
    where
        H: Into<String>,
        P: Into<String>,
        T: Into<String>,
    {
        Batch { host: host.into(), plugin: plugin.into(), type_name: type_name.into(), ..Batch::default() }
    }

    /// Sets the plugin instance.
    #[must_use]
    pub fn with_plugin_instance<S: Into<String>>(mut self, plugin_instance: S) -> Self {
        self.plugin_instance = plugin_instance.into();
        self
    }

    /// Sets the type instance.
    #[must_use]
    pub fn with_type_instance<S: Into<String>>(mut self, type_instance: S) -> Self {
        self.type_instance = type_instance.into();
        self
    }

    /// Appends a sub-value.
    #[must_use]
    pub fn with_value(mut self, value: SubValue) -> Self {
        self.values.push(value);
        self
    }

    /// Appends several sub-values.
    #[must_use]
    pub fn with_values<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = SubValue>,
    {
        self.values.extend(values);
        self
    }
}
