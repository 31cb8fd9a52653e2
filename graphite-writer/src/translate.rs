//! Translation of measurement batches into Graphite lines.

use std::slice;

use thiserror::Error;

use crate::{
    config::Configuration,
    value::{Batch, DataSourceType, SubValue, Value, ValueKind},
};

/// A sub-value whose type code is not a forwardable kind.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("sub-value {index} has unsupported data source type {ds_type}")]
pub struct UnsupportedKind {
    /// Position of the first offending sub-value in the batch.
    pub index: usize,
    /// Its type code.
    pub ds_type: DataSourceType,
}

/// One line to hand to the transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ForwardedLine<'a> {
    /// Dot-delimited metric path.
    pub path: &'a str,
    /// Value to send.
    pub value: u64,
}

/// Builds the metric path for a batch.
///
/// The path is `prefix.host.plugin.plugin_instance.type.type_instance`, joined verbatim: segments are not escaped, and
/// empty segments still produce their separator.
pub fn metric_path(prefix: &str, batch: &Batch) -> String {
    let segments: [&str; 6] = [
        prefix,
        &batch.host,
        &batch.plugin,
        &batch.plugin_instance,
        &batch.type_name,
        &batch.type_instance,
    ];

    let len = segments.iter().map(|s| s.len()).sum::<usize>() + segments.len() - 1;
    let mut path = String::with_capacity(len);
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            path.push('.');
        }
        path.push_str(segment);
    }

    path
}

/// Narrows a gauge to the unsigned integer that is sent on the wire.
///
/// The fractional part is truncated toward zero. Negative gauges are not clamped: they wrap around as their two's
/// complement representation, so `-1.0` becomes `u64::MAX`. NaN becomes `0` and values too large for a `u64`
/// saturate.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn gauge_to_u64(gauge: f64) -> u64 {
    if gauge < 0.0 {
        (gauge as i64) as u64
    } else {
        gauge as u64
    }
}

/// Reads a payload as an unsigned integer according to its kind.
#[allow(clippy::cast_sign_loss)]
pub fn extract(kind: ValueKind, value: Value) -> u64 {
    match kind {
        ValueKind::Counter => value.as_counter(),
        ValueKind::Gauge => gauge_to_u64(value.as_gauge()),
        ValueKind::Derive => value.as_derive() as u64,
        ValueKind::Absolute => value.as_absolute(),
    }
}

/// Translates a batch into the lines to forward.
///
/// Every sub-value is checked before any line is produced: if one of them is not a forwardable kind, the whole batch
/// is rejected, including the sub-values that come before it.
///
/// # Errors
///
/// Returns [`UnsupportedKind`] describing the first sub-value with an unknown type code.
pub fn translate<'a>(config: &Configuration, batch: &'a Batch) -> Result<Lines<'a>, UnsupportedKind> {
    let unsupported = batch.values.iter().position(|sub| ValueKind::try_from(sub.ds_type).is_err());
    if let Some(index) = unsupported {
        return Err(UnsupportedKind { index, ds_type: batch.values[index].ds_type });
    }

    Ok(Lines { path: metric_path(config.prefix(), batch), values: batch.values.iter() })
}

/// The lines produced from one batch, in sub-value order.
///
/// Every line of a batch shares the same path.
#[derive(Debug)]
pub struct Lines<'a> {
    path: String,
    values: slice::Iter<'a, SubValue>,
}

impl Lines<'_> {
    /// Returns the metric path shared by every line.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the number of lines left.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no lines left.
    pub fn is_empty(&self) -> bool {
        self.values.len() == 0
    }

    /// Returns the next line.
    pub fn next_line(&mut self) -> Option<ForwardedLine<'_>> {
        let sub = self.values.next()?;

        // Kinds were all validated up front in `translate`.
        let kind = ValueKind::try_from(sub.ds_type).ok()?;

        Some(ForwardedLine { path: &self.path, value: extract(kind, sub.value) })
    }
}
