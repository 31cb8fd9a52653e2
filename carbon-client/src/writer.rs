use std::{
    ops::{Deref, DerefMut},
    vec::Drain,
};

pub(crate) const SMALLEST_VALID_PAYLOAD: &[u8] = b"a 0 0\n";

pub struct WriteResult {
    lines_written: u64,
    lines_dropped: u64,
}

impl WriteResult {
    const fn success() -> Self {
        Self { lines_written: 1, lines_dropped: 0 }
    }

    const fn failure() -> Self {
        Self { lines_written: 0, lines_dropped: 1 }
    }

    pub const fn any_failures(&self) -> bool {
        self.lines_dropped != 0
    }

    pub const fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub const fn lines_dropped(&self) -> u64 {
        self.lines_dropped
    }
}

/// Writes plaintext lines into larger buffers for more efficient network I/O.
///
/// Graphite plaintext lines are always newline delimited, so any number of complete lines can be written to the
/// socket in one go and split apart again by the Carbon server. Lines are appended to the current payload until the
/// next line would push it past the maximum payload length, at which point the payload is sealed and a new one is
/// started.
///
/// A payload never contains a partial line.
pub(crate) struct LineWriter {
    max_payload_len: usize,
    payloads_buf: Vec<u8>,
    offsets: Vec<usize>,
    line_buf: Vec<u8>,
}

impl LineWriter {
    /// Creates a new `LineWriter` with the given maximum payload length.
    pub fn new(max_payload_len: usize) -> Self {
        // NOTE: The builder validates this as well, but the writer can't make progress at all below this size.
        assert!(
            max_payload_len >= SMALLEST_VALID_PAYLOAD.len(),
            "maximum payload length is too small to allow any lines to be written (must be {} or greater)",
            SMALLEST_VALID_PAYLOAD.len()
        );

        Self { max_payload_len, payloads_buf: Vec::new(), offsets: Vec::new(), line_buf: Vec::new() }
    }

    fn last_offset(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Returns the number of bytes in the current, unsealed payload.
    fn current_payload_len(&self) -> usize {
        self.payloads_buf.len() - self.last_offset()
    }

    /// Returns `true` if no lines are buffered.
    pub fn is_empty(&self) -> bool {
        self.payloads_buf.is_empty()
    }

    /// Returns `true` if at least one payload has been filled and sealed.
    pub fn has_full_payload(&self) -> bool {
        !self.offsets.is_empty()
    }

    /// Seals the current payload.
    ///
    /// If the current payload is empty, this method does nothing.
    fn seal_current_payload(&mut self) {
        if self.current_payload_len() == 0 {
            return;
        }

        self.offsets.push(self.payloads_buf.len());
    }

    /// Commits the pending line to the current payload.
    ///
    /// Returns `false`, discarding the line, if it would not fit in a payload on its own.
    fn commit(&mut self) -> bool {
        let line_len = self.line_buf.len();
        if line_len > self.max_payload_len {
            self.line_buf.clear();
            return false;
        }

        if self.current_payload_len() + line_len > self.max_payload_len {
            self.seal_current_payload();
        }

        self.payloads_buf.extend_from_slice(&self.line_buf);
        self.line_buf.clear();

        true
    }

    /// Writes a single `<path> <value> <timestamp>\n` line.
    ///
    /// Lines with a path that would corrupt the stream (empty, or containing a space or line break) are dropped, as
    /// are lines that exceed the maximum payload length by themselves.
    pub fn write_line(&mut self, path: &str, value: u64, timestamp: u64) -> WriteResult {
        if !is_valid_path(path) {
            return WriteResult::failure();
        }

        let mut int_writer = itoa::Buffer::new();

        self.line_buf.clear();
        self.line_buf.extend_from_slice(path.as_bytes());
        self.line_buf.push(b' ');
        self.line_buf.extend_from_slice(int_writer.format(value).as_bytes());
        self.line_buf.push(b' ');
        self.line_buf.extend_from_slice(int_writer.format(timestamp).as_bytes());
        self.line_buf.push(b'\n');

        if self.commit() {
            WriteResult::success()
        } else {
            WriteResult::failure()
        }
    }

    /// Returns an iterator over all buffered payloads, sealing the current one first.
    ///
    /// The writer is empty once the iterator is dropped.
    pub fn payloads(&mut self) -> Payloads<'_> {
        self.seal_current_payload();

        Payloads::new(&mut self.payloads_buf, &mut self.offsets)
    }
}

fn is_valid_path(path: &str) -> bool {
    !path.is_empty() && !path.bytes().any(|b| matches!(b, b' ' | b'\n' | b'\r'))
}

/// Iterator over all payloads written by a `LineWriter`.
pub(crate) struct Payloads<'a> {
    payloads_buf: ConsumingBufferSwap<'a, u8>,
    start: usize,
    offsets: Drain<'a, usize>,
}

impl<'a> Payloads<'a> {
    fn new(payloads_buf: &'a mut Vec<u8>, offsets: &'a mut Vec<usize>) -> Self {
        Self { payloads_buf: ConsumingBufferSwap::new(payloads_buf), start: 0, offsets: offsets.drain(..) }
    }

    /// Returns the number of remaining payloads.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns the next payload, or `None` once all payloads have been consumed.
    pub fn next_payload(&mut self) -> Option<&[u8]> {
        let offset = self.offsets.next()?;

        let payload = &self.payloads_buf[self.start..offset];
        self.start = offset;

        Some(payload)
    }
}

// Takes ownership of a buffer for the duration of a draining operation.
//
// The source is left empty as soon as this is created, so the buffer ends up cleared even if the guard is leaked. On
// drop, the (cleared) allocation is handed back to the source so it can be reused for the next batch of payloads.
struct ConsumingBufferSwap<'a, T> {
    source: &'a mut Vec<T>,
    original: Vec<T>,
}

impl<'a, T> ConsumingBufferSwap<'a, T> {
    fn new(source: &'a mut Vec<T>) -> Self {
        let original = std::mem::take(source);
        Self { source, original }
    }
}

impl<T> Drop for ConsumingBufferSwap<'_, T> {
    fn drop(&mut self) {
        self.original.clear();
        std::mem::swap(self.source, &mut self.original);
    }
}

impl<T> Deref for ConsumingBufferSwap<'_, T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.original
    }
}

impl<T> DerefMut for ConsumingBufferSwap<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.original
    }
}

#[cfg(test)]
mod tests {
    use proptest::{collection::vec as arb_vec, prelude::*, proptest};

    use super::{LineWriter, SMALLEST_VALID_PAYLOAD};
    const SMALLEST_VALID_PAYLOAD_LEN: usize = SMALLEST_VALID_PAYLOAD.len();

    fn payloads_from_writer(writer: &mut LineWriter) -> Vec<String> {
        let mut payloads = writer.payloads();
        let mut out = Vec::new();
        while let Some(payload) = payloads.next_payload() {
            out.push(String::from_utf8(payload.to_vec()).unwrap());
        }

        out
    }

    #[test]
    fn single_line() {
        // Cases are defined as: path, value, timestamp, expected output.
        let cases = [
            ("systems.web01.cpu.0.idle.", 42, 1700000000, "systems.web01.cpu.0.idle. 42 1700000000\n"),
            ("a", 0, 0, "a 0 0\n"),
            ("systems.host.load..load.", u64::MAX, 1, "systems.host.load..load. 18446744073709551615 1\n"),
            ("..", 7, 12, ".. 7 12\n"),
        ];

        for (path, value, ts, expected) in cases {
            let mut writer = LineWriter::new(8192);
            let result = writer.write_line(path, value, ts);
            assert_eq!(result.lines_written(), 1);
            assert!(!result.any_failures());

            let payloads = payloads_from_writer(&mut writer);
            assert_eq!(payloads, vec![expected.to_string()]);
        }
    }

    #[test]
    fn invalid_paths_are_dropped() {
        let mut writer = LineWriter::new(8192);
        for path in ["", "has space", "has\nnewline", "has\rreturn"] {
            let result = writer.write_line(path, 1, 1);
            assert_eq!(result.lines_dropped(), 1, "path {:?} should be dropped", path);
        }

        assert!(writer.is_empty());
        assert!(payloads_from_writer(&mut writer).is_empty());
    }

    #[test]
    fn oversized_line_is_dropped() {
        let mut writer = LineWriter::new(16);
        let result = writer.write_line("this.path.is.much.too.long", 1, 1);
        assert!(result.any_failures());
        assert!(writer.is_empty());

        // The writer is still usable afterwards.
        let result = writer.write_line("ok", 1, 1);
        assert_eq!(result.lines_written(), 1);
        assert_eq!(payloads_from_writer(&mut writer), vec!["ok 1 1\n".to_string()]);
    }

    #[test]
    fn lines_split_across_payloads() {
        // Each line is 7 bytes, so two fit in a 16 byte payload.
        let mut writer = LineWriter::new(16);
        for value in 0..5 {
            assert_eq!(writer.write_line("ab", value, 9).lines_written(), 1);
        }
        assert!(writer.has_full_payload());

        let payloads = payloads_from_writer(&mut writer);
        assert_eq!(
            payloads,
            vec![
                "ab 0 9\nab 1 9\n".to_string(),
                "ab 2 9\nab 3 9\n".to_string(),
                "ab 4 9\n".to_string()
            ]
        );

        assert!(writer.is_empty());
        assert!(!writer.has_full_payload());
    }

    #[test]
    fn writer_reusable_after_drain() {
        let mut writer = LineWriter::new(64);
        writer.write_line("first", 1, 1);
        assert_eq!(payloads_from_writer(&mut writer), vec!["first 1 1\n".to_string()]);

        writer.write_line("second", 2, 2);
        assert_eq!(payloads_from_writer(&mut writer), vec!["second 2 2\n".to_string()]);
    }

    proptest! {
        #[test]
        fn property_test_gauntlet(
            payload_limit in SMALLEST_VALID_PAYLOAD_LEN..4096usize,
            inputs in arb_vec(("[a-z0-9.]{1,64}", any::<u64>(), any::<u64>()), 1..128),
        ) {
            let mut writer = LineWriter::new(payload_limit);
            let mut lines_written = 0;
            let mut lines_dropped = 0;

            for (path, value, ts) in &inputs {
                let result = writer.write_line(path, *value, *ts);
                lines_written += result.lines_written();
                lines_dropped += result.lines_dropped();
            }

            let mut payloads = writer.payloads();
            let mut lines_emitted: u64 = 0;
            while let Some(payload) = payloads.next_payload() {
                prop_assert!(payload.len() <= payload_limit);
                prop_assert_eq!(payload.last().copied(), Some(b'\n'));

                for line in std::str::from_utf8(payload).unwrap().lines() {
                    prop_assert_eq!(line.split(' ').count(), 3);
                    lines_emitted += 1;
                }
            }

            prop_assert_eq!(lines_written, lines_emitted);
            prop_assert_eq!(inputs.len() as u64, lines_written + lines_dropped);
        }
    }
}
