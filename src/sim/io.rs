//! Output devices for the simulator.
//!
//! The interface for output devices is defined with the [`OutputDevice`]
//! trait. This is exposed to the simulator with the [`SimOutput`] enum.
//!
//! Besides those two key items, this module also includes:
//! - [`EmptyOutput`]: an `OutputDevice` that discards everything.
//! - [`BufferedOutput`]: an `OutputDevice` collecting lines into a shared
//!   buffer, for tests and embedding.
//! - [`WriterOutput`]: an `OutputDevice` writing through any [`Write`]r.

use std::io::Write;
use std::sync::{Arc, RwLock};

use log::error;

/// A line-oriented output device.
pub trait OutputDevice {
    /// Emits one output line.
    fn put_line(&mut self, line: &str);

    /// Flushes any buffered output.
    fn flush(&mut self);
}
impl dyn OutputDevice {} // assert OutputDevice is dyn safe

/// No output. Every line is discarded.
pub struct EmptyOutput;
impl OutputDevice for EmptyOutput {
    fn put_line(&mut self, _line: &str) {}
    fn flush(&mut self) {}
}

/// Output collected into a shared line buffer.
///
/// Clones share the same buffer, so a copy kept outside the simulator
/// observes everything the simulator writes.
#[derive(Debug, Clone, Default)]
pub struct BufferedOutput {
    lines: Arc<RwLock<Vec<String>>>,
}

impl BufferedOutput {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the lines written so far.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.read() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl OutputDevice for BufferedOutput {
    fn put_line(&mut self, line: &str) {
        match self.lines.write() {
            Ok(mut lines) => lines.push(line.to_string()),
            Err(poisoned) => poisoned.into_inner().push(line.to_string()),
        }
    }

    fn flush(&mut self) {}
}

/// Output written line-by-line through any [`Write`]r.
///
/// Write failures are logged and otherwise ignored; the batch keeps
/// running.
pub struct WriterOutput<W: Write> {
    inner: W,
}

impl<W: Write> WriterOutput<W> {
    /// Wraps a writer.
    pub fn new(inner: W) -> Self {
        WriterOutput { inner }
    }
}

impl<W: Write> OutputDevice for WriterOutput<W> {
    fn put_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.inner, "{line}") {
            error!("output write failed: {e}");
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.inner.flush() {
            error!("output flush failed: {e}");
        }
    }
}

/// The output device wired into a [`System`].
///
/// [`System`]: super::System
#[derive(Default)]
pub enum SimOutput {
    /// No output.
    #[default]
    Empty,
    /// Shared in-memory buffer.
    Buffered(BufferedOutput),
    /// Any boxed device.
    Custom(Box<dyn OutputDevice + Send>),
}

impl SimOutput {
    /// Wraps a [`Write`]r into an output device.
    pub fn writer<W: Write + Send + 'static>(w: W) -> Self {
        SimOutput::Custom(Box::new(WriterOutput::new(w)))
    }

    pub(super) fn put_line(&mut self, line: &str) {
        match self {
            SimOutput::Empty => {}
            SimOutput::Buffered(buf) => buf.put_line(line),
            SimOutput::Custom(dev) => dev.put_line(line),
        }
    }

    pub(super) fn flush(&mut self) {
        match self {
            SimOutput::Empty => {}
            SimOutput::Buffered(buf) => buf.flush(),
            SimOutput::Custom(dev) => dev.flush(),
        }
    }
}

impl From<EmptyOutput> for SimOutput {
    fn from(_: EmptyOutput) -> Self {
        SimOutput::Empty
    }
}
impl From<BufferedOutput> for SimOutput {
    fn from(buf: BufferedOutput) -> Self {
        SimOutput::Buffered(buf)
    }
}

impl std::fmt::Debug for SimOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimOutput::Empty => f.write_str("Empty"),
            SimOutput::Buffered(buf) => f.debug_tuple("Buffered").field(buf).finish(),
            SimOutput::Custom(_) => f.debug_struct("Custom").finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferedOutput, OutputDevice, SimOutput, WriterOutput};

    #[test]
    fn test_buffered_output_shares_lines() {
        let buf = BufferedOutput::new();
        let mut out = SimOutput::from(buf.clone());
        out.put_line("HELL");
        out.put_line("");
        assert_eq!(buf.lines(), vec!["HELL", ""]);
    }

    #[test]
    fn test_writer_output() {
        let mut sink = Vec::new();
        {
            let mut out = WriterOutput::new(&mut sink);
            out.put_line("AB");
            out.put_line("CD");
            out.flush();
        }
        assert_eq!(sink, b"AB\nCD\n");
    }
}
