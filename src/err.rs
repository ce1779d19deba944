//! Error reporting helpers shared across the crate.
//!
//! Library errors are concrete enums implementing [`std::error::Error`].
//! The [`Error`] trait layered on top lets them carry an input line number
//! and a help string, which [`report`] renders for human consumption.

use std::borrow::Cow;

/// Trait implemented by all errors in this crate.
pub trait Error: std::error::Error {
    /// The 1-based input line this error is associated with, if any.
    fn line(&self) -> Option<usize> {
        None
    }

    /// A short hint on how to resolve this error, if one exists.
    fn help(&self) -> Option<Cow<'_, str>> {
        None
    }
}

/// Renders an error (with its line number and help text) into a printable string.
pub fn report(err: &dyn Error) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    let _ = write!(out, "error: {err}");
    if let Some(line) = err.line() {
        let _ = write!(out, " (line {line})");
    }
    if let Some(help) = err.help() {
        let _ = write!(out, "\nhelp: {help}");
    }
    out
}
