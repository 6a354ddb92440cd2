//! Progress reporting for resource convergence.
//!
//! Creating a missing resource emits one human-readable line; reusing an
//! existing one stays silent. The sink is a trait so tests can capture the
//! lines instead of printing them.

use std::io::{self, Write};

/// Sink for the progress lines emitted while resources converge.
pub trait Progress {
    /// Emits one progress line.
    fn note(&self, line: &str);
}

/// Production sink that writes progress lines to standard output.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutProgress;

impl Progress for StdoutProgress {
    fn note(&self, line: &str) {
        writeln!(io::stdout(), "{line}").ok();
    }
}
