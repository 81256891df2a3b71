//! Grouping body lines into the smallest complete fragments.
//!
//! Lines are appended to a buffer one by one and the buffer is handed to a
//! [`CompletenessOracle`] after each append. A multi-line `if`/`for`/heredoc
//! therefore travels to the shell as one fragment while independent
//! statements stay separate.

use std::future::Future;

use tracing::{debug, warn};

use crate::core::fragment::clean_line;

/// Decides whether accumulated shell text is a complete, well-formed unit.
pub trait CompletenessOracle {
    /// `false` covers both "not yet complete" and "could not check".
    fn is_complete(&self, text: &str) -> impl Future<Output = bool>;
}

/// Lazy fragment sequence over one function body.
///
/// Build a new `Fragments` to restart from the first line.
pub struct Fragments<'a, I, O> {
    lines: I,
    oracle: &'a O,
    buffer: String,
}

impl<'a, I, O> Fragments<'a, I, O>
where
    I: Iterator<Item = &'a str>,
    O: CompletenessOracle,
{
    pub fn new(lines: impl IntoIterator<IntoIter = I>, oracle: &'a O) -> Self {
        Self {
            lines: lines.into_iter(),
            oracle,
            buffer: String::new(),
        }
    }

    /// Next complete fragment, or `None` once the body is exhausted.
    ///
    /// Text still buffered when the body runs out never parsed as complete and
    /// is discarded.
    pub async fn next(&mut self) -> Option<String> {
        for line in self.lines.by_ref() {
            let command = clean_line(line);
            if command.is_empty() {
                continue;
            }
            self.buffer.push_str(command);
            self.buffer.push('\n');

            if self.oracle.is_complete(&self.buffer).await {
                debug!(lines = self.buffer.lines().count(), "fragment complete");
                return Some(std::mem::take(&mut self.buffer));
            }
        }

        if !self.buffer.is_empty() {
            warn!(
                fragment = %self.buffer.trim_end(),
                "function body ended inside an incomplete fragment; skipping it"
            );
            self.buffer.clear();
        }
        None
    }

    /// Drain the remaining fragments.
    pub async fn collect(mut self) -> Vec<String> {
        let mut fragments = Vec::new();
        while let Some(fragment) = self.next().await {
            fragments.push(fragment);
        }
        fragments
    }
}
