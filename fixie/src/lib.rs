//! Run named shell blocks against one persistent shell.
//!
//! A fixie script (`~/.fixie/list`) holds `func name() { ... }` blocks. Each
//! requested function is split into the smallest syntactically complete
//! fragments and fed, one at a time, to a single long-lived shell, so the
//! working directory, exports and variables set by one fragment are visible to
//! every later fragment and function in the same invocation.
//!
//! - **[`core`]**: pure logic (script parsing, line cleanup, sentinel detection).
//! - **[`io`]**: the shell session, the syntax-check oracle, config and setup.
//! - **[`assembler`]** groups body lines into fragments, **[`run`]** drives
//!   them through the session and applies the fail-fast policy, and
//!   **[`report`]** renders progress.

pub mod assembler;
pub mod core;
pub mod error;
pub mod io;
pub mod logging;
pub mod report;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
