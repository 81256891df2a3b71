//! Terminal presentation for a run.

use std::io::{self, Write};

use crate::core::fragment::display;

const DIVIDER: &str = "────────────────────────────────────────";

/// Receives progress from [`crate::run::run_functions`].
pub trait Reporter {
    fn function_started(&mut self, name: &str);
    fn fragment_started(&mut self, fragment: &str);
    /// Raw output bytes, sentinel already removed.
    fn output(&mut self, chunk: &[u8]);
    fn fragment_finished(&mut self, wrote_output: bool);
    fn function_finished(&mut self, name: &str);
    fn warning(&mut self, message: &str);
}

/// Prints headers, fragments and output to stdout as they happen.
#[derive(Debug, Default)]
pub struct StdoutReporter;

impl StdoutReporter {
    fn print(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        // Nothing useful to do if the terminal is gone.
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

impl Reporter for StdoutReporter {
    fn function_started(&mut self, name: &str) {
        self.print(&format!("{DIVIDER}\n 🚴 {name}()\n{DIVIDER}\n"));
    }

    fn fragment_started(&mut self, fragment: &str) {
        self.print(&format!(" • {}\n", display(fragment)));
    }

    fn output(&mut self, chunk: &[u8]) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(chunk);
        let _ = stdout.flush();
    }

    fn fragment_finished(&mut self, wrote_output: bool) {
        if wrote_output {
            self.print("\n");
        }
    }

    fn function_finished(&mut self, name: &str) {
        self.print(&format!("{DIVIDER}\n 🏁 {name}() completed.\n{DIVIDER}\n"));
    }

    fn warning(&mut self, message: &str) {
        self.print(&format!("‼︎ {message}\n"));
    }
}

/// Print declared function names, one per line, in source order.
pub fn print_function_names<'a>(names: impl IntoIterator<Item = &'a str>) {
    let mut stdout = io::stdout().lock();
    for name in names {
        let _ = writeln!(stdout, "{name}");
    }
}
