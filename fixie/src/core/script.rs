//! Function declarations extracted from a fixie script.
//!
//! A script is free-form text containing blocks of the form
//! `func <name>() { ... }`. Everything outside such a block is ignored.
//! Boundaries are found by counting raw brace characters, so braces inside
//! quoted strings or comments are counted too.

use std::cell::OnceCell;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::FixieError;

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*func\s+([^\s()]+)\s*\(\)\s*\{\s*$").expect("valid function header regex")
});

/// A named block of shell lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    /// Declared name, possibly of the form `namespace::base`.
    pub name: String,
    /// Raw lines between the header and the closing brace, in source order.
    pub body: Vec<String>,
}

impl FunctionDecl {
    /// Body lines with their margins trimmed and blank lines dropped.
    pub fn body_lines(&self) -> impl Iterator<Item = &str> {
        self.body
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
    }
}

/// Immutable script text with lazily parsed declarations.
#[derive(Debug)]
pub struct Script {
    raw: String,
    functions: OnceCell<Vec<FunctionDecl>>,
}

impl Script {
    pub fn from_text(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            functions: OnceCell::new(),
        }
    }

    /// Read a script from disk. Any read or decode failure is `ScriptNotFound`.
    pub fn load(path: &Path) -> Result<Self, FixieError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            debug!(path = %path.display(), err = %err, "script unreadable");
            FixieError::ScriptNotFound(path.display().to_string())
        })?;
        Ok(Self::from_text(raw))
    }

    /// All declarations in source order.
    pub fn functions(&self) -> &[FunctionDecl] {
        self.functions.get_or_init(|| parse_functions(&self.raw))
    }

    /// First declaration named `name`, or `namespace::name` when a namespace is given.
    pub fn function(&self, name: &str, namespace: Option<&str>) -> Option<&FunctionDecl> {
        let qualified;
        let wanted = match namespace {
            Some(namespace) => {
                qualified = format!("{namespace}::{name}");
                qualified.as_str()
            }
            None => name,
        };
        self.functions().iter().find(|decl| decl.name == wanted)
    }
}

/// Scan `source` for `func <name>() {` blocks.
///
/// Depth starts at 1 on the header line and the block ends on the line that
/// brings it back to zero; that line is not part of the body. A block still
/// open at end of input is dropped.
pub fn parse_functions(source: &str) -> Vec<FunctionDecl> {
    let mut results = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;
    let mut depth: i64 = 0;

    for line in source.lines() {
        let Some((name, body)) = current.as_mut() else {
            if let Some(name) = parse_header(line) {
                current = Some((name.to_string(), Vec::new()));
                depth = 1;
            }
            continue;
        };

        depth += brace_delta(line);
        if depth == 0 {
            results.push(FunctionDecl {
                name: std::mem::take(name),
                body: std::mem::take(body),
            });
            current = None;
            continue;
        }
        body.push(line.to_string());
    }

    if let Some((name, _)) = current {
        debug!(name, "function never closed, dropping");
    }
    results
}

fn parse_header(line: &str) -> Option<&str> {
    HEADER
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str())
}

fn brace_delta(line: &str) -> i64 {
    line.chars().fold(0, |acc, ch| match ch {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(script: &Script) -> Vec<&str> {
        script.functions().iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn parses_functions_in_source_order() {
        let script = Script::from_text(
            "// tools\nfunc alpha() {\n  echo a\n}\n\nfunc beta() {\n  cd /tmp\n  pwd\n}\nfunc gamma() {\n}\n",
        );
        assert_eq!(names(&script), vec!["alpha", "beta", "gamma"]);

        let beta = &script.functions()[1];
        assert_eq!(beta.body, vec!["  cd /tmp", "  pwd"]);
        assert_eq!(beta.body_lines().collect::<Vec<_>>(), vec!["cd /tmp", "pwd"]);
        assert!(script.functions()[2].body.is_empty());
    }

    #[test]
    fn nested_braces_do_not_end_capture() {
        let script = Script::from_text(
            "func check() {\n  if [ -d /tmp ]; then { echo yes; }\n  fi\n  for x in 1 2; do\n    echo ${x}\n  done\n}\nfunc after() {\n  true\n}\n",
        );
        assert_eq!(names(&script), vec!["check", "after"]);
        assert_eq!(
            script.functions()[0].body_lines().collect::<Vec<_>>(),
            vec![
                "if [ -d /tmp ]; then { echo yes; }",
                "fi",
                "for x in 1 2; do",
                "echo ${x}",
                "done",
            ]
        );
    }

    #[test]
    fn header_with_parameters_is_rejected() {
        let script = Script::from_text("func withargs(x) {\n  echo x\n}\nfunc ok() {\n  echo ok\n}\n");
        assert_eq!(names(&script), vec!["ok"]);
    }

    #[test]
    fn header_allows_indent_and_trailing_whitespace() {
        let script = Script::from_text("   func spaced()   {   \n echo hi\n }\n");
        assert_eq!(names(&script), vec!["spaced"]);
    }

    #[test]
    fn braces_inside_strings_are_still_counted() {
        // The closing brace inside the quotes ends the block early.
        let script = Script::from_text("func quoted() {\n  echo \"}\"\n  echo after\n}\n");
        assert_eq!(names(&script), vec!["quoted"]);
        assert!(script.functions()[0].body.is_empty());
    }

    #[test]
    fn unterminated_function_is_dropped() {
        let script = Script::from_text("func open() {\n  echo never closed\n");
        assert!(script.functions().is_empty());
    }

    #[test]
    fn lookup_returns_first_match() {
        let script = Script::from_text(
            "func dup() {\n  echo first\n}\nfunc dup() {\n  echo second\n}\nfunc net::up() {\n  echo ns\n}\n",
        );
        let dup = script.function("dup", None).expect("dup");
        assert_eq!(dup.body_lines().collect::<Vec<_>>(), vec!["echo first"]);

        assert!(script.function("up", None).is_none());
        let up = script.function("up", Some("net")).expect("net::up");
        assert_eq!(up.name, "net::up");
        assert!(script.function("missing", None).is_none());
    }

    #[test]
    fn load_missing_file_is_script_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = Script::load(&temp.path().join("list")).unwrap_err();
        assert!(matches!(err, FixieError::ScriptNotFound(_)));
    }
}
