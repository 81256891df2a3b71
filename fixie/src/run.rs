//! Orchestration for `fixie <name>...`.
//!
//! Functions run in the order requested, fragments strictly one at a time,
//! all against the same session. Fail-fast decides whether an unknown name or
//! a failed fragment stops the run or only produces a warning.

use tracing::{debug, info, instrument};

use crate::assembler::{CompletenessOracle, Fragments};
use crate::core::script::{FunctionDecl, Script};
use crate::error::FixieError;
use crate::io::session::ShellSession;
use crate::report::Reporter;

/// Outcome of a run that was not aborted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Functions whose fragments were all attempted, in order.
    pub completed: Vec<String>,
    /// Failures downgraded to warnings.
    pub warnings: usize,
}

/// Everything a run needs besides the requested names.
pub struct RunContext<'a, O, R> {
    pub script: &'a Script,
    pub session: &'a mut ShellSession,
    pub oracle: &'a O,
    pub reporter: &'a mut R,
    pub fail_fast: bool,
}

/// Run each requested function by unqualified name.
///
/// Under fail-fast the first unknown name or failed fragment is returned as
/// an error and nothing after it runs.
#[instrument(skip_all, fields(requested = names.len(), fail_fast = ctx.fail_fast))]
pub async fn run_functions<O, R, S>(
    ctx: &mut RunContext<'_, O, R>,
    names: &[S],
) -> Result<RunSummary, FixieError>
where
    O: CompletenessOracle,
    R: Reporter,
    S: AsRef<str>,
{
    let mut summary = RunSummary::default();
    let script = ctx.script;

    for name in names {
        let name = name.as_ref();
        let Some(decl) = script.function(name, None) else {
            let err = FixieError::UnknownFunction(name.to_string());
            if ctx.fail_fast {
                return Err(err);
            }
            ctx.reporter.warning(&err.to_string());
            summary.warnings += 1;
            continue;
        };

        ctx.reporter.function_started(name);
        summary.warnings += run_function(ctx, decl).await?;
        ctx.reporter.function_finished(name);
        summary.completed.push(name.to_string());
    }

    info!(
        completed = summary.completed.len(),
        warnings = summary.warnings,
        "run finished"
    );
    Ok(summary)
}

/// Run one function's fragments, returning how many failures were tolerated.
async fn run_function<O, R>(
    ctx: &mut RunContext<'_, O, R>,
    decl: &FunctionDecl,
) -> Result<usize, FixieError>
where
    O: CompletenessOracle,
    R: Reporter,
{
    let mut warnings = 0;
    if let Err(err) = ctx.session.set_function_context(&decl.name).await {
        if ctx.fail_fast {
            return Err(err);
        }
        ctx.reporter.warning(&format!("{err}, continuing…"));
        warnings += 1;
    }

    let mut fragments = Fragments::new(decl.body_lines(), ctx.oracle);
    while let Some(fragment) = fragments.next().await {
        ctx.reporter.fragment_started(&fragment);
        match run_fragment(ctx.session, ctx.reporter, &fragment).await {
            Ok(()) => {}
            Err(err) if ctx.fail_fast => {
                debug!(err = %err, "fragment failed under fail-fast");
                ctx.reporter.warning(&format!("command failed ({err})"));
                return Err(FixieError::CommandFailed(fragment.trim_end().to_string()));
            }
            Err(err) => {
                ctx.reporter.warning(&format!("{err}, continuing…"));
                warnings += 1;
            }
        }
    }
    Ok(warnings)
}

/// Execute a fragment and stream its output; a non-zero status is a failure.
async fn run_fragment<R: Reporter>(
    session: &mut ShellSession,
    reporter: &mut R,
    fragment: &str,
) -> Result<(), FixieError> {
    let mut output = session.execute(fragment).await?;
    let mut wrote_output = false;
    let streamed = async {
        while let Some(chunk) = output.next_chunk().await? {
            wrote_output = true;
            reporter.output(&chunk);
        }
        Ok::<_, FixieError>(())
    }
    .await;
    reporter.fragment_finished(wrote_output);
    streamed?;

    match output.exit_code() {
        Some(code) if code != 0 => Err(FixieError::CommandFailed(format!(
            "{} (exit {code})",
            fragment.trim_end()
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::SyntaxCheckConfig;
    use crate::io::oracle::BashSyntaxOracle;
    use crate::test_support::{Event, RecordingReporter, plain_shell};

    fn oracle() -> BashSyntaxOracle {
        BashSyntaxOracle::new(&SyntaxCheckConfig {
            program: "bash".into(),
            timeout_ms: 5_000,
        })
    }

    async fn run(
        script: &Script,
        names: &[&str],
        fail_fast: bool,
    ) -> (Result<RunSummary, FixieError>, RecordingReporter) {
        let mut session = ShellSession::start(&plain_shell(), fail_fast)
            .await
            .expect("start");
        let oracle = oracle();
        let mut reporter = RecordingReporter::default();
        let result = run_functions(
            &mut RunContext {
                script,
                session: &mut session,
                oracle: &oracle,
                reporter: &mut reporter,
                fail_fast,
            },
            names,
        )
        .await;
        drop(session);
        (result, reporter)
    }

    #[tokio::test]
    async fn streams_output_for_each_fragment() {
        let script = Script::from_text(
            "func hello() {\n  echo one\n  if true; then\n    echo two\n  fi\n}\n",
        );
        let (result, reporter) = run(&script, &["hello"], false).await;
        let summary = result.expect("run");
        assert_eq!(summary.completed, vec!["hello"]);
        assert_eq!(summary.warnings, 0);
        assert_eq!(
            reporter.fragments(),
            vec!["echo one\n", "if true; then\necho two\nfi\n"]
        );
        assert_eq!(reporter.output_text(), "one\ntwo\n");
        assert_eq!(reporter.events.first(), Some(&Event::Started("hello".into())));
        assert_eq!(reporter.events.last(), Some(&Event::Finished("hello".into())));
    }

    #[tokio::test]
    async fn unknown_function_is_a_warning_without_fail_fast() {
        let script = Script::from_text("func b() {\n  echo b\n}\n");
        let (result, reporter) = run(&script, &["missing", "b"], false).await;
        let summary = result.expect("run");
        assert_eq!(summary.completed, vec!["b"]);
        assert_eq!(summary.warnings, 1);
        assert!(reporter.warnings()[0].contains("unknown function: missing()"));
    }

    #[tokio::test]
    async fn unknown_function_aborts_under_fail_fast() {
        let script = Script::from_text("func b() {\n  echo b\n}\n");
        let (result, reporter) = run(&script, &["missing", "b"], true).await;
        assert!(matches!(result, Err(FixieError::UnknownFunction(name)) if name == "missing"));
        assert!(reporter.output_text().is_empty());
    }
}
