//! The persistent shell that every fragment runs in.
//!
//! One child shell lives for the whole invocation so `cd`, exports and shell
//! variables carry from one fragment to the next. The session is the only
//! writer of the shell's stdin. A reader task forwards stdout chunks over a
//! channel to whichever [`FragmentOutput`] is in flight; because that handle
//! mutably borrows the session, the next fragment cannot be written before the
//! current one has been consumed. Stderr is forwarded separately, prefixed,
//! and is not correlated with fragment boundaries.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::core::fragment::terminate;
use crate::core::sentinel::{Scan, SentinelScanner, SentinelToken};
use crate::error::FixieError;
use crate::io::config::ShellConfig;

const READ_BUFFER_BYTES: usize = 8192;
const CHUNK_QUEUE_DEPTH: usize = 64;
const STDERR_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Name of the shell variable holding the function currently running.
pub const FUNCTION_VAR: &str = "FIXIE_FUNCTION";

/// A long-lived shell driven through its standard streams.
pub struct ShellSession {
    child: Child,
    stdin: Option<ChildStdin>,
    chunks: mpsc::Receiver<Vec<u8>>,
    /// Bytes read past the previous sentinel line.
    carry: Vec<u8>,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
}

impl ShellSession {
    /// Spawn the shell, forwarding its stderr to ours.
    pub async fn start(config: &ShellConfig, fail_fast: bool) -> Result<Self> {
        Self::start_with_stderr(config, fail_fast, tokio::io::stderr()).await
    }

    /// Spawn the shell, forwarding its stderr to `sink`.
    ///
    /// With `fail_fast`, the shell is put in `set -e` mode and an `ERR` trap
    /// reports which function aborted.
    #[instrument(skip_all, fields(program = %config.program.display(), fail_fast))]
    pub async fn start_with_stderr<W>(config: &ShellConfig, fail_fast: bool, sink: W) -> Result<Self>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn shell {}", config.program.display()))?;
        debug!(pid = ?child.id(), "shell started");

        let stdin = child.stdin.take().context("shell stdin was not piped")?;
        let stdout = child.stdout.take().context("shell stdout was not piped")?;
        let stderr = child.stderr.take().context("shell stderr was not piped")?;

        let (tx, chunks) = mpsc::channel(CHUNK_QUEUE_DEPTH);
        let stdout_task = tokio::spawn(pump_chunks(stdout, tx));
        let stderr_task = tokio::spawn(forward_prefixed(
            stderr,
            sink,
            config.stderr_prefix.clone(),
        ));

        let mut session = Self {
            child,
            stdin: Some(stdin),
            chunks,
            carry: Vec::new(),
            stdout_task,
            stderr_task,
        };

        if fail_fast {
            session.write("set -e\n").await?;
            session
                .write(&format!(
                    "trap 'echo >&2 \"Aborted in ${{{FUNCTION_VAR}:-fixie}} (exit $?)\"' ERR\n"
                ))
                .await?;
        }
        Ok(session)
    }

    /// Send one fragment followed by a fresh sentinel.
    ///
    /// The returned handle yields the fragment's output and must be drained
    /// before the session can be used again.
    #[instrument(skip_all, fields(bytes = fragment.len()))]
    pub async fn execute(&mut self, fragment: &str) -> Result<FragmentOutput<'_>, FixieError> {
        let token = SentinelToken::generate();
        let line = format!("{} {}\n", terminate(fragment), token.echo_directive());
        self.write(&line).await?;
        debug!(token = token.as_str(), "fragment written");

        Ok(FragmentOutput {
            scanner: SentinelScanner::new(&token),
            session: self,
            exit_code: None,
            done: false,
        })
    }

    /// Record `name` in the shell so the fail-fast trap can report it.
    pub async fn set_function_context(&mut self, name: &str) -> Result<(), FixieError> {
        let assignment = format!("{FUNCTION_VAR}={}", single_quote(name));
        let mut output = self.execute(&assignment).await?;
        while output.next_chunk().await?.is_some() {}
        Ok(())
    }

    /// Ask the shell to exit and wait for it.
    ///
    /// A non-zero exit status is reported as `ShellTerminated`.
    #[instrument(skip_all)]
    pub async fn finish(mut self) -> Result<()> {
        if let Err(err) = self.write("exit\n").await {
            debug!(err = %err, "shell already gone before exit");
        }
        let Self {
            mut child,
            stdin,
            chunks,
            stdout_task,
            stderr_task,
            ..
        } = self;
        drop(stdin);
        drop(chunks);

        let status = child.wait().await.context("wait for shell")?;
        debug!(exit_code = ?status.code(), "shell exited");

        stdout_task.abort();
        // Background jobs may keep stderr open; give the forwarder a moment.
        let stderr_abort = stderr_task.abort_handle();
        if tokio::time::timeout(STDERR_DRAIN_GRACE, stderr_task)
            .await
            .is_err()
        {
            stderr_abort.abort();
        }

        if !status.success() {
            return Err(FixieError::ShellTerminated(status.code()).into());
        }
        Ok(())
    }

    async fn write(&mut self, text: &str) -> Result<(), FixieError> {
        let stdin = self.stdin.as_mut().ok_or(FixieError::NoStdin)?;
        let written = async {
            stdin.write_all(text.as_bytes()).await?;
            stdin.flush().await
        }
        .await;
        if let Err(err) = written {
            warn!(err = %err, "write to shell stdin failed");
            self.stdin = None;
            return Err(FixieError::NoStdin);
        }
        Ok(())
    }

    async fn exit_code(&mut self) -> Option<i32> {
        match self.child.wait().await {
            Ok(status) => status.code(),
            Err(err) => {
                warn!(err = %err, "wait for terminated shell failed");
                None
            }
        }
    }
}

/// Output of one fragment, read from the shared stdout stream.
pub struct FragmentOutput<'s> {
    session: &'s mut ShellSession,
    scanner: SentinelScanner,
    exit_code: Option<i32>,
    done: bool,
}

impl FragmentOutput<'_> {
    /// Next piece of output with the sentinel removed, or `None` after the
    /// sentinel has been seen.
    ///
    /// Fails with `ShellTerminated` if stdout closes first.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, FixieError> {
        while !self.done {
            let chunk = if self.session.carry.is_empty() {
                match self.session.chunks.recv().await {
                    Some(chunk) => chunk,
                    None => return self.terminated().await,
                }
            } else {
                std::mem::take(&mut self.session.carry)
            };

            match self.scanner.push(&chunk) {
                Scan::Output(output) => {
                    if !output.is_empty() {
                        return Ok(Some(output));
                    }
                }
                Scan::Done {
                    output,
                    exit_code,
                    trailing,
                } => {
                    self.done = true;
                    self.exit_code = exit_code;
                    self.session.carry = trailing;
                    if !output.is_empty() {
                        return Ok(Some(output));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Status the shell reported for the fragment, once finished.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    async fn terminated(&mut self) -> Result<Option<Vec<u8>>, FixieError> {
        let pending = self.scanner.take_pending();
        if !pending.is_empty() {
            return Ok(Some(pending));
        }
        let code = self.session.exit_code().await;
        // Nothing is reading stdin any more; later writes fail as `NoStdin`.
        self.session.stdin = None;
        warn!(exit_code = ?code, "shell exited before fragment completed");
        Err(FixieError::ShellTerminated(code))
    }
}

async fn pump_chunks<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_BYTES];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(err = %err, "read shell stdout");
                break;
            }
        }
    }
    debug!("shell stdout closed");
}

async fn forward_prefixed<R, W>(mut reader: R, mut sink: W, prefix: String)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_BYTES];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!(err = %err, "read shell stderr");
                break;
            }
        };
        let forwarded = async {
            sink.write_all(prefix.as_bytes()).await?;
            sink.write_all(&buf[..n]).await?;
            sink.flush().await
        }
        .await;
        if let Err(err) = forwarded {
            warn!(err = %err, "forward shell stderr");
            break;
        }
    }
}

fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{collect_output, plain_shell};

    #[test]
    fn single_quote_escapes_quotes() {
        assert_eq!(single_quote("plain"), "'plain'");
        assert_eq!(single_quote("it's"), r"'it'\''s'");
    }

    #[tokio::test]
    async fn runs_fragment_and_strips_sentinel() {
        let mut session = ShellSession::start(&plain_shell(), false)
            .await
            .expect("start");
        let (output, code) = collect_output(&mut session, "echo hello\n")
            .await
            .expect("execute");
        assert_eq!(output, "hello\n");
        assert_eq!(code, Some(0));
        session.finish().await.expect("finish");
    }

    #[tokio::test]
    async fn state_persists_between_fragments() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().canonicalize().expect("canonicalize");
        let mut session = ShellSession::start(&plain_shell(), false)
            .await
            .expect("start");

        collect_output(&mut session, &format!("cd '{}'\n", dir.display()))
            .await
            .expect("cd");
        collect_output(&mut session, "GREETING=hi\n")
            .await
            .expect("assign");
        let (pwd, _) = collect_output(&mut session, "pwd\n").await.expect("pwd");
        let (greeting, _) = collect_output(&mut session, "echo $GREETING\n")
            .await
            .expect("echo");

        assert_eq!(pwd.trim_end(), dir.display().to_string());
        assert_eq!(greeting, "hi\n");
        session.finish().await.expect("finish");
    }

    #[tokio::test]
    async fn multiline_and_silent_fragments_complete() {
        let mut session = ShellSession::start(&plain_shell(), false)
            .await
            .expect("start");
        let (loop_out, _) = collect_output(&mut session, "for n in 1 2 3; do\necho $n\ndone\n")
            .await
            .expect("loop");
        assert_eq!(loop_out, "1\n2\n3\n");

        let (silent, code) = collect_output(&mut session, "true\n").await.expect("true");
        assert!(silent.is_empty());
        assert_eq!(code, Some(0));

        let (no_newline, _) = collect_output(&mut session, "printf partial\n")
            .await
            .expect("printf");
        assert_eq!(no_newline, "partial");
        session.finish().await.expect("finish");
    }

    #[tokio::test]
    async fn nonzero_status_is_reported_without_fail_fast() {
        let mut session = ShellSession::start(&plain_shell(), false)
            .await
            .expect("start");
        let (_, code) = collect_output(&mut session, "false\n").await.expect("false");
        assert_eq!(code, Some(1));
        let (_, code) = collect_output(&mut session, "(exit 7)\n").await.expect("exit 7");
        assert_eq!(code, Some(7));

        let (after, code) = collect_output(&mut session, "echo still here\n")
            .await
            .expect("echo");
        assert_eq!(after, "still here\n");
        assert_eq!(code, Some(0));
        session.finish().await.expect("finish");
    }

    #[tokio::test]
    async fn fail_fast_terminates_shell_and_reports_on_stderr() {
        let (sink, mut stderr) = tokio::io::duplex(4096);
        let mut session = ShellSession::start_with_stderr(&plain_shell(), true, sink)
            .await
            .expect("start");
        session
            .set_function_context("broken")
            .await
            .expect("context");

        let err = collect_output(&mut session, "false\n").await.unwrap_err();
        assert!(matches!(err, FixieError::ShellTerminated(Some(1))));

        let err = session.execute("echo unreachable\n").await.err();
        assert!(matches!(err, Some(FixieError::NoStdin)));

        let finished = session.finish().await;
        assert!(finished.is_err());

        let mut forwarded = String::new();
        stderr
            .read_to_string(&mut forwarded)
            .await
            .expect("read stderr");
        assert!(forwarded.contains("‼︎ "));
        assert!(forwarded.contains("Aborted in broken"));
    }

    #[tokio::test]
    async fn stderr_is_forwarded_with_prefix() {
        let (sink, mut stderr) = tokio::io::duplex(4096);
        let mut config = plain_shell();
        config.stderr_prefix = "[err] ".to_string();
        let mut session = ShellSession::start_with_stderr(&config, false, sink)
            .await
            .expect("start");

        let (out, _) = collect_output(&mut session, "echo visible; echo hidden >&2\n")
            .await
            .expect("execute");
        assert_eq!(out, "visible\n");
        session.finish().await.expect("finish");

        let mut forwarded = String::new();
        stderr
            .read_to_string(&mut forwarded)
            .await
            .expect("read stderr");
        assert!(forwarded.starts_with("[err] "));
        assert!(forwarded.contains("hidden"));
    }

    #[tokio::test]
    async fn exit_inside_fragment_is_shell_terminated() {
        let mut session = ShellSession::start(&plain_shell(), false)
            .await
            .expect("start");
        let err = collect_output(&mut session, "exit 4\n").await.unwrap_err();
        assert!(matches!(err, FixieError::ShellTerminated(Some(4))));
    }

    #[tokio::test]
    async fn output_is_delivered_before_the_fragment_finishes() {
        let mut session = ShellSession::start(&plain_shell(), false)
            .await
            .expect("start");
        let started = tokio::time::Instant::now();
        let mut output = session
            .execute("echo start; sleep 2; echo end\n")
            .await
            .expect("execute");

        let first = output.next_chunk().await.expect("first chunk");
        assert_eq!(first.as_deref(), Some(&b"start\n"[..]));
        assert!(started.elapsed() < Duration::from_millis(1500));

        let mut rest = Vec::new();
        while let Some(chunk) = output.next_chunk().await.expect("chunk") {
            rest.extend(chunk);
        }
        assert_eq!(rest, b"end\n");
        assert_eq!(output.exit_code(), Some(0));
        session.finish().await.expect("finish");
    }

    #[tokio::test]
    async fn lookalike_output_does_not_end_fragment() {
        let mut session = ShellSession::start(&plain_shell(), false)
            .await
            .expect("start");
        let (out, _) = collect_output(
            &mut session,
            "echo __FIXIE_DONE__; echo __FIXIE_DONE__00000000-0000-0000-0000-000000000000; echo tail\n",
        )
        .await
        .expect("execute");
        assert_eq!(
            out,
            "__FIXIE_DONE__\n__FIXIE_DONE__00000000-0000-0000-0000-000000000000\ntail\n"
        );
        session.finish().await.expect("finish");
    }
}
