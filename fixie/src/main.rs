//! `fixie`: run named blocks from `~/.fixie/list` in one persistent shell.

use std::ffi::OsString;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use fixie::core::script::Script;
use fixie::io::config::load_config;
use fixie::io::init::{FixiePaths, ensure_default_script};
use fixie::io::oracle::BashSyntaxOracle;
use fixie::io::session::ShellSession;
use fixie::logging;
use fixie::report::{StdoutReporter, print_function_names};
use fixie::run::{RunContext, run_functions};

const USAGE: &str = "Usage: fixie <func1> <func2> ...";

/// Flags `Cli` understands; any other `-`-prefixed argument is dropped.
const KNOWN_FLAGS: &[&str] = &["--list", "--help", "-e"];

#[derive(Debug, Parser)]
#[command(
    name = "fixie",
    about = "Run functions from ~/.fixie/list in one shared shell",
    disable_help_flag = true
)]
struct Cli {
    /// Print declared function names and exit.
    #[arg(long, alias = "help")]
    list: bool,

    /// Stop at the first unknown function or failed command.
    #[arg(short = 'e')]
    fail_fast: bool,

    /// Functions to run, in order.
    names: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init();

    let cli = match Cli::try_parse_from(known_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => {
            debug!(err = %err, "unrecognized arguments");
            println!("{USAGE}");
            return;
        }
    };

    // Failures are reported but do not change the exit status.
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
    }
}

/// Drop unrecognized flags so that `fixie --whatever build` still runs `build`.
fn known_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut args = args.into_iter();
    let program = args.next();
    let rest = args.filter(|arg| {
        let arg = arg.to_string_lossy();
        !arg.starts_with('-') || KNOWN_FLAGS.contains(&&*arg)
    });
    program.into_iter().chain(rest).collect()
}

async fn run(cli: Cli) -> Result<()> {
    let paths = FixiePaths::from_home()?;
    ensure_default_script(&paths)?;
    let config = load_config(&paths.config_path)?;
    let script = Script::load(&paths.script_path)?;

    if cli.list {
        print_function_names(script.functions().iter().map(|f| f.name.as_str()));
        return Ok(());
    }
    if cli.names.is_empty() {
        println!("{USAGE}");
        return Ok(());
    }

    let mut session = ShellSession::start(&config.shell, cli.fail_fast).await?;
    let oracle = BashSyntaxOracle::new(&config.syntax_check);
    let mut reporter = StdoutReporter;

    let outcome = run_functions(
        &mut RunContext {
            script: &script,
            session: &mut session,
            oracle: &oracle,
            reporter: &mut reporter,
            fail_fast: cli.fail_fast,
        },
        &cli.names,
    )
    .await;
    let finished = session.finish().await;

    let summary = outcome?;
    finished?;
    debug!(?summary, "all functions finished");
    Ok(())
}
