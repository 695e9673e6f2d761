mod cmd;
mod exit;
mod logging;
mod output;

use std::process::ExitCode;

use clap::{ArgAction, Parser};

use crate::cmd::Command;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "wsstream", version, about = "WebSocket byte-stream tools")]
struct Cli {
    /// Output format (defaults to table on a terminal, JSON otherwise).
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log library events to stderr (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Write stderr logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.log_json);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let code = cmd::run(cli.command, format).unwrap_or_else(|err| {
        eprintln!("wsstream: {err}");
        err.code
    });
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
