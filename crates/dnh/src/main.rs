mod cli;
mod commands;
mod error;
mod logging;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match &cli.command {
        // `run` installs tracing itself once the log file is known.
        Command::Run(args) => commands::run::handle(args, &cli.global).await,

        Command::Config(args) => {
            let _guard = logging::init_tracing(cli.global.verbose, false, cli.global.log_json, None);
            commands::config_cmd::handle(args, &cli.global)
        }

        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "dnh",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}
