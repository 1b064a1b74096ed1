//! LimeStream - stream resolution and subtitles for LimeTV
//!
//! # Usage
//!
//! ```bash
//! limestream resolve 550 --imdb tt0137523
//! limestream subtitles 1399 -t tv -s 1 -e 3 -l eng --at 62
//! limestream tokens list --json
//! ```

use clap::Parser;

use limestream::cli::{Cli, Command, ExitCode, Output};
use limestream::commands::{self, Runtime};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; logs go to stderr so stdout stays parseable
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_filter().to_string());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = run_cli(cli).await;
    std::process::exit(exit_code.into());
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);

    let runtime = match Runtime::load(cli.config.as_deref()) {
        Ok(runtime) => runtime,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::Error),
    };

    match cli.command {
        Command::Resolve(cmd) => commands::resolve_cmd(cmd, &runtime, &output).await,
        Command::Subtitles(cmd) => commands::subtitles_cmd(cmd, &runtime, &output).await,
        Command::Tokens(cmd) => commands::tokens_cmd(cmd, &runtime, &output).await,
        Command::Progress(cmd) => commands::progress_cmd(cmd, &runtime, &output).await,
        Command::Share(cmd) => commands::share_cmd(cmd, &runtime, &output).await,
        Command::Languages(cmd) => commands::languages_cmd(cmd, &runtime, &output).await,
        Command::Styling(cmd) => commands::styling_cmd(cmd, &runtime, &output).await,
        Command::Server(cmd) => commands::server_cmd(cmd, &runtime, &output).await,
    }
}
