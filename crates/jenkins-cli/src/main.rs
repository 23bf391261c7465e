//! Jenkins CLI binary entrypoint.
//!
//! This is the main entry point for the `jenkins` command-line tool.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use jenkins_cli::cli::{Action, Cli};
use jenkins_cli::commands::{
    ArtifactsCommand, BuildCommand, BuildsCommand, ConfigCommand, ConsoleCommand, InfoCommand,
    ListCommand, Listing, StopCommand, WaitCommand, WorkspaceCommand,
};
use jenkins_cli::config::{Config, Settings};
use jenkins_cli::output::OutputFormat;
use jenkins_cli::session::Session;
use jenkins_cli::CliError;
use jenkins_client::{Clock, Transport, exit};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.makeconf {
        print!("{}", Config::template());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_tracing(&cli) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(hint) = e.hint() {
                eprintln!("Hint: {hint}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

/// `RUST_LOG` wins; otherwise `-v` raises the level and `-d` traces HTTP.
fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        EnvFilter::try_from_default_env().context("invalid RUST_LOG")?
    } else {
        EnvFilter::try_new(log_directives(cli.verbose, cli.debug_http)).context("invalid log filter")?
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))
}

fn log_directives(verbose: u8, debug_http: bool) -> String {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    if debug_http {
        format!("{level},jenkins_client::transport=trace")
    } else {
        level.to_string()
    }
}

async fn run(cli: Cli) -> Result<u8, CliError> {
    let action = cli.action()?;
    let config = match cli.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let settings = Settings::resolve(&cli, &config)?;

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let session = Session::connect(settings, cancel)?;
    let result = dispatch(&session, &cli, action).await;
    watcher.abort();
    result
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted");
        cancel.cancel();
    }
}

async fn dispatch<T: Transport + Clone, C: Clock + Clone>(
    session: &Session<T, C>,
    cli: &Cli,
    action: Action,
) -> Result<u8, CliError> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout();

    match action {
        Action::Build => {
            let cmd = BuildCommand::new(session);
            return cmd.execute(&mut stdout, &format, cli).await;
        }
        Action::Wait => {
            let cmd = WaitCommand::new(session);
            return cmd.execute(&mut stdout, &format, cli).await;
        }
        Action::Console => {
            let cmd = ConsoleCommand::new(session);
            cmd.execute(&mut stdout, cli).await?;
        }
        Action::Stop { force } => {
            let cmd = StopCommand::new(session, force);
            cmd.execute(&mut stdout, &format, cli).await?;
        }
        Action::Info => {
            let cmd = InfoCommand::new(session);
            cmd.execute(&mut stdout, &format, cli).await?;
        }
        Action::AllBuilds => {
            let cmd = BuildsCommand::new(session);
            cmd.execute(&mut stdout, &format, cli).await?;
        }
        Action::ListJobs => {
            let cmd = ListCommand::new(session, Listing::Jobs);
            cmd.execute(&mut stdout, &format, cli).await?;
        }
        Action::ListQueue => {
            let cmd = ListCommand::new(session, Listing::Queue);
            cmd.execute(&mut stdout, &format, cli).await?;
        }
        Action::ListNodes => {
            let cmd = ListCommand::new(session, Listing::Nodes);
            cmd.execute(&mut stdout, &format, cli).await?;
        }
        Action::Artifacts => {
            let cmd = ArtifactsCommand::new(session);
            cmd.execute(&mut stdout, &format, cli).await?;
        }
        Action::GetConfig => {
            let cmd = ConfigCommand::new(session);
            cmd.get(&mut stdout, cli).await?;
        }
        Action::PostConfig(file) => {
            let cmd = ConfigCommand::new(session);
            cmd.post(&mut stdout, &format, cli, &file).await?;
        }
        Action::GetGroovy => {
            let cmd = ConfigCommand::new(session);
            cmd.get_groovy(&mut stdout, cli).await?;
        }
        Action::SetGroovy(file) => {
            let cmd = ConfigCommand::new(session);
            cmd.set_groovy(&mut stdout, &format, cli, &file).await?;
        }
        Action::Workspace(path) => {
            let cmd = WorkspaceCommand::new(session);
            cmd.download(&mut stdout, &format, cli, &path).await?;
        }
        Action::WipeWorkspace => {
            let cmd = WorkspaceCommand::new(session);
            cmd.wipe(&mut stdout, &format, cli).await?;
        }
    }

    Ok(exit::SUCCESS)
}
