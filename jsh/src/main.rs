use anyhow::{Context as _, Result};
use clap::Parser;
use job_shell::config::Config;
use job_shell::errors::display_user_error;
use job_shell::process::SignalPolicy;
use job_shell::repl::Repl;
use job_shell::shell::Shell;
use job_shell::shell::terminal::TerminalOwnership;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Run the given command lines (one per line) and exit
    #[arg(short, long)]
    command: Option<String>,

    /// Config file to use instead of $XDG_CONFIG_HOME/jsh/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Never take the terminal or install the shell's signal handlers
    #[arg(long)]
    no_job_control: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            display_user_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.no_job_control {
        config.job_control = false;
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file;
    }
    init_tracing(&config)?;
    setup_panic_handler();

    let terminal = TerminalOwnership::detect(libc::STDIN_FILENO, config.job_control);
    let mut shell = Shell::new(config, terminal);
    if shell.is_interactive()
        && let Err(err) = shell.terminal_mut().acquire()
    {
        error!("failed to acquire terminal: {}", err);
    }

    if let Some(command) = cli.command {
        let ctx = shell.context();
        for line in command.lines() {
            shell.eval_str(&ctx, line);
            if let Some(code) = shell.exited() {
                return Ok(code);
            }
        }
        return Ok(shell.last_status);
    }

    if shell.is_interactive() {
        SignalPolicy::install_shell_policy().context("failed to install signal handlers")?;
        info!("shell started: pgid {}", shell.terminal_mut().shell_pgid());
    }
    let code = Repl::new(&mut shell).run_interactive()?;
    if shell.is_interactive() {
        shell.hangup_jobs();
    }
    debug!("shell exit: {}", code);
    Ok(code)
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_env("JSH_LOG")
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;

    match &config.log_file {
        Some(path) => {
            let log_file = std::sync::Arc::new(
                std::fs::File::create(path)
                    .with_context(|| format!("failed to create log file {}", path.display()))?,
            );
            tracing_subscriber::fmt()
                .with_ansi(false)
                .with_env_filter(filter)
                .with_file(true)
                .with_line_number(true)
                .with_writer(log_file)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        error!("PANIC at {}: {}", location, panic_info);
        default_hook(panic_info);
    }));
}
