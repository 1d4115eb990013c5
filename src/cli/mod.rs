use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};

pub mod commands;

use self::commands::{
    Backend, CalendarArgs, DeleteArgs, ForgotArgs, ListArgs, LoginArgs, NewArgs, ProxyArgs,
    RegisterArgs, RemindArgs, ResetArgs, RestoreArgs, ShareArgs, TagArgs,
};

const LOG_FILE: &str = "mynote.log";

#[derive(Parser, Debug)]
#[command(
    name = "mynote",
    version,
    about = "Terminal client for the myNote notes service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over MYNOTE_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over MYNOTE_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Sign in and store the session cookies
    Login(LoginArgs),
    /// Create an account
    Register(RegisterArgs),
    /// Ask the backend to mail a password reset link
    Forgot(ForgotArgs),
    /// Set a new password with a reset token
    Reset(ResetArgs),
    /// End the session and forget the stored cookies
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Print notes, optionally filtered
    List(ListArgs),
    /// Create a new note from the command line
    New(NewArgs),
    /// Move a note to the trash
    Delete(DeleteArgs),
    /// Bring a note back from the trash
    Restore(RestoreArgs),
    /// Manage tags
    Tag(TagArgs),
    /// Manage who a note is shared with
    Share(ShareArgs),
    /// Set or clear a note's reminder
    Remind(RemindArgs),
    /// Add a note to Google Calendar
    Calendar(CalendarArgs),
    /// Print the Google Calendar consent URL
    Authorize,
    /// Serve the cookie/session endpoints and the /note route guard
    Proxy(ProxyArgs),
}

enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);

    let log_path = paths.log_dir.join(LOG_FILE);
    let target = match command {
        Commands::Tui => LogTarget::File(&log_path),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = Arc::new(loader.load_or_init()?);

    let backend = Backend::connect(&config, &paths)?;
    let api = backend.api();
    let output = match command {
        Commands::Tui => return commands::run_tui(config.clone(), &paths, &backend),
        Commands::Login(args) => commands::login(api, args),
        Commands::Register(args) => commands::register(api, args),
        Commands::Forgot(args) => commands::forgot(api, args),
        Commands::Reset(args) => commands::reset(api, args),
        Commands::Logout => commands::logout(api),
        Commands::Whoami => commands::whoami(api, backend.user_id()?),
        Commands::List(args) => commands::list(api, backend.user_id()?, &args),
        Commands::New(args) => commands::new_note(api, &config, args),
        Commands::Delete(args) => commands::delete(api, args),
        Commands::Restore(args) => commands::restore(api, args),
        Commands::Tag(args) => commands::handle_tag_command(api, args),
        Commands::Share(args) => commands::handle_share_command(api, args),
        Commands::Remind(args) => commands::handle_remind_command(api, backend.user_id()?, args),
        Commands::Calendar(args) => commands::calendar(api, &config, backend.user_id()?, args),
        Commands::Authorize => commands::authorize(&config),
        Commands::Proxy(args) => return commands::run_proxy(&config, args),
    };
    backend.persist()?;
    print!("{}", output?);
    Ok(())
}

fn init_tracing(level: &str, target: LogTarget<'_>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = fmt().with_env_filter(env_filter);
        match target {
            LogTarget::Stderr => builder.with_writer(std::io::stderr).init(),
            LogTarget::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                builder
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}
