// dal - headless KDDart DAL client
// Logs in, runs one command, prints the rows, logs out.

mod dal;
mod exit_codes;
mod output;

use std::io::{self, BufRead};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use dalclient_config::{ResponseFormat, Settings};

use exit_codes::{
    EXIT_DAL_ERROR, EXIT_DAL_LOGIN, EXIT_DAL_SWITCH_GROUP, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "dal")]
#[command(about = "KDDart DAL client (headless)")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(flatten)]
    opts: DalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Connection options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct DalOpts {
    /// DAL base URL, e.g. https://kddart.example.org/dal/
    #[arg(long, global = true, env = "DAL_BASE_URL")]
    pub url: Option<String>,

    /// Username to log in as
    #[arg(long, global = true, env = "DAL_USERNAME")]
    pub user: Option<String>,

    /// Password (falls back to the system keychain)
    #[arg(long, global = true, env = "DAL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Response format requested from the DAL (json or xml)
    #[arg(long, global = true)]
    pub format: Option<ResponseFormat>,

    /// Switch to this group after login
    #[arg(long, global = true)]
    pub group: Option<i64>,

    /// Ask the DAL to keep the session until logout
    #[arg(long, global = true)]
    pub explicit_logout: bool,

    /// Print rows as JSON lines
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a read-only DAL command and print the result rows
    #[command(after_help = "\
Examples:
  dal --url https://kddart.example.org/dal --user admin query list/genus
  dal query 'list/genus/50/page/1' --param \"Filtering=GenusName='Wheat'\"
  dal --json query get/genus/7 --tag Genus")]
    Query {
        /// DAL command, e.g. list/genus
        command: String,

        /// Request parameter (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Only print rows of this tag (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },

    /// Run a signed DAL write command
    #[command(after_help = "\
Examples:
  dal update update/genus/7 --param GenusName=Triticum
  dal update add/genus --param GenusName=Avena")]
    Update {
        /// DAL command, e.g. update/genus/7
        command: String,

        /// Form parameter, signed in the order given (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Print the client version and the DAL server version (no login)
    Version,

    /// Log in, print the session, log out
    LoginCheck,

    /// Show or change saved settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Manage the keychain password for --user
    Password {
        #[command(subcommand)]
        command: PasswordCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the settings file location and contents
    Show,
    /// Save the default base URL
    SetUrl { url: String },
    /// Save the default response format (json or xml)
    SetFormat { format: ResponseFormat },
}

#[derive(Subcommand)]
enum PasswordCommands {
    /// Store a password (from --password, or the first line of stdin)
    Set,
    /// Remove the stored password
    Delete,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nclient:  DALClient-v", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let opts = cli.opts;

    let result = match cli.command {
        Commands::Query { command, params, tags } => dal::cmd_query(&opts, &command, &params, &tags),
        Commands::Update { command, params } => dal::cmd_update(&opts, &command, &params),
        Commands::Version => dal::cmd_version(&opts),
        Commands::LoginCheck => dal::cmd_login_check(&opts),
        Commands::Config { command } => match command {
            ConfigCommands::Show => cmd_config_show(),
            ConfigCommands::SetUrl { url } => cmd_config_set_url(url),
            ConfigCommands::SetFormat { format } => cmd_config_set_format(format),
        },
        Commands::Password { command } => match command {
            PasswordCommands::Set => cmd_password_set(&opts),
            PasswordCommands::Delete => cmd_password_delete(&opts),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn dal(msg: impl Into<String>) -> Self {
        Self { code: EXIT_DAL_ERROR, message: msg.into(), hint: None }
    }

    pub fn login(msg: impl Into<String>) -> Self {
        Self { code: EXIT_DAL_LOGIN, message: msg.into(), hint: None }
    }

    pub fn switch_group(msg: impl Into<String>) -> Self {
        Self { code: EXIT_DAL_SWITCH_GROUP, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Settings and credentials
// ============================================================================

fn cmd_config_show() -> Result<(), CliError> {
    let settings = Settings::load();
    let json = serde_json::to_string_pretty(&settings).map_err(|e| CliError::general(e.to_string()))?;
    println!("# {}", Settings::path().display());
    println!("{}", json);
    Ok(())
}

fn cmd_config_set_url(url: String) -> Result<(), CliError> {
    let mut settings = Settings::load();
    settings.base_url = Some(url);
    settings.save().map_err(CliError::general)
}

fn cmd_config_set_format(format: ResponseFormat) -> Result<(), CliError> {
    let mut settings = Settings::load();
    settings.response_type = format;
    settings.save().map_err(CliError::general)
}

fn require_user(opts: &DalOpts, settings: &Settings) -> Result<String, CliError> {
    opts.user
        .clone()
        .or_else(|| settings.username.clone())
        .ok_or_else(|| CliError::usage("no username").with_hint("pass --user or set DAL_USERNAME"))
}

fn cmd_password_set(opts: &DalOpts) -> Result<(), CliError> {
    let settings = Settings::load();
    let user = require_user(opts, &settings)?;

    let password = match &opts.password {
        Some(p) => p.clone(),
        None => {
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|e| CliError::general(format!("cannot read password: {}", e)))?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        return Err(CliError::usage("empty password"));
    }

    dalclient_config::set_password(&user, &password).map_err(CliError::general)?;
    eprintln!("password stored for {}", user);
    Ok(())
}

fn cmd_password_delete(opts: &DalOpts) -> Result<(), CliError> {
    let settings = Settings::load();
    let user = require_user(opts, &settings)?;
    dalclient_config::delete_password(&user).map_err(CliError::general)?;
    eprintln!("password removed for {}", user);
    Ok(())
}
