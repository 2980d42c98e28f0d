//! sfcc - command line tools for remote commerce instances
//!
//! Follows instance logs, moves files over WebDAV, uploads cartridges as code
//! versions, lists code versions and job executions, and compares migration
//! histories. Connection settings come from flags, `SFCC_*` environment
//! variables and the project's `dw.json`, in that order of precedence.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use sfcc_commands::code_versions::{CodeVersionsAction, CodeVersionsArgs};
use sfcc_commands::jobs::JobsArgs;
use sfcc_commands::migrate::MigrateStatusArgs;
use sfcc_commands::sync::SyncArgs;
use sfcc_commands::tail::TailArgs;
use sfcc_commands::webdav::{WebDavAction, WebDavArgs};
use sfcc_commands::{code_versions, jobs, migrate, sync, tail, webdav};
use sfcc_runtime::config::Environment;
use sfcc_runtime::webdav::Location;

#[derive(Parser)]
#[command(name = "sfcc")]
#[command(about = "Command line tools for remote commerce instances")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    connection: ConnectionArgs,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Instance connection settings; unset values fall back to `SFCC_*`
/// variables, then to `dw.json`
#[derive(Args, Debug, Default)]
struct ConnectionArgs {
    /// Instance hostname
    #[arg(long, global = true)]
    server: Option<String>,

    /// Business Manager user
    #[arg(long, global = true)]
    username: Option<String>,

    /// Business Manager password
    #[arg(long, global = true)]
    password: Option<String>,

    /// API client id
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// API client secret
    #[arg(long, global = true)]
    client_secret: Option<String>,

    /// Code version
    #[arg(long, global = true)]
    code_version: Option<String>,

    /// Site id for the Shop API
    #[arg(long, global = true)]
    site_id: Option<String>,

    /// Project file with connection settings
    #[arg(long, global = true, default_value = "dw.json")]
    config: PathBuf,

    /// Accept invalid TLS certificates
    #[arg(long, global = true)]
    insecure: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the instance log files
    Tail {
        /// Log name prefixes to follow
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Poll interval in milliseconds
        #[arg(short, long, default_value = "3000")]
        interval: u64,

        /// Follow every matching file, not only the newest per prefix
        #[arg(short, long)]
        all: bool,
    },

    /// Upload the cartridges below a directory as the configured code version
    Sync {
        /// Directory searched for cartridges
        #[arg(default_value = ".")]
        directory: PathBuf,

        /// Delete the code version first and activate it afterwards
        #[arg(long)]
        reactivate: bool,
    },

    /// File operations on a WebDAV location
    Webdav {
        /// Impex, Logs, Cartridges, Securitylogs, Temp or Realmdata
        location: Location,

        #[command(subcommand)]
        command: WebDavCommand,
    },

    /// List or activate code versions
    CodeVersions {
        #[command(subcommand)]
        command: CodeVersionsCommand,
    },

    /// Compare migration histories
    Migrate {
        #[command(subcommand)]
        command: MigrateCommand,
    },

    /// List job executions started within a time window
    Jobs {
        /// Window start (RFC 3339); defaults to one day ago
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Window end (RFC 3339); defaults to now
        #[arg(long)]
        until: Option<DateTime<Utc>>,

        /// Only executions of this job
        #[arg(long)]
        job_id: Option<String>,

        /// Results requested per page
        #[arg(long)]
        page_size: Option<usize>,
    },
}

#[derive(Subcommand)]
enum WebDavCommand {
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        directory: String,

        /// Regular expression names must match
        #[arg(short, long)]
        filter: Option<String>,

        /// Sort by modified time, newest first
        #[arg(short = 't')]
        by_time: bool,
    },
    /// Download a file
    Get {
        path: String,

        /// Local destination
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload a file
    Put {
        local: PathBuf,

        /// Remote path; defaults to the local file name
        path: Option<String>,
    },
    /// Delete a file or directory
    Rm { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Unpack an archive on the instance
    Unzip { path: String },
}

#[derive(Subcommand)]
enum CodeVersionsCommand {
    /// List code versions
    List,
    /// Activate a code version
    Activate { id: String },
}

#[derive(Subcommand)]
enum MigrateCommand {
    /// Show migrations and hotfixes the instance is missing
    Status {
        /// Project migrations in order, comma separated
        #[arg(long)]
        migrations: String,

        /// Project hotfixes, comma separated
        #[arg(long, default_value = "")]
        hotfixes: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let env = load_environment(&cli.connection)?;
    debug!(?env, "resolved environment");

    let code = match cli.command {
        Command::Tail {
            filters,
            interval,
            all,
        } => {
            let args = TailArgs {
                filters,
                interval: Duration::from_millis(interval),
                all,
            };
            tail::execute(&env, args, cancel_on_ctrl_c()).await?
        }
        Command::Sync {
            directory,
            reactivate,
        } => {
            let args = SyncArgs {
                directory,
                delete_and_reactivate: reactivate,
            };
            sync::execute(&env, args).await?
        }
        Command::Webdav { location, command } => {
            let action = match command {
                WebDavCommand::Ls {
                    directory,
                    filter,
                    by_time,
                } => WebDavAction::Ls {
                    directory,
                    filter,
                    sort_by_time: by_time,
                },
                WebDavCommand::Get { path, output } => WebDavAction::Get {
                    path,
                    destination: output,
                },
                WebDavCommand::Put { local, path } => WebDavAction::Put { local, path },
                WebDavCommand::Rm { path } => WebDavAction::Rm { path },
                WebDavCommand::Mkdir { path } => WebDavAction::Mkdir { path },
                WebDavCommand::Unzip { path } => WebDavAction::Unzip { path },
            };
            webdav::execute(&env, WebDavArgs { location, action }).await?;
            0
        }
        Command::CodeVersions { command } => {
            let action = match command {
                CodeVersionsCommand::List => CodeVersionsAction::List,
                CodeVersionsCommand::Activate { id } => CodeVersionsAction::Activate { id },
            };
            code_versions::execute(&env, CodeVersionsArgs { action }).await?;
            0
        }
        Command::Migrate {
            command: MigrateCommand::Status {
                migrations,
                hotfixes,
            },
        } => {
            migrate::status(&env, MigrateStatusArgs::new(migrations, hotfixes)).await?;
            0
        }
        Command::Jobs {
            since,
            until,
            job_id,
            page_size,
        } => {
            let end = until.unwrap_or_else(Utc::now);
            let args = JobsArgs {
                start: since.unwrap_or(end - TimeDelta::days(1)),
                end,
                job_id,
                page_size,
            };
            jobs::execute(&env, args).await?;
            0
        }
    };

    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

/// Combine flags, `SFCC_*` variables and `dw.json`, earlier sources winning
fn load_environment(connection: &ConnectionArgs) -> Result<Environment> {
    let flags = Environment {
        server: connection.server.clone().unwrap_or_default(),
        username: connection.username.clone(),
        password: connection.password.clone(),
        client_id: connection.client_id.clone(),
        client_secret: connection.client_secret.clone(),
        code_version: connection.code_version.clone(),
        site_id: connection.site_id.clone(),
        verify: !connection.insecure,
    };
    let env = flags.merged_with(Environment::from_env());
    merge_project_file(env, &connection.config)
}

fn merge_project_file(env: Environment, path: &Path) -> Result<Environment> {
    if !path.exists() {
        return Ok(env);
    }
    let project = Environment::from_dw_json(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(env.merged_with(project))
}

/// Receiver that flips to `true` on the first Ctrl-C
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for Ctrl-C");
                tx.closed().await;
            }
        }
    });
    rx
}
