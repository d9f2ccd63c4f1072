use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::auth::AuthManager;
use crate::config::Config;
use crate::entity::{self, backup::BackupOptions, layout::BackupFormat};
use crate::server::EntityQuery;
use crate::tui::OutputFormat;
use crate::util::logging::init_tracing;

#[derive(Parser)]
#[command(name = "entigraph")]
#[command(version, about = "Command-line client for the entigraph entity service", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Entity backup, restore and inspection
    #[command(subcommand)]
    Entity(EntityCommands),

    /// Entity type definitions
    #[command(subcommand)]
    Definition(DefinitionCommands),

    /// Manage the stored API token
    #[command(subcommand)]
    Auth(AuthCommands),

    /// Local client configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum EntityCommands {
    /// Write definitions, entities and relations to a backup directory
    Backup {
        /// Directory to write the backup into
        output_dir: PathBuf,
        /// Only back up entities with this name
        #[arg(long)]
        name: Option<String>,
        /// Label selector, e.g. `tier=web`
        #[arg(short, long)]
        label: Option<String>,
        #[arg(long)]
        field_selector: Option<String>,
        #[arg(long, value_enum, default_value_t = BackupFormat::Yaml)]
        format: BackupFormat,
    },

    /// Recreate definitions, entities and relations from a backup directory
    Restore {
        /// Directory produced by `entity backup`
        input_dir: PathBuf,
        /// Print what would be restored without calling the API
        #[arg(long)]
        dry_run: bool,
        /// Concurrent create requests per phase
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// List entities
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        label: Option<String>,
        #[arg(long)]
        field_selector: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Show a single entity
    Get {
        /// `[entity://]group/version/plural/namespace/name`
        id: String,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[derive(Subcommand)]
enum DefinitionCommands {
    /// List entity type definitions
    List {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Store an API token
    Login {
        #[arg(long)]
        token: String,
        #[arg(long)]
        refresh_token: Option<String>,
        /// Token lifetime in seconds
        #[arg(long)]
        expires_in: Option<i64>,
    },

    /// Check authentication status
    Status,

    /// Remove the stored token
    Logout,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the active configuration
    Show,

    /// Set the API base URL
    SetUrl { url: String },

    /// Clear all config from the system
    Clear,
}

pub async fn cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Entity(cmd) => match cmd {
            EntityCommands::Backup {
                output_dir,
                name,
                label,
                field_selector,
                format,
            } => {
                entity::backup_command(BackupOptions {
                    output_dir,
                    name,
                    label_selector: label,
                    field_selector,
                    format,
                })
                .await?
            }
            EntityCommands::Restore {
                input_dir,
                dry_run,
                workers,
            } => entity::restore_command(input_dir, dry_run, workers).await?,
            EntityCommands::List {
                name,
                label,
                field_selector,
                limit,
                offset,
                output,
            } => {
                let query = EntityQuery {
                    name,
                    label_selector: label,
                    field_selector,
                    limit,
                    offset,
                    include_relations: false,
                };
                entity::list(query, output).await?
            }
            EntityCommands::Get { id, output } => entity::get(&id, output).await?,
        },
        Commands::Definition(cmd) => match cmd {
            DefinitionCommands::List { output } => entity::list_definitions(output).await?,
        },
        Commands::Auth(cmd) => match cmd {
            AuthCommands::Login {
                token,
                refresh_token,
                expires_in,
            } => AuthManager::login(token, refresh_token, expires_in)?,
            AuthCommands::Status => AuthManager::status()?,
            AuthCommands::Logout => AuthManager::logout()?,
        },
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => {
                let config = Config::load()?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigCommands::SetUrl { url } => {
                let mut config = Config::load()?;
                config.api_url = url.trim_end_matches('/').to_string();
                config.save()?;
                println!("API URL set to {}", config.api_url);
            }
            ConfigCommands::Clear => Config::clear()?,
        },
        Commands::Version => {
            println!("entigraph version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
