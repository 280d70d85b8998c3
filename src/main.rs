//! # Karakeep Triage CLI (`kktriage`)
//!
//! Files unsorted Karakeep bookmarks into lists from the terminal and exposes
//! the membership cache and key assignment for inspection.
//!
//! ## Usage
//!
//! ```bash
//! kktriage --config ./config/kktriage.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kktriage lists` | Show all lists with their kind |
//! | `kktriage keys` | Show the smart key for each assignable list |
//! | `kktriage memberships <bookmark>` | Lists containing a bookmark |
//! | `kktriage add <bookmark> <list>...` | Add a bookmark to one or more lists |
//! | `kktriage remove <bookmark> <list>` | Remove a bookmark from a list |
//! | `kktriage usage` | Recorded list usage |
//! | `kktriage stats` | Membership cache statistics |
//! | `kktriage layout [name]` | Show or choose the keyboard layout |
//! | `kktriage run` | Interactive triage of unfiled bookmarks |
//! | `kktriage completions <shell>` | Print shell completions |

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use karakeep_triage::{commands, config, logging};

/// Karakeep Triage: sort unfiled bookmarks into lists with one keystroke.
///
/// The API token is read from `api.token` in the config file or from the
/// `KARAKEEP_API_TOKEN` environment variable.
#[derive(Parser)]
#[command(
    name = "kktriage",
    about = "Sort unfiled Karakeep bookmarks into lists with one keystroke",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/kktriage.toml`. Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/kktriage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all lists, manual and smart.
    Lists,

    /// Show the key assigned to each manual list and why.
    Keys,

    /// Show the lists a bookmark belongs to.
    Memberships { bookmark: String },

    /// Add a bookmark to one or more lists.
    Add {
        bookmark: String,
        #[arg(required = true)]
        lists: Vec<String>,
    },

    /// Remove a bookmark from a list.
    Remove { bookmark: String, list: String },

    /// Show how often each list has been picked.
    Usage,

    /// Show membership cache statistics.
    Stats,

    /// Show the keyboard layout, or switch to `name`.
    ///
    /// Layouts: numbers, home-row, qwerty, minimal.
    Layout { name: Option<String> },

    /// Triage unarchived bookmarks that are in no manual list.
    Run,

    /// Print shell completions to stdout.
    Completions { shell: Shell },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "kktriage",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    logging::init_logger();
    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Lists => commands::run_lists(&cfg).await?,
        Commands::Keys => commands::run_keys(&cfg).await?,
        Commands::Memberships { bookmark } => commands::run_memberships(&cfg, &bookmark).await?,
        Commands::Add { bookmark, lists } => commands::run_add(&cfg, &bookmark, &lists).await?,
        Commands::Remove { bookmark, list } => {
            commands::run_remove(&cfg, &bookmark, &list).await?
        }
        Commands::Usage => commands::run_usage(&cfg)?,
        Commands::Stats => commands::run_stats(&cfg).await?,
        Commands::Layout { name } => commands::run_layout(&cfg, name.as_deref())?,
        Commands::Run => commands::run_triage(&cfg).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
