//! # dashgrid
//!
//! Dashboard layout CLI and server.
//!
//! ```text
//! dashgrid init --columns 12
//! dashgrid add task-list --title "Today"
//! dashgrid show
//! dashgrid serve --bind 0.0.0.0:8787
//! dashgrid sync --remote http://host:8787 --watch 5
//! ```

use clap::{Parser, Subcommand};
use dashgrid::cli;
use dashgrid::config::{Config, Overrides};
use dashgrid::AppResult;
use dashgrid_core::primitives::DEFAULT_COLUMNS;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dashgrid", version, about = "Grid dashboard layout engine", propagate_version = true)]
struct Cli {
    /// Storage path (JSON file or redb database)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Storage backend: file or redb
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Dashboard name within the store
    #[arg(long, global = true)]
    dashboard: Option<String>,

    /// Remote dashgrid server URL
    #[arg(long, global = true)]
    remote: Option<String>,

    /// API key for the remote, or required by `serve`
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty dashboard
    Init {
        #[arg(long, default_value_t = DEFAULT_COLUMNS)]
        columns: u32,
        /// Overwrite an existing dashboard
        #[arg(long)]
        force: bool,
    },
    /// Print the layout
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Print dashboard metadata
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Add a widget at the first free position
    Add {
        /// task-list, saved-search, calendar, stats, notes or activity
        kind: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        w: Option<u32>,
        #[arg(long)]
        h: Option<u32>,
    },
    /// Remove a widget
    #[command(alias = "rm")]
    Remove { id: u64 },
    /// Move a widget to (x, y)
    Move { id: u64, x: u32, y: u32 },
    /// Resize a widget
    Resize { id: u64, w: u32, h: u32 },
    /// Rename a widget or replace its settings
    Update {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        /// key=value, repeatable
        #[arg(long = "set")]
        settings: Vec<String>,
    },
    /// Change the number of grid columns
    Columns { columns: u32 },
    /// Pull widgets up into free space
    Compact,
    /// Export the dashboard
    Export {
        output: PathBuf,
        /// json or binary
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Replace the dashboard with an export
    Import { input: PathBuf },
    /// List dashboards in the store
    Dashboards,
    /// Reconcile with the remote
    Sync {
        /// Keep syncing every N seconds
        #[arg(long)]
        watch: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Serve the dashboard over HTTP
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dashgrid=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> AppResult<()> {
    let bind = match &cli.command {
        Commands::Serve { bind } => bind.clone(),
        _ => None,
    };
    let config = Config::from_env()?.apply(Overrides {
        backend: cli.backend,
        db_path: cli.db,
        dashboard: cli.dashboard,
        remote_url: cli.remote,
        api_key: cli.api_key,
        bind,
    })?;

    match cli.command {
        Commands::Init { columns, force } => cli::cmd_init(&config, columns, force),
        Commands::Show { json } => cli::cmd_show(&config, json),
        Commands::Status { json } => cli::cmd_status(&config, json),
        Commands::Add { kind, title, w, h } => {
            cli::cmd_add(&config, &kind, title.as_deref(), w, h).map(|_| ())
        }
        Commands::Remove { id } => cli::cmd_remove(&config, id),
        Commands::Move { id, x, y } => cli::cmd_move(&config, id, x, y),
        Commands::Resize { id, w, h } => cli::cmd_resize(&config, id, w, h),
        Commands::Update {
            id,
            title,
            settings,
        } => cli::cmd_update(&config, id, title.as_deref(), &settings),
        Commands::Columns { columns } => cli::cmd_columns(&config, columns),
        Commands::Compact => cli::cmd_compact(&config),
        Commands::Export { output, format } => cli::cmd_export(&config, &output, &format),
        Commands::Import { input } => cli::cmd_import(&config, &input),
        Commands::Dashboards => cli::cmd_dashboards(&config).map(|_| ()),
        Commands::Sync { watch, json } => runtime()?.block_on(cli::cmd_sync(&config, watch, json)),
        Commands::Serve { .. } => runtime()?.block_on(cli::cmd_serve(&config)),
    }
}

fn runtime() -> AppResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
