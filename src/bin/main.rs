use clap::{Parser, Subcommand};
use stripebox::{config::Config, serve::run_server, storage::Storage};
use tracing::{info, warn};
use tracing_appender::{
    non_blocking,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// CLI for the striped-parity file store
#[derive(Parser)]
#[command(name = "stripebox")]
#[command(about = "RAID-4 style striped file storage with XOR parity")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service.
    ///
    /// Exposes create/retrieve/update/delete over logical files plus the
    /// block repair endpoint.
    Serve {
        /// Port to bind the server to.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Scan every stored file and report its integrity.
    ///
    /// Damaged stripes are purged during the scan; recover a lost block
    /// with `fix` before running this if one block is known to be bad.
    Health,

    /// Rebuild a lost or damaged block from the surviving blocks.
    Fix {
        /// Index of the block to rebuild.
        #[arg(short, long)]
        block: usize,
    },
}

/// Routes tracing events to stdout and a daily-rolling log file.
///
/// Both writers are non-blocking so request handling never stalls on log
/// I/O; the guards are leaked to keep the writer threads alive for the
/// process lifetime.
fn init_logging(level: &str, directory: &std::path::Path) {
    let file_appender = RollingFileAppender::new(Rotation::DAILY, directory, "stripebox.log");
    let (file_writer, file_guard) = non_blocking(file_appender);
    let (stdout_writer, stdout_guard) = non_blocking(std::io::stdout());

    let subscriber = Registry::default()
        .with(
            // RUST_LOG wins over the configured level when set.
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string())),
        )
        .with(
            fmt::layer()
                .with_writer(stdout_writer)
                .with_target(true)
                .with_thread_ids(true),
        )
        .with(fmt::layer().with_writer(file_writer).with_ansi(false));
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    Box::leak(Box::new(file_guard));
    Box::leak(Box::new(stdout_guard));
}

fn open_storage(config: &Config) -> std::io::Result<Storage> {
    Storage::open(
        &config.storage.upload_path,
        &config.storage.folder_prefix,
        config.storage.num_disks,
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::load().map_err(|e| format!("failed to load configuration: {e}"))?;
    init_logging(&config.logging.level, &config.logging.directory);

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            info!(
                upload_path = ?config.storage.upload_path,
                num_disks = config.storage.num_disks,
                "SERVE | starting"
            );
            run_server(&config).await?;
            Ok(())
        }

        Commands::Health => {
            let storage = open_storage(&config)?;
            let report = storage.health_check()?;
            info!(
                total_files = report.total_files,
                intact = report.intact,
                purged = report.purged,
                "HEALTH | scan complete"
            );
            for (name, ok) in &report.files {
                if *ok {
                    info!(file = name.as_str(), "intact");
                } else {
                    warn!(file = name.as_str(), "damaged stripe purged");
                }
            }
            Ok(())
        }

        Commands::Fix { block } => {
            let storage = open_storage(&config)?;
            info!(block, "FIX | rebuilding block");
            storage.fix_block(block)?;
            info!(block, "FIX | rebuild complete");
            Ok(())
        }
    }
}
