//! bucketfs -- browse and synchronize an S3 bucket as a filesystem.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use tracing::info;

use bucketfs::bucket::Bucket;
use bucketfs::clock::SystemClock;
use bucketfs::config::Config;
use bucketfs::filesystem::{local, Filesystem, Name};
use bucketfs::path::Path;
use bucketfs::region::Region;
use bucketfs::transport::http::HttpTransport;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "bucketfs",
    version,
    about = "Browse and synchronize an S3 bucket as a filesystem"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "bucketfs.yaml")]
    config: String,

    /// Log at debug level regardless of the configured level.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the entries of a directory (the bucket root by default).
    Ls {
        #[arg(default_value = "")]
        dir: String,
    },
    /// Write the content of an object to stdout.
    Cat { file: String },
    /// Upload a local file or directory to the top of the bucket.
    Put { local: PathBuf },
    /// Download a file or directory into a local directory.
    Get { name: String, dest: PathBuf },
    /// Delete a file or directory, recursively.
    Rm { name: String },
    /// Print whether a file or directory exists.
    Exists { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = bucketfs::config::load_config(&cli.config)?;
    init_logging(&config, cli.verbose);
    info!("Loaded configuration from {}", cli.config);

    if config.observability.metrics {
        bucketfs::metrics::init_metrics();
        bucketfs::metrics::describe_metrics();
    }

    let bucket = connect(&config)?;
    let mut filesystem = Filesystem::new(bucket.clone());
    if !config.filesystem.keep_empty_directories {
        filesystem = filesystem.dont_keep_empty_directories();
    }

    let outcome = run(cli.command, &bucket, &filesystem).await;

    if let Some(text) = bucketfs::metrics::render_metrics() {
        eprint!("{text}");
    }
    outcome
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Build the bucket described by `config`, `auth` credentials taking
/// precedence over the ones in the URL.
fn connect(config: &Config) -> anyhow::Result<Bucket> {
    let mut url = reqwest::Url::parse(&config.bucket.url)?;
    if let Some(auth) = &config.auth {
        url.set_username(&auth.access_key)
            .map_err(|_| anyhow::anyhow!("bucket URL cannot carry credentials"))?;
        url.set_password(Some(&auth.secret_key))
            .map_err(|_| anyhow::anyhow!("bucket URL cannot carry credentials"))?;
    }

    let transport = Arc::new(HttpTransport::new(config.http.timeout())?);
    let region = Region::new(&config.bucket.region)?;
    let bucket = Bucket::locate(transport, Arc::new(SystemClock), url.as_str(), region)?;
    info!(
        "Using bucket {} (root '{}') in {}",
        bucket.name(),
        bucket.root(),
        bucket.region()
    );
    Ok(bucket)
}

async fn run(command: Command, bucket: &Bucket, filesystem: &Filesystem) -> anyhow::Result<()> {
    match command {
        Command::Ls { dir } => {
            let mut entries = bucket.list(&Path::parse(&dir).as_directory())?;
            while let Some(entry) = entries.try_next().await? {
                println!("{entry}");
            }
        }
        Command::Cat { file } => {
            let Some(content) = bucket.get(&Path::parse(&file)).await? else {
                anyhow::bail!("'{file}' does not exist");
            };
            std::io::stdout().write_all(&content)?;
        }
        Command::Put { local } => {
            let node = local::read_tree(&local)?;
            filesystem.add(&node).await?;
            info!("Uploaded {} as '{}'", local.display(), node.name());
        }
        Command::Get { name, dest } => {
            let name = Name::new(&name)?;
            let Some(node) = filesystem.get(&name).await? else {
                anyhow::bail!("'{name}' does not exist");
            };
            std::fs::create_dir_all(&dest)?;
            let written = local::write_tree(&node, &dest).await?;
            println!("{}", written.display());
        }
        Command::Rm { name } => {
            filesystem.remove(&Name::new(&name)?).await?;
            info!("Removed '{}'", name);
        }
        Command::Exists { name } => {
            println!("{}", filesystem.contains(&Name::new(&name)?).await?);
        }
    }
    Ok(())
}
