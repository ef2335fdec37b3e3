//! cloudstore - object store operator tool

use clap::{Parser, Subcommand};
use cloudstore_cli::{commands, load_settings};
use cloudstore_client::{CloudStore, DEFAULT_CONNECTION};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cloudstore")]
#[command(about = "Upload, fetch and encrypt objects in S3-compatible stores")]
#[command(version)]
struct Args {
    /// Settings file (TOML, JSON or YAML)
    #[arg(short, long, env = "CLOUDSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Connection profile
    #[arg(short, long, default_value = DEFAULT_CONNECTION, env = "CLOUDSTORE_PROFILE", global = true)]
    profile: String,

    /// Enable debug logging
    #[arg(short, long, env = "CLOUDSTORE_DEBUG", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file and print its URL (or key)
    Upload {
        bucket: String,
        file: PathBuf,
        /// Name in the store, defaults to the local file name
        #[arg(long)]
        name: Option<String>,
        /// Directory under the upload root
        #[arg(long, default_value = "")]
        directory: String,
        #[arg(long)]
        content_type: Option<String>,
        /// Encrypt with the file encryption key before upload
        #[arg(long)]
        encrypt: bool,
        /// Skip the MIME type allow-list check
        #[arg(long)]
        no_type_check: bool,
        /// Print the key instead of the URL
        #[arg(long)]
        key_only: bool,
    },
    /// Download an object by URL or path
    Download {
        bucket: String,
        url: String,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Decrypt with the file encryption key
        #[arg(long)]
        decrypt: bool,
    },
    /// Delete an object by URL or path
    Delete { bucket: String, url: String },
    /// Print the public URL of a key
    Url { bucket: String, key: String },
    /// Encrypt a file (or stdin) into the stored envelope format
    Encrypt {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Secret to use instead of the configured key
        #[arg(long, env = "CLOUDSTORE_ENCRYPTION_KEY", hide_env_values = true)]
        key: Option<String>,
    },
    /// Decrypt an envelope produced by `encrypt` or an encrypted upload
    Decrypt {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, env = "CLOUDSTORE_ENCRYPTION_KEY", hide_env_values = true)]
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Logs go to stderr so downloads can be piped
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("cloudstore_cli={0},cloudstore_client={0}", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = load_settings(args.config.as_deref())?;
    let store = CloudStore::new(settings);
    let profile = args.profile;

    match args.command {
        Command::Upload {
            bucket,
            file,
            name,
            directory,
            content_type,
            encrypt,
            no_type_check,
            key_only,
        } => {
            let options = commands::UploadOptions {
                bucket,
                file,
                name,
                directory,
                profile,
                content_type,
                encrypt,
                skip_type_check: no_type_check,
                key_only,
            };
            println!("{}", commands::upload(&store, options).await?);
        }
        Command::Download {
            bucket,
            url,
            output,
            decrypt,
        } => {
            commands::download(&store, &bucket, &url, &profile, decrypt, output.as_deref()).await?;
        }
        Command::Delete { bucket, url } => {
            commands::delete(&store, &bucket, &url, &profile).await?;
            tracing::info!(url = %url, "deleted");
        }
        Command::Url { bucket, key } => {
            println!("{}", commands::url(&store, &bucket, &key, &profile)?);
        }
        Command::Encrypt { input, output, key } => {
            let cipher = commands::cipher(&store, key.as_deref())?;
            commands::encrypt(&cipher, input.as_deref(), output.as_deref())?;
        }
        Command::Decrypt { input, output, key } => {
            let cipher = commands::cipher(&store, key.as_deref())?;
            commands::decrypt(&cipher, input.as_deref(), output.as_deref())?;
        }
    }

    Ok(())
}
