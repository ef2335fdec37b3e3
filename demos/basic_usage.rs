//! Basic usage of the cloudstore helpers
//!
//! This demo:
//! - Uploads a CSV and prints its public URL
//! - Downloads it back by URL
//! - Deletes it
//!
//! Point it at any S3-compatible store (MinIO works) with:
//! CLOUDSTORE_HOST=127.0.0.1:9000 CLOUDSTORE_ACCESS_KEY=... CLOUDSTORE_SECRET_KEY=...
//! cargo run --example basic_usage

use cloudstore_client::{CloudStore, ConnectionConfig, StoreSettings, DEFAULT_CONNECTION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let host = std::env::var("CLOUDSTORE_HOST").unwrap_or_else(|_| "127.0.0.1:9000".to_string());
    let (host, port) = match host.split_once(':') {
        Some((h, p)) => (h.to_string(), Some(p.parse::<u16>()?)),
        None => (host, None),
    };
    let bucket = std::env::var("CLOUDSTORE_BUCKET").unwrap_or_else(|_| "demo".to_string());

    let mut connection = ConnectionConfig::new(host).insecure();
    if let Some(port) = port {
        connection = connection.with_port(port);
    }
    if let (Ok(access), Ok(secret)) = (
        std::env::var("CLOUDSTORE_ACCESS_KEY"),
        std::env::var("CLOUDSTORE_SECRET_KEY"),
    ) {
        connection = connection.with_credentials(access, secret);
    }

    let store = CloudStore::new(StoreSettings::default().with_connection(DEFAULT_CONNECTION, connection));

    println!("Uploading results.csv to {}...", bucket);
    let url = store
        .upload_from_string(&bucket, "task,answer\n1,yes\n2,no\n", "results.csv", "exports", DEFAULT_CONNECTION, false)
        .await?;
    println!("   uploaded: {}", url);

    println!("\nDownloading by URL...");
    let content = store.download(&bucket, &url, DEFAULT_CONNECTION, false).await?;
    println!("{}", String::from_utf8_lossy(&content));

    println!("Deleting...");
    if store.delete(&bucket, &url, DEFAULT_CONNECTION).await {
        println!("   deleted");
    } else {
        println!("   delete failed, see log");
    }

    Ok(())
}
