//! tablekv Inspection Tool
//!
//! Opens one partition table through the backend contract and runs a single
//! operator command against it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tablekv::{Backend, BackendConfig, BucketListing, BucketSelector, Capability, TableBackend};
use tracing_subscriber::{fmt, EnvFilter};

/// tablekv inspection tool
#[derive(Parser, Debug)]
#[command(name = "tablekv-inspect")]
#[command(about = "Inspect and maintain tablekv partition tables")]
#[command(version)]
struct Args {
    /// Root directory holding partition tables
    #[arg(short, long)]
    root: PathBuf,

    /// Partition number
    #[arg(short, long)]
    partition: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show path, key count and recovery stats
    Stats,

    /// List keys, optionally of one bucket
    List {
        /// Only list this bucket
        #[arg(short, long)]
        bucket: Option<String>,
    },

    /// Get a value
    Get { bucket: String, key: String },

    /// Store a value
    Put {
        bucket: String,
        key: String,
        value: String,
    },

    /// Delete a key
    Delete { bucket: String, key: String },

    /// Count keys per bucket
    Buckets,

    /// Rewrite the table without dead records
    Compact,

    /// Print the capability table
    Capabilities,

    /// Delete the partition table
    Drop,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tablekv=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    if let Commands::Capabilities = args.command {
        for cap in Capability::ALL {
            println!("{:<40} {}", cap.name(), TableBackend::global_capability(cap.name()));
        }
        return;
    }

    let config = BackendConfig::builder().root(&args.root).build();
    let backend = match TableBackend::start(args.partition, &config) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!("Failed to start backend: {}", e);
            std::process::exit(1);
        }
    };

    let dropped = matches!(args.command, Commands::Drop);
    if let Err(e) = run(&backend, args.command) {
        tracing::error!("Command failed: {}", e);
        std::process::exit(1);
    }

    if !dropped {
        if let Err(e) = backend.stop() {
            tracing::error!("Failed to stop backend: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(backend: &TableBackend, command: Commands) -> tablekv::Result<()> {
    match command {
        Commands::Stats => {
            let report = backend.table().recovery_report();
            println!("path:             {}", backend.path().display());
            println!("keys:             {}", backend.key_count()?);
            println!("records replayed: {}", report.records_replayed);
            println!("bytes truncated:  {}", report.bytes_truncated);
        }
        Commands::List { bucket } => {
            let selector = match bucket {
                Some(bucket) => BucketSelector::bucket(bucket),
                None => BucketSelector::All,
            };
            match backend.list_bucket(&selector)? {
                BucketListing::Keys(keys) => {
                    for key in keys {
                        println!("{}", String::from_utf8_lossy(&key));
                    }
                }
                BucketListing::Entries(entries) => {
                    for entry in entries {
                        println!(
                            "{}/{}",
                            String::from_utf8_lossy(&entry.bucket),
                            String::from_utf8_lossy(&entry.key)
                        );
                    }
                }
            }
        }
        Commands::Get { bucket, key } => match backend.get(bucket.as_bytes(), key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(not found)"),
        },
        Commands::Put { bucket, key, value } => {
            backend.put(bucket.as_bytes(), key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Delete { bucket, key } => {
            backend.delete(bucket.as_bytes(), key.as_bytes())?;
            println!("OK");
        }
        Commands::Buckets => {
            let counts = backend.fold(
                BTreeMap::<Vec<u8>, u64>::new(),
                |bucket, _key, _value, mut counts| {
                    *counts.entry(bucket.to_vec()).or_insert(0) += 1;
                    counts
                },
            )?;
            for (bucket, count) in counts {
                println!("{:<32} {}", String::from_utf8_lossy(&bucket), count);
            }
        }
        Commands::Compact => {
            let report = backend.compact()?;
            println!(
                "kept {} records, {} -> {} bytes",
                report.records_kept, report.bytes_before, report.bytes_after
            );
        }
        Commands::Drop => {
            backend.drop_storage()?;
            println!("dropped {}", backend.path().display());
        }
        Commands::Capabilities => {}
    }
    Ok(())
}
