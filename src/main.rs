use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use mail_sweep::config::SweepConfig;
use mail_sweep::mail::{GmailStore, MailStore};
use mail_sweep::pipeline::sweep::Sweep;
use mail_sweep::store::{FsStorage, StorageHierarchy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SweepConfig::from_env().context("Invalid configuration")?;

    // Initialize tracing: stderr plus a daily file next to the sweep data.
    let file_appender =
        tracing_appender::rolling::daily(config.data_dir.join("logs"), "mail-sweep.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(filter()),
        )
        .init();

    let token = std::env::var("GMAIL_ACCESS_TOKEN").unwrap_or_else(|_| {
        eprintln!("Error: GMAIL_ACCESS_TOKEN not set");
        eprintln!("  export GMAIL_ACCESS_TOKEN=ya29....");
        std::process::exit(1);
    });

    eprintln!("📬 Mail Sweep v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Data: {}", config.data_dir.display());
    eprintln!(
        "   Mode: {}",
        if config.trash_enabled {
            "move to trash"
        } else {
            "record only"
        }
    );
    eprintln!("   Keyword groups: {}", config.keyword_groups.len());

    let mail: Arc<dyn MailStore> = Arc::new(GmailStore::new(secrecy::SecretString::from(token)));
    let storage: Arc<dyn StorageHierarchy> = Arc::new(FsStorage::new(config.data_dir.clone()));

    let sweep = Sweep::new(mail, storage, config)?;
    let report = sweep.run().await.context("Sweep failed")?;

    for (rule, summary) in &report.queries {
        eprintln!(
            "   {rule}: {} processed, {} to bin, {} skipped, {} fallback",
            summary.processed, summary.deleted, summary.skipped, summary.fallbacks
        );
    }
    eprintln!("✅ Run {} completed ({})", report.run.id, report.run.log_name);
    Ok(())
}
