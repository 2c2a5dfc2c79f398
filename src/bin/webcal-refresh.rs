use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;

use webcal_fridge::cache::Cache;
use webcal_fridge::refresh::PurgePolicy;
use webcal_fridge::traits::SubscriptionBackend;
use webcal_fridge::{RefreshOutcome, Refresher, Subscription, WebcalResult};

#[derive(Parser)]
#[command(name = "webcal-refresh")]
#[command(about = "Refresh a webcal subscription stored in a local cache folder")]
struct Cli {
    /// The cache folder
    #[arg(long)]
    cache: PathBuf,

    /// The principal owning the subscription (e.g. "principals/users/alice")
    principal: String,

    /// The subscription uri, unique for this principal
    uri: String,

    /// Register the subscription with this feed URL if it does not exist yet
    #[arg(long)]
    subscribe: Option<String>,

    /// Refresh even if the subscription is not due yet
    #[arg(long)]
    force: bool,

    /// Purge the cache before reading the feed, rather than after
    #[arg(long)]
    eager: bool,
}

#[tokio::main]
async fn main() -> WebcalResult<()> {
    env_logger::init();
    let cli = Cli::parse();

    let cache = match Cache::from_folder(&cli.cache) {
        Ok(cache) => cache,
        Err(err) => {
            log::info!("Starting from an empty cache ({})", err);
            Cache::new(&cli.cache)
        },
    };
    let cache = Arc::new(cache);

    if let Some(source) = &cli.subscribe {
        let existing = cache.get_subscriptions_for_user(&cli.principal).await?;
        if existing.iter().any(|s| s.uri() == cli.uri) == false {
            cache.add_subscription(Subscription::new(&cli.principal, &cli.uri, source))?;
        }
    }

    let policy = if cli.eager { PurgePolicy::Eager } else { PurgePolicy::Deferred };
    let refresher = Refresher::new(Arc::clone(&cache)).with_purge_policy(policy);

    let now = Utc::now();
    let outcome = match cli.force {
        true => refresher.run(&cli.principal, &cli.uri).await,
        false => refresher.execute(&cli.principal, &cli.uri, now).await,
    };

    match &outcome {
        RefreshOutcome::Refreshed(report) => {
            println!("{} events cached, {} to-dos left out, {} without UID, {} rejected",
                report.stored, report.stripped, report.skipped, report.rejected.len());
            for (name, value) in report.committed.iter() {
                println!("  {} = {}", name, value);
            }
            let subs = cache.get_subscriptions_for_user(&cli.principal).await?;
            if let Some(sub) = subs.iter().find(|s| s.uri() == cli.uri) {
                cache.set_last_run(sub.id(), now)?;
            }
        },
        other => println!("{:?}", other),
    }

    cache.save_to_folder()
}
