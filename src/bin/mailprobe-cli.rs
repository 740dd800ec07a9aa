use std::sync::Arc;

use anyhow::{Context, Result};
use mailprobe_lib::{
    DnsResolver, FileSink, RunSummary, SenderPool, Verifier, load_addresses, load_sender_domains,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[path = "mailprobe-cli/args.rs"]
mod args;

use args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap sees its variables
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "mailprobe_lib=debug,mailprobe_cli=debug"
    } else {
        "mailprobe_lib=info,mailprobe_cli=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = cli.probe_config()?;
    let domains = load_sender_domains(&cli.sender_domains).context("load sender domains")?;
    let addresses = load_addresses(&cli.emails).context("load addresses")?;
    let sink = FileSink::create(&cli.out_dir)
        .await
        .context("create output directory")?;

    let resolver = match DnsResolver::from_system_conf() {
        Ok(resolver) => resolver,
        Err(err) => {
            warn!("{err}; falling back to default upstream resolvers");
            DnsResolver::with_defaults()
        }
    };

    info!(
        "probing {} address(es), {} at a time, results in {}",
        addresses.len(),
        config.concurrency,
        sink.dir().display()
    );
    let verifier = Arc::new(Verifier::new(
        config,
        resolver,
        sink,
        SenderPool::new(domains),
    ));
    let summary = Arc::clone(&verifier).run_all(addresses).await;
    verifier.sink().flush().await.context("flush result files")?;

    print_summary(&summary, &cli)?;
    Ok(())
}

#[cfg_attr(not(feature = "with-serde"), allow(unused_variables))]
fn print_summary(summary: &RunSummary, cli: &Cli) -> Result<()> {
    #[cfg(feature = "with-serde")]
    if cli.summary_json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    let counts = summary
        .by_outcome
        .iter()
        .map(|(label, count)| format!("{label}={count}"))
        .collect::<Vec<_>>()
        .join(", ");
    info!("done: {} address(es) [{counts}]", summary.total);
    if summary.aborted > 0 {
        warn!("{} probe task(s) aborted", summary.aborted);
    }
    Ok(())
}
