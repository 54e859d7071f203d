use bind_host::{binds, config::Config};
use log::*;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => Config::from_file(Path::new(&path))?,
        None => Config::default(),
    };

    // `RUST_LOG` overrides the configured level.
    pretty_env_logger::formatted_builder()
        .filter_level(config.loglevel)
        .parse_default_env()
        .init();

    config.warn_when_unreasonable();

    info!(
        "Opening {} binds, {} requests each over {} workers",
        config.binds.len(),
        config.requests_per_bind,
        config.workers_per_bind
    );

    let summary = binds::run(&config).await?;

    for report in &summary.reports {
        if report.is_clean() {
            info!("{report}");
        } else {
            warn!("{report}");
        }
    }

    for (tag, count) in &summary.receipts {
        debug!("{tag}: {count} receipts");
    }

    anyhow::ensure!(
        summary.is_clean(),
        "{} responses could not be routed, not every request was answered exactly once",
        summary.misrouted
    );

    Ok(())
}
