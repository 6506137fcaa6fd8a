use crate::tennis_logic::config::Config;
use lib_common::ingestors::{HttpFeedSource, TennisPollingPlugin};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builds the poll loop against the configured HTTP feed.
pub fn build_plugin(config: &Config) -> anyhow::Result<Arc<TennisPollingPlugin>> {
    let pipeline = config.pipeline();
    let source = HttpFeedSource::from_config(&pipeline)?;
    log::info!(
        "Polling {} every {}s (fallbacks: {:?})",
        pipeline.primary_url,
        pipeline.cycle_target_secs,
        pipeline.fallback_urls
    );
    Ok(Arc::new(TennisPollingPlugin::new(pipeline, Arc::new(source))))
}

pub async fn run(plugin: Arc<TennisPollingPlugin>, shutdown: CancellationToken) {
    plugin.run(shutdown).await;
    log::info!("Upstream poller exited.");
}
