//! Startup wiring shared by `run` and `discover`: config loading, the REST
//! client, and resolution of searched-for twins.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use synth_core::config::{Config, SubscriptionConfig, WarnLevel};
use synth_core::{discover_input, discover_streams, FeedRef, InputRef, StreamSpec};
use synth_link::{RestClient, RestSearch};

/// Load the config and refuse to continue if validation reports errors.
/// Warnings are logged.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path).context("failed to load config")?;
    let mut errors = Vec::new();
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => errors.push(w.message),
        }
    }
    if !errors.is_empty() {
        bail!("invalid config: {}", errors.join("; "));
    }
    Ok(config)
}

/// Build the authenticated client. The token is read from the environment
/// variable named by `host.token_env`.
pub fn rest_client(config: &Config) -> Result<RestClient> {
    let host = config.host.as_ref().context("config has no 'host'")?;
    let token = std::env::var(&host.token_env)
        .with_context(|| format!("environment variable {} is not set", host.token_env))?;
    let client_app_id = config
        .agent
        .client_app_id
        .clone()
        .unwrap_or_else(|| format!("{}_{}", config.agent.name, uuid::Uuid::new_v4().simple()));

    RestClient::new(
        &host.url,
        &token,
        &client_app_id,
        Duration::from_secs(host.request_timeout_secs),
    )
    .context("failed to build REST client")
}

/// Whether startup has to search the host for anything.
pub fn needs_search(config: &Config) -> bool {
    config.discovery.is_some()
        || (config.actuator.input.is_none() && config.actuator.search.is_some())
}

/// The actuator input: fixed in config, or the first input of the first
/// twin matching the actuator search.
pub async fn resolve_destination(config: &Config, client: Option<&RestClient>) -> Result<InputRef> {
    if let Some(input) = &config.actuator.input {
        return Ok(input.clone());
    }
    let query = config
        .actuator
        .search
        .as_ref()
        .context("actuator has neither 'input' nor 'search'")?;
    let client = client.context("actuator search requires 'host'")?;
    let input = discover_input(&RestSearch::new(client.clone()), query)
        .await
        .context("actuator discovery failed")?;
    Ok(input)
}

/// Every stream to follow, paired with the subscription program serving it.
/// Static streams come first, then discovered ones in search order.
pub async fn resolve_streams(
    config: &Config,
    client: Option<&RestClient>,
) -> Result<Vec<(StreamSpec, SubscriptionConfig)>> {
    let mut streams = Vec::new();
    for stream in &config.streams {
        let sub = config
            .subscription_for(stream)
            .with_context(|| format!("stream '{}' has no subscription program", stream.name))?;
        streams.push((stream.to_spec(), sub.clone()));
    }

    if let Some(discovery) = &config.discovery {
        let sub = config
            .discovery_subscription()
            .context("discovered streams have no subscription program")?;
        for feed in discover_feeds(config, client).await? {
            streams.push((discovery.spec_for(feed), sub.clone()));
        }
    }

    Ok(streams)
}

/// Feeds matched by the stream discovery query; empty without one.
pub async fn discover_feeds(config: &Config, client: Option<&RestClient>) -> Result<Vec<FeedRef>> {
    let Some(discovery) = &config.discovery else {
        return Ok(Vec::new());
    };
    let client = client.context("stream discovery requires 'host'")?;
    let feeds = discover_streams(&RestSearch::new(client.clone()), &discovery.query)
        .await
        .context("stream discovery failed")?;
    Ok(feeds)
}
