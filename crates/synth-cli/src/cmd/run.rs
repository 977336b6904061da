use std::path::Path;

use anyhow::{bail, Context, Result};
use synth_core::config::{Config, SinkKind};
use synth_core::{run_agent, ActuatorDriver, AgentOptions, CommandSink, FollowedStream, LoopExit};
use synth_link::{FeedSource, LogSink, RestCommandSink};
use tokio_util::sync::CancellationToken;

use crate::output::print_json;
use crate::setup;

pub fn run(config_path: &Path, dry_run: bool, json: bool) -> Result<()> {
    let config = setup::load_config(config_path)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_agent_from_config(config, dry_run, json))
}

async fn run_agent_from_config(config: Config, dry_run: bool, json: bool) -> Result<()> {
    let log_sink = dry_run || config.actuator.sink == SinkKind::Log;

    let client = if !log_sink || setup::needs_search(&config) {
        Some(setup::rest_client(&config)?)
    } else {
        None
    };

    let destination = setup::resolve_destination(&config, client.as_ref()).await?;
    let streams = setup::resolve_streams(&config, client.as_ref()).await?;
    if streams.is_empty() {
        bail!("no streams to follow: discovery matched no twins with feeds");
    }

    let sink: Box<dyn CommandSink> = if log_sink {
        Box::new(LogSink)
    } else {
        let client = client.context("http sink requires 'host'")?;
        let sender = config
            .follower_twin
            .clone()
            .context("http sink requires 'follower_twin'")?;
        Box::new(RestCommandSink::new(client, sender))
    };

    let followed: Vec<FollowedStream> = streams
        .into_iter()
        .map(|(spec, sub)| {
            let args = sub.args_for(&spec.feed);
            tracing::info!(
                stream = %spec.name,
                feed = %spec.feed,
                program = %sub.program,
                "following"
            );
            let source = FeedSource::spawn(sub.program, args, spec.envelope);
            FollowedStream {
                spec,
                source: Box::pin(source),
            }
        })
        .collect();

    tracing::info!(
        agent = %config.agent.name,
        streams = followed.len(),
        actuator = %destination,
        dry_run = log_sink,
        "synthesiser starting"
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            on_signal.cancel();
        }
    });

    let options = AgentOptions {
        channel_capacity: config.channel_capacity,
        decode_policy: config.on_decode_error,
    };
    let driver = ActuatorDriver::new(sink, destination);
    let summary = run_agent(followed, driver, options, cancel).await?;

    if json {
        print_json(&summary)?;
    }

    match summary.exit {
        LoopExit::Cancelled => Ok(()),
        LoopExit::AllStreamsEnded | LoopExit::ChannelClosed => {
            bail!("all streams ended after {} cycles", summary.cycles)
        }
    }
}
