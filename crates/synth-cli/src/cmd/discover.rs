use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use synth_core::{FeedRef, InputRef};

use crate::output::{print_json, print_table};
use crate::setup;

#[derive(Serialize)]
struct Discovered {
    streams: Vec<FeedRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actuator: Option<InputRef>,
}

pub fn run(config_path: &Path, json: bool) -> Result<()> {
    let config = setup::load_config(config_path)?;
    if !setup::needs_search(&config) {
        if json {
            print_json(&Discovered {
                streams: Vec::new(),
                actuator: None,
            })?;
        } else {
            println!("Nothing to discover: no stream discovery or actuator search configured.");
        }
        return Ok(());
    }

    let client = setup::rest_client(&config)?;
    let rt = tokio::runtime::Runtime::new()?;
    let found = rt.block_on(async {
        let streams = setup::discover_feeds(&config, Some(&client)).await?;
        let actuator = match (&config.actuator.input, &config.actuator.search) {
            (None, Some(_)) => Some(setup::resolve_destination(&config, Some(&client)).await?),
            _ => None,
        };
        anyhow::Ok(Discovered { streams, actuator })
    })?;

    if json {
        return print_json(&found);
    }

    let mut rows: Vec<Vec<String>> = found
        .streams
        .iter()
        .map(|f| {
            vec![
                "stream".to_string(),
                f.twin.host_id.clone().unwrap_or_else(|| "-".into()),
                f.twin.twin_id.clone(),
                f.feed_id.clone(),
            ]
        })
        .collect();
    if let Some(input) = &found.actuator {
        rows.push(vec![
            "actuator".to_string(),
            input.twin.host_id.clone().unwrap_or_else(|| "-".into()),
            input.twin.twin_id.clone(),
            input.input_id.clone(),
        ]);
    }

    if rows.is_empty() {
        println!("No twins matched.");
    } else {
        print_table(&["ROLE", "HOST", "TWIN", "ID"], rows);
    }
    Ok(())
}
