use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};
use crate::ports::TwinSearch;
use crate::types::{FeedRef, InputRef, TwinRef};

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    #[default]
    Local,
    Global,
}

impl SearchScope {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchScope::Local => "LOCAL",
            SearchScope::Global => "GLOBAL",
        }
    }
}

/// A property the matched twins must carry. Exactly one of `uri_value` and
/// `literal_value` should be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscoveryQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyFilter>,
    #[serde(default)]
    pub scope: SearchScope,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A twin returned by a search, with the ids of its feeds and inputs in the
/// order the host reported them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredTwin {
    pub twin: TwinRef,
    #[serde(default)]
    pub feeds: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
}

/// Run `query` and follow the first feed of every matching twin.
///
/// Twins without feeds are skipped.
pub async fn discover_streams<S: TwinSearch + ?Sized>(
    search: &S,
    query: &DiscoveryQuery,
) -> Result<Vec<FeedRef>> {
    let twins = search.search(query).await?;
    let mut feeds = Vec::with_capacity(twins.len());
    for t in twins {
        match t.feeds.first() {
            Some(feed_id) => feeds.push(FeedRef {
                twin: t.twin,
                feed_id: feed_id.clone(),
            }),
            None => tracing::warn!(twin = %t.twin, "discovered twin has no feeds; skipping"),
        }
    }
    tracing::info!(count = feeds.len(), "discovered streams");
    Ok(feeds)
}

/// Run `query` and address the first input of the first matching twin that
/// has one.
pub async fn discover_input<S: TwinSearch + ?Sized>(
    search: &S,
    query: &DiscoveryQuery,
) -> Result<InputRef> {
    let twins = search.search(query).await?;
    twins
        .into_iter()
        .find_map(|t| {
            t.inputs.first().cloned().map(|input_id| InputRef {
                twin: t.twin,
                input_id,
            })
        })
        .ok_or_else(|| {
            SynthError::Discovery("no twin with an input matched the actuator query".into())
        })
}
