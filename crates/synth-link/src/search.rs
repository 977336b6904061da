use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use synth_core::{DiscoveredTwin, DiscoveryQuery, TwinRef, TwinSearch};

use crate::error::LinkError;
use crate::rest::{check_status, RestClient};

const REQUEST_TIMEOUT_HEADER: &str = "Iotics-RequestTimeout";

/// Extra time the HTTP client waits beyond the host-side search deadline.
const CLIENT_GRACE: Duration = Duration::from_secs(2);

/// Twin search over the host's REST API.
///
/// The host streams one JSON object per line until its request deadline
/// passes; twins from every line are collected in order.
pub struct RestSearch {
    client: RestClient,
}

impl RestSearch {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    async fn run(&self, query: &DiscoveryQuery) -> Result<Vec<DiscoveredTwin>, LinkError> {
        let timeout = self.client.request_timeout();
        let deadline = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| chrono::Utc::now().checked_add_signed(d))
            .unwrap_or_else(chrono::Utc::now);

        let resp = self
            .client
            .http()
            .post(self.client.search_url())
            .query(&[("scope", query.scope.as_str())])
            .header(REQUEST_TIMEOUT_HEADER, deadline.to_rfc3339())
            .timeout(timeout.saturating_add(CLIENT_GRACE))
            .json(&search_body(query))
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;

        let twins = parse_search_response(&body)?;
        tracing::debug!(count = twins.len(), scope = query.scope.as_str(), "search complete");
        Ok(twins)
    }
}

#[async_trait]
impl TwinSearch for RestSearch {
    async fn search(&self, query: &DiscoveryQuery) -> synth_core::Result<Vec<DiscoveredTwin>> {
        Ok(self.run(query).await?)
    }
}

// ─── Wire format ──────────────────────────────────────────────────────────

fn search_body(query: &DiscoveryQuery) -> Value {
    let properties: Vec<Value> = query
        .properties
        .iter()
        .map(|p| match (&p.uri_value, &p.literal_value) {
            (Some(uri), _) => json!({ "key": p.key, "uriValue": { "value": uri } }),
            (None, Some(lit)) => json!({ "key": p.key, "stringLiteralValue": { "value": lit } }),
            (None, None) => json!({ "key": p.key }),
        })
        .collect();

    let mut filter = json!({ "properties": properties });
    if let Some(text) = &query.text {
        filter["text"] = json!(text);
    }
    json!({ "responseType": "FULL", "filter": filter })
}

#[derive(Deserialize)]
struct SearchLine {
    #[serde(default)]
    result: Option<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    payload: Option<SearchPayload>,
}

#[derive(Deserialize)]
struct SearchPayload {
    #[serde(default)]
    twins: Vec<TwinRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TwinRecord {
    twin_id: TwinIdRecord,
    #[serde(default)]
    feeds: Vec<FeedRecord>,
    #[serde(default)]
    inputs: Vec<InputRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TwinIdRecord {
    id: String,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedRecord {
    feed_id: IdRecord,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputRecord {
    input_id: IdRecord,
}

#[derive(Deserialize)]
struct IdRecord {
    id: String,
}

impl From<TwinRecord> for DiscoveredTwin {
    fn from(r: TwinRecord) -> Self {
        let host_id = r.twin_id.host_id.filter(|h| !h.is_empty());
        DiscoveredTwin {
            twin: TwinRef {
                host_id,
                twin_id: r.twin_id.id,
            },
            feeds: r.feeds.into_iter().map(|f| f.feed_id.id).collect(),
            inputs: r.inputs.into_iter().map(|i| i.input_id.id).collect(),
        }
    }
}

/// Parse a newline-delimited search response. Lines without twins
/// (keep-alives, errors from individual hosts) contribute nothing.
fn parse_search_response(body: &str) -> Result<Vec<DiscoveredTwin>, LinkError> {
    let mut twins = Vec::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parsed: SearchLine = serde_json::from_str(line).map_err(|source| LinkError::Parse {
            line: line.to_string(),
            source,
        })?;
        if let Some(payload) = parsed.result.and_then(|r| r.payload) {
            twins.extend(payload.twins.into_iter().map(DiscoveredTwin::from));
        }
    }
    Ok(twins)
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::{PropertyFilter, SearchScope, SynthError};

    const TEMPERATURE_LINE: &str = r#"{"result":{"payload":{"twins":[{"twinId":{"id":"did:t1","hostId":"host-a"},"feeds":[{"feedId":{"id":"temperature"}}],"inputs":[]}]}}}"#;
    const RADIATOR_LINE: &str = r#"{"result":{"payload":{"twins":[{"twinId":{"id":"did:r1","hostId":"host-b"},"inputs":[{"inputId":{"id":"switch"}}]}]}}}"#;

    fn query() -> DiscoveryQuery {
        DiscoveryQuery {
            text: Some("LP".into()),
            properties: vec![
                PropertyFilter {
                    key: "https://data.iotics.com/app#defines".into(),
                    uri_value: Some("https://saref.etsi.org/core/TemperatureSensor".into()),
                    literal_value: None,
                },
                PropertyFilter {
                    key: "http://www.w3.org/2000/01/rdf-schema#label".into(),
                    uri_value: None,
                    literal_value: Some("Radiator".into()),
                },
            ],
            scope: SearchScope::Global,
        }
    }

    #[test]
    fn body_uses_uri_and_literal_value_shapes() {
        let body = search_body(&query());
        assert_eq!(body["responseType"], "FULL");
        assert_eq!(body["filter"]["text"], "LP");
        let props = body["filter"]["properties"].as_array().unwrap();
        assert_eq!(
            props[0]["uriValue"]["value"],
            "https://saref.etsi.org/core/TemperatureSensor"
        );
        assert_eq!(props[1]["stringLiteralValue"]["value"], "Radiator");
    }

    #[test]
    fn body_without_text_omits_it() {
        let body = search_body(&DiscoveryQuery::default());
        assert!(body["filter"].get("text").is_none());
    }

    #[test]
    fn response_lines_are_merged_and_empty_ones_skipped() {
        let body = format!("{TEMPERATURE_LINE}\n\n{{\"result\":{{}}}}\n{RADIATOR_LINE}\n");
        let twins = parse_search_response(&body).unwrap();
        assert_eq!(twins.len(), 2);
        assert_eq!(twins[0].twin, TwinRef::remote("host-a", "did:t1"));
        assert_eq!(twins[0].feeds, vec!["temperature".to_string()]);
        assert_eq!(twins[1].inputs, vec!["switch".to_string()]);
        assert!(twins[1].feeds.is_empty());
    }

    #[test]
    fn malformed_line_is_a_parse_error() {
        let err = parse_search_response("{not json").unwrap_err();
        assert!(matches!(err, LinkError::Parse { .. }));
    }

    #[tokio::test]
    async fn search_posts_query_with_scope_and_deadline() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/qapi/searches")
            .match_query(mockito::Matcher::UrlEncoded(
                "scope".into(),
                "GLOBAL".into(),
            ))
            .match_header("iotics-requesttimeout", mockito::Matcher::Any)
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(format!("{TEMPERATURE_LINE}\n{RADIATOR_LINE}\n"))
            .create_async()
            .await;

        let client =
            RestClient::new(&server.url(), "tok", "thermostat", Duration::from_secs(1)).unwrap();
        let twins = RestSearch::new(client).search(&query()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(twins.len(), 2);
    }

    #[tokio::test]
    async fn huge_request_timeout_does_not_overflow() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/qapi/searches")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(format!("{TEMPERATURE_LINE}\n"))
            .create_async()
            .await;

        let client =
            RestClient::new(&server.url(), "tok", "thermostat", Duration::from_secs(u64::MAX))
                .unwrap();
        let twins = RestSearch::new(client)
            .search(&DiscoveryQuery::default())
            .await
            .unwrap();
        assert_eq!(twins.len(), 1);
    }

    #[tokio::test]
    async fn failed_search_is_a_discovery_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/qapi/searches")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body("token expired")
            .create_async()
            .await;

        let client =
            RestClient::new(&server.url(), "tok", "thermostat", Duration::from_secs(1)).unwrap();
        let err = RestSearch::new(client)
            .search(&DiscoveryQuery::default())
            .await
            .unwrap_err();
        match err {
            SynthError::Discovery(msg) => assert!(msg.contains("401")),
            other => panic!("expected Discovery, got {other:?}"),
        }
    }
}
