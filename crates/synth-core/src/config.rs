use crate::discovery::DiscoveryQuery;
use crate::error::{Result, SynthError};
use crate::types::{Envelope, FeedRef, InputRef, Predicate, StreamSpec};
use crate::worker::DecodePolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// AgentSection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_agent_name")]
    pub name: String,
    /// Sent as `Iotics-ClientAppId`; a random id is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_app_id: Option<String>,
}

fn default_agent_name() -> String {
    "synthesiser".to_string()
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            client_app_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// HostConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Base URL of the space, e.g. `https://demo.iotics.space`.
    pub url: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_token_env() -> String {
    "SYNTH_TOKEN".to_string()
}

fn default_request_timeout() -> u64 {
    3
}

/// Upper bound accepted for `host.request_timeout_secs`.
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 3600;

// ---------------------------------------------------------------------------
// SubscriptionConfig
// ---------------------------------------------------------------------------

/// A program whose stdout carries one feed message per line.
///
/// `{host_id}`, `{twin_id}` and `{feed_id}` in `args` are replaced with the
/// followed feed's identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl SubscriptionConfig {
    pub fn args_for(&self, feed: &FeedRef) -> Vec<String> {
        let host = feed.twin.host_id.as_deref().unwrap_or("");
        self.args
            .iter()
            .map(|a| {
                a.replace("{host_id}", host)
                    .replace("{twin_id}", &feed.twin.twin_id)
                    .replace("{feed_id}", &feed.feed_id)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ActuatorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Http,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorConfig {
    /// Fixed destination. Takes precedence over `search`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputRef>,
    /// Find the destination at startup: first match, first input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<DiscoveryQuery>,
    #[serde(default)]
    pub sink: SinkKind,
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub name: String,
    pub feed: FeedRef,
    pub label: String,
    pub when: Predicate,
    #[serde(default)]
    pub envelope: Envelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionConfig>,
}

impl StreamConfig {
    pub fn to_spec(&self) -> StreamSpec {
        StreamSpec {
            name: self.name.clone(),
            feed: self.feed.clone(),
            label: self.label.clone(),
            predicate: self.when,
            envelope: self.envelope,
        }
    }
}

/// Streams found by search at startup. Every discovered feed shares the same
/// label and predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDiscoveryConfig {
    pub query: DiscoveryQuery,
    pub label: String,
    pub when: Predicate,
    #[serde(default)]
    pub envelope: Envelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionConfig>,
}

impl StreamDiscoveryConfig {
    pub fn spec_for(&self, feed: FeedRef) -> StreamSpec {
        StreamSpec {
            name: feed.to_string(),
            feed,
            label: self.label.clone(),
            predicate: self.when,
            envelope: self.envelope,
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<HostConfig>,
    /// DID of the synthesiser twin that sends commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_twin: Option<String>,
    /// Default subscription program for streams without their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionConfig>,
    pub actuator: ActuatorConfig,
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<StreamDiscoveryConfig>,
    /// Fan-in channel capacity; raised to the stream count when smaller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,
    #[serde(default)]
    pub on_decode_error: DecodePolicy,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SynthError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    /// The subscription program for a statically configured stream, falling
    /// back to the top-level default.
    pub fn subscription_for<'a>(
        &'a self,
        stream: &'a StreamConfig,
    ) -> Option<&'a SubscriptionConfig> {
        stream.subscription.as_ref().or(self.subscription.as_ref())
    }

    /// The subscription program for discovered streams.
    pub fn discovery_subscription(&self) -> Option<&SubscriptionConfig> {
        self.discovery
            .as_ref()
            .and_then(|d| d.subscription.as_ref())
            .or(self.subscription.as_ref())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        // 1. Something to follow
        if self.streams.is_empty() && self.discovery.is_none() {
            error("no streams configured and no discovery query".to_string());
        }

        // 2. Per-stream checks
        let mut seen = HashSet::new();
        for stream in &self.streams {
            if !seen.insert(stream.name.as_str()) {
                error(format!("duplicate stream name '{}'", stream.name));
            }
            if stream.label.trim().is_empty() {
                error(format!("stream '{}' has an empty label", stream.name));
            }
            if let Some(msg) = predicate_problem(&stream.when) {
                error(format!("stream '{}': {msg}", stream.name));
            }
            if self.subscription_for(stream).is_none() {
                error(format!("stream '{}' has no subscription program", stream.name));
            }
        }

        if let Some(discovery) = &self.discovery {
            if discovery.label.trim().is_empty() {
                error("discovery has an empty label".to_string());
            }
            if let Some(msg) = predicate_problem(&discovery.when) {
                error(format!("discovery: {msg}"));
            }
            if self.discovery_subscription().is_none() {
                error("discovered streams have no subscription program".to_string());
            }
        }

        // 3. Channel must hold one value per stream
        if let Some(cap) = self.channel_capacity {
            if cap < self.streams.len() {
                error(format!(
                    "channel_capacity {cap} is smaller than the number of streams ({})",
                    self.streams.len()
                ));
            }
        }

        // 4. Actuator destination and sink
        if self.actuator.input.is_none() && self.actuator.search.is_none() {
            error("actuator needs either 'input' or 'search'".to_string());
        }
        if self.actuator.sink == SinkKind::Http {
            if self.host.is_none() {
                error("http sink requires 'host'".to_string());
            }
            if self.follower_twin.is_none() {
                error("http sink requires 'follower_twin'".to_string());
            }
        }

        // 5. Searches need a host
        let searches = self.discovery.is_some()
            || (self.actuator.input.is_none() && self.actuator.search.is_some());
        if searches && self.host.is_none() {
            error("discovery requires 'host'".to_string());
        }

        // 6. Request timeout
        if let Some(host) = &self.host {
            let secs = host.request_timeout_secs;
            if secs == 0 || secs > MAX_REQUEST_TIMEOUT_SECS {
                error(format!(
                    "request_timeout_secs {secs} is outside 1..={MAX_REQUEST_TIMEOUT_SECS}"
                ));
            }
        }

        if self.actuator.input.is_some() && self.actuator.search.is_some() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "actuator has both 'input' and 'search'; 'input' is used".to_string(),
            });
        }

        if self.version != 1 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("unknown config version {}", self.version),
            });
        }

        warnings
    }
}

fn predicate_problem(p: &Predicate) -> Option<String> {
    match p {
        Predicate::Compare { threshold, .. } if !threshold.is_finite() => {
            Some(format!("threshold {threshold} is not finite"))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SearchScope;
    use crate::types::Comparison;
    use tempfile::TempDir;

    const THERMOSTAT: &str = r#"
agent:
  name: thermostat
host:
  url: https://demo.example.space
follower_twin: did:iotics:thermostat
subscription:
  program: feed-follow
  args: ["--host", "{host_id}", "{twin_id}", "{feed_id}"]
actuator:
  input:
    host_id: host-b
    twin_id: did:iotics:radiator
    input_id: turn_on
streams:
  - name: kitchen
    feed: { host_id: host-a, twin_id: did:iotics:kitchen, feed_id: temperature }
    label: sensor_reading
    when: { op: le, threshold: 15 }
  - name: hall
    feed: { twin_id: did:iotics:hall, feed_id: temperature }
    label: sensor_reading
    when: { op: le, threshold: 15 }
    envelope: feed_data
"#;

    fn errors(cfg: &Config) -> Vec<String> {
        cfg.validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect()
    }

    #[test]
    fn parses_full_config_with_defaults() {
        let cfg = Config::from_yaml(THERMOSTAT).unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.agent.name, "thermostat");
        let host = cfg.host.as_ref().unwrap();
        assert_eq!(host.token_env, "SYNTH_TOKEN");
        assert_eq!(host.request_timeout_secs, 3);
        assert_eq!(cfg.actuator.sink, SinkKind::Http);
        assert_eq!(cfg.on_decode_error, DecodePolicy::Terminate);
        assert_eq!(cfg.streams.len(), 2);
        assert_eq!(cfg.streams[1].envelope, Envelope::FeedData);
        assert_eq!(cfg.streams[1].feed.twin.host_id, None);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn stream_to_spec_carries_predicate() {
        let cfg = Config::from_yaml(THERMOSTAT).unwrap();
        let spec = cfg.streams[0].to_spec();
        assert_eq!(spec.name, "kitchen");
        assert_eq!(
            spec.predicate,
            Predicate::Compare {
                op: Comparison::Le,
                threshold: 15.0
            }
        );
    }

    #[test]
    fn subscription_args_are_templated() {
        let cfg = Config::from_yaml(THERMOSTAT).unwrap();
        let sub = cfg.subscription_for(&cfg.streams[0]).unwrap();
        assert_eq!(
            sub.args_for(&cfg.streams[0].feed),
            vec!["--host", "host-a", "did:iotics:kitchen", "temperature"]
        );
        // Local twin: empty host placeholder
        assert_eq!(sub.args_for(&cfg.streams[1].feed)[1], "");
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("synth.yaml")).unwrap_err();
        assert!(matches!(err, SynthError::ConfigNotFound(_)));
    }

    #[test]
    fn load_reads_yaml_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("synth.yaml");
        std::fs::write(&path, THERMOSTAT).unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.streams[0].name, "kitchen");
    }

    #[test]
    fn empty_stream_set_is_an_error() {
        let mut cfg = Config::from_yaml(THERMOSTAT).unwrap();
        cfg.streams.clear();
        assert!(errors(&cfg).iter().any(|m| m.contains("no streams")));
    }

    #[test]
    fn duplicate_names_are_an_error() {
        let mut cfg = Config::from_yaml(THERMOSTAT).unwrap();
        cfg.streams[1].name = "kitchen".into();
        assert!(errors(&cfg).iter().any(|m| m.contains("duplicate stream name")));
    }

    #[test]
    fn small_channel_is_an_error() {
        let mut cfg = Config::from_yaml(THERMOSTAT).unwrap();
        cfg.channel_capacity = Some(1);
        assert!(errors(&cfg).iter().any(|m| m.contains("channel_capacity")));
    }

    #[test]
    fn nan_threshold_is_an_error() {
        let mut cfg = Config::from_yaml(THERMOSTAT).unwrap();
        cfg.streams[0].when = Predicate::Compare {
            op: Comparison::Lt,
            threshold: f64::NAN,
        };
        assert!(errors(&cfg).iter().any(|m| m.contains("not finite")));
    }

    #[test]
    fn http_sink_needs_host_and_follower() {
        let mut cfg = Config::from_yaml(THERMOSTAT).unwrap();
        cfg.host = None;
        cfg.follower_twin = None;
        let errs = errors(&cfg);
        assert!(errs.iter().any(|m| m.contains("requires 'host'")));
        assert!(errs.iter().any(|m| m.contains("requires 'follower_twin'")));
    }

    #[test]
    fn log_sink_needs_no_host() {
        let mut cfg = Config::from_yaml(THERMOSTAT).unwrap();
        cfg.host = None;
        cfg.follower_twin = None;
        cfg.actuator.sink = SinkKind::Log;
        assert!(errors(&cfg).is_empty());
    }

    #[test]
    fn missing_subscription_is_an_error() {
        let mut cfg = Config::from_yaml(THERMOSTAT).unwrap();
        cfg.subscription = None;
        assert_eq!(
            errors(&cfg)
                .iter()
                .filter(|m| m.contains("no subscription program"))
                .count(),
            2
        );
    }

    #[test]
    fn discovery_only_config_is_valid() {
        let yaml = r#"
host: { url: https://demo.example.space }
follower_twin: did:iotics:thermostat
actuator:
  search:
    text: LP
    properties:
      - key: http://www.w3.org/1999/02/22-rdf-syntax-ns#type
        uri_value: https://www.wikidata.org/wiki/Q1572702
discovery:
  query:
    text: LP
    scope: global
  label: sensor_reading
  when: { op: le, threshold: 15 }
  envelope: feed_data
  subscription: { program: feed-follow, args: ["{twin_id}"] }
on_decode_error: skip
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert!(cfg.validate().is_empty());
        assert_eq!(cfg.on_decode_error, DecodePolicy::Skip);
        let d = cfg.discovery.as_ref().unwrap();
        assert_eq!(d.query.scope, SearchScope::Global);
        let feed = FeedRef {
            twin: crate::types::TwinRef::remote("h", "did:t"),
            feed_id: "temperature".into(),
        };
        assert_eq!(d.spec_for(feed).name, "h/did:t#temperature");
    }

    #[test]
    fn request_timeout_must_be_in_range() {
        let mut cfg = Config::from_yaml(THERMOSTAT).unwrap();
        for secs in [0, MAX_REQUEST_TIMEOUT_SECS + 1, u64::MAX] {
            cfg.host.as_mut().unwrap().request_timeout_secs = secs;
            assert!(
                errors(&cfg).iter().any(|m| m.contains("request_timeout_secs")),
                "{secs} accepted"
            );
        }
        cfg.host.as_mut().unwrap().request_timeout_secs = MAX_REQUEST_TIMEOUT_SECS;
        assert!(errors(&cfg).is_empty());
    }

    #[test]
    fn input_and_search_together_warns() {
        let mut cfg = Config::from_yaml(THERMOSTAT).unwrap();
        cfg.actuator.search = Some(DiscoveryQuery::default());
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
    }
}
