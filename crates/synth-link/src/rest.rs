use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use synth_core::InputRef;

use crate::error::LinkError;

const CLIENT_APP_ID: &str = "Iotics-ClientAppId";

/// Authenticated REST access to one host.
///
/// Every request carries the JSON accept/content headers, the client app id
/// and the bearer token. Token issuance and refresh happen elsewhere.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl RestClient {
    pub fn new(
        base_url: &str,
        token: &str,
        client_app_id: &str,
        request_timeout: Duration,
    ) -> Result<Self, LinkError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CLIENT_APP_ID, header_value(client_app_id)?);
        let mut auth = header_value(&format!("Bearer {token}"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub(crate) fn search_url(&self) -> String {
        format!("{}/qapi/searches", self.base_url)
    }

    /// URL for delivering an input message from `sender` to `destination`.
    ///
    /// Remote receivers are addressed through their host id; local ones
    /// without it.
    pub(crate) fn input_message_url(&self, sender: &str, destination: &InputRef) -> String {
        match &destination.twin.host_id {
            Some(host) => format!(
                "{}/qapi/twins/{sender}/interests/hosts/{host}/twins/{}/inputs/{}/messages",
                self.base_url, destination.twin.twin_id, destination.input_id
            ),
            None => format!(
                "{}/qapi/twins/{sender}/interests/twins/{}/inputs/{}/messages",
                self.base_url, destination.twin.twin_id, destination.input_id
            ),
        }
    }
}

fn header_value(v: &str) -> Result<HeaderValue, LinkError> {
    Ok(HeaderValue::from_str(v)?)
}

/// Turn a non-2xx response into [`LinkError::Status`] with its body.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, LinkError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(LinkError::Status {
        status: status.as_u16(),
        body,
    })
}
