//! Player API over HTTP using reqwest.

use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    PlayerApi,
};
use core_model::{CommandAck, StatusResponse};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

/// HTTP implementation of [`PlayerApi`].
///
/// The server speaks form-encoded bodies on most mutation endpoints and
/// JSON on `/pitch`; responses are JSON throughout. Connection pooling
/// comes from the shared reqwest client.
pub struct HttpPlayerApi {
    client: Client,
    base_url: String,
}

impl HttpPlayerApi {
    /// Create a client with default timeouts against `base_url`
    /// (e.g. `http://192.168.1.10:8090`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("ensemble/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client with static configuration");
        Self::with_client(client, base_url)
    }

    /// Create a client with custom reqwest configuration.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Http {
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| BridgeError::Protocol(e.to_string()))
    }

    /// POST with no body; most commands need none.
    async fn post_bare(&self, path: &str) -> Result<CommandAck> {
        debug!(path, "player command");
        let response = self
            .client
            .post(self.url(path))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::parse(response).await
    }

    async fn post_form(&self, path: &str, fields: &[(&str, String)]) -> Result<CommandAck> {
        debug!(path, "player command");
        let response = self
            .client
            .post(self.url(path))
            .form(fields)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::parse(response).await
    }
}

fn map_reqwest_error(err: reqwest::Error) -> BridgeError {
    if err.is_timeout() {
        BridgeError::Timeout(err.to_string())
    } else if err.is_connect() {
        BridgeError::Unavailable(err.to_string())
    } else {
        BridgeError::Network(err.to_string())
    }
}

#[async_trait]
impl PlayerApi for HttpPlayerApi {
    async fn get_state(&self) -> Result<StatusResponse> {
        let response = self
            .client
            .get(self.url("/status"))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::parse(response).await
    }

    async fn play(&self, url: &str, title: &str, kind: &str) -> Result<CommandAck> {
        self.post_form(
            "/play",
            &[
                ("url", url.to_string()),
                ("title", title.to_string()),
                ("type", kind.to_string()),
            ],
        )
        .await
    }

    async fn toggle_pause(&self) -> Result<CommandAck> {
        self.post_bare("/pause").await
    }

    async fn next(&self) -> Result<CommandAck> {
        self.post_bare("/next").await
    }

    async fn prev(&self) -> Result<CommandAck> {
        self.post_bare("/prev").await
    }

    async fn seek(&self, position_seconds: f64, duration_seconds: f64) -> Result<CommandAck> {
        let percent = seek_percent(position_seconds, duration_seconds);
        self.post_form("/seek", &[("percent", percent.to_string())])
            .await
    }

    async fn set_volume(&self, level: f64) -> Result<CommandAck> {
        let level = level.clamp(0.0, 100.0).round() as i64;
        self.post_form("/volume", &[("value", level.to_string())])
            .await
    }

    async fn cycle_loop(&self) -> Result<CommandAck> {
        self.post_bare("/loop").await
    }

    async fn set_pitch(&self, semitones: i8) -> Result<CommandAck> {
        debug!(path = "/pitch", semitones, "player command");
        let response = self
            .client
            .post(self.url("/pitch"))
            .json(&serde_json::json!({ "semitones": semitones }))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::parse(response).await
    }
}

/// The server's seek endpoint addresses positions as a percentage of the
/// track, not in seconds. With an unknown duration there is no meaningful
/// target, so resolve to 0.
fn seek_percent(position_seconds: f64, duration_seconds: f64) -> f64 {
    if duration_seconds > 0.0 {
        (position_seconds / duration_seconds * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slashes_are_stripped() {
        let api = HttpPlayerApi::new("http://localhost:8090//");
        assert_eq!(api.url("/status"), "http://localhost:8090/status");
    }

    #[test]
    fn url_joins_base_and_path() {
        let api = HttpPlayerApi::new("http://player.local:8090");
        assert_eq!(api.url("/pitch"), "http://player.local:8090/pitch");
    }

    #[test]
    fn seek_converts_seconds_to_track_percent() {
        assert_eq!(seek_percent(45.0, 180.0), 25.0);
        assert_eq!(seek_percent(180.0, 180.0), 100.0);
        // Past the end clamps rather than sending an out-of-range value.
        assert_eq!(seek_percent(200.0, 180.0), 100.0);
    }

    #[test]
    fn seek_with_unknown_duration_resolves_to_track_start() {
        assert_eq!(seek_percent(45.0, 0.0), 0.0);
    }
}
