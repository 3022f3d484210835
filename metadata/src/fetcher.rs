use crate::config::MetadataConfig;
use crate::errors::{MetadataError, Result};
use crate::etag::ChangeGate;
use crate::malformed_keys::MalformedKeys;
use crate::metrics_defs::{
    ETAG_CHANGED, METADATA_FETCH, METADATA_FETCH_DURATION, counter, histogram,
};
use crate::snapshot::Snapshot;
use http::header::ETAG;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Without this header the metadata server rejects the request.
pub const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
pub const METADATA_FLAVOR: &str = "Google";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Returns the current state right away and leaves the etag alone.
    Immediate,
    /// Waits server side until the etag moves past the last one seen.
    LongPoll,
}

impl Mode {
    fn as_str(&self) -> &'static str {
        match self {
            Mode::Immediate => "immediate",
            Mode::LongPoll => "long_poll",
        }
    }
}

/// Reads the recursive instance and project metadata.
///
/// The etag and the malformed key memo belong to this instance. `watch` and
/// `get` borrow it mutably, so one `Fetcher` serves one request at a time.
/// Independent watchers need independent fetchers.
pub struct Fetcher {
    client: reqwest::Client,
    config: MetadataConfig,
    gate: ChangeGate,
    changed: bool,
    malformed: MalformedKeys,
}

impl Fetcher {
    pub fn new(config: MetadataConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.client_timeout())
            .build()
            .map_err(MetadataError::Client)?;

        Ok(Fetcher {
            client,
            config,
            gate: ChangeGate::new(),
            changed: false,
            malformed: MalformedKeys::new(),
        })
    }

    /// Long-polls for the next configuration generation.
    ///
    /// Returns `Ok(None)` when the request was abandoned because `cancel` fired,
    /// so that a supervising loop can stop without reporting a failure.
    pub async fn watch(&mut self, cancel: &CancellationToken) -> Result<Option<Snapshot>> {
        self.fetch(Mode::LongPoll, cancel).await
    }

    /// One-shot read that does not disturb the change detection baseline.
    pub async fn get(&mut self, cancel: &CancellationToken) -> Result<Option<Snapshot>> {
        self.fetch(Mode::Immediate, cancel).await
    }

    /// Whether the last long-poll response carried a different etag than the one before it.
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn etag(&self) -> &str {
        self.gate.etag()
    }

    pub fn malformed_keys(&self) -> &MalformedKeys {
        &self.malformed
    }

    pub fn request_url(&self, mode: Mode) -> Url {
        let mut url = self.config.url.clone();

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("recursive", "true");
            query.append_pair("alt", "json");

            if mode == Mode::LongPoll {
                query.append_pair("wait_for_change", "true");
                query.append_pair("timeout_sec", &self.config.hang_timeout_secs.to_string());
            }
            // Ignored by the server unless waiting for a change.
            query.append_pair("last_etag", self.gate.etag());
        }

        url
    }

    async fn fetch(&mut self, mode: Mode, cancel: &CancellationToken) -> Result<Option<Snapshot>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let url = self.request_url(mode);
        let request = self
            .client
            .get(url)
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR);

        let start = Instant::now();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            response = request.send() => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(_) if cancel.is_cancelled() => return Ok(None),
            Err(e) => {
                counter!(METADATA_FETCH, "mode" => mode.as_str(), "outcome" => "transport_error")
                    .increment(1);
                return Err(MetadataError::Request(e));
            }
        };
        histogram!(METADATA_FETCH_DURATION).record(start.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            counter!(METADATA_FETCH, "mode" => mode.as_str(), "outcome" => "bad_status")
                .increment(1);
            return Err(MetadataError::Status(status));
        }

        // The server may answer without a new etag, the gate is refreshed regardless.
        if mode == Mode::LongPoll {
            let etag = response.headers().get(ETAG).and_then(|v| v.to_str().ok());
            self.changed = self.gate.update(etag);
            if self.changed {
                counter!(ETAG_CHANGED).increment(1);
            }
            tracing::debug!(etag = %self.gate.etag(), changed = self.changed, "Metadata long-poll returned");
        }

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            body = response.bytes() => body,
        };
        let body = match body {
            Ok(body) => body,
            Err(_) if cancel.is_cancelled() => return Ok(None),
            Err(e) => {
                counter!(METADATA_FETCH, "mode" => mode.as_str(), "outcome" => "transport_error")
                    .increment(1);
                return Err(MetadataError::Request(e));
            }
        };

        let snapshot = Snapshot::decode(&body, &mut self.malformed).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to decode metadata response");
            counter!(METADATA_FETCH, "mode" => mode.as_str(), "outcome" => "decode_error")
                .increment(1);
        })?;

        counter!(METADATA_FETCH, "mode" => mode.as_str(), "outcome" => "ok").increment(1);
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::sample_metadata;
    use http::StatusCode;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const METADATA_PATH: &str = "/computeMetadata/v1/";

    fn fetcher_for(server: &MockServer) -> Fetcher {
        let config = MetadataConfig {
            url: Url::parse(&format!("{}{METADATA_PATH}", server.uri())).unwrap(),
            ..Default::default()
        };
        Fetcher::new(config).unwrap()
    }

    fn metadata_response(etag: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("ETag", etag)
            .set_body_string(sample_metadata().to_string())
    }

    fn long_poll(last_etag: &str) -> wiremock::MockBuilder {
        Mock::given(method("GET"))
            .and(path(METADATA_PATH))
            .and(header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR))
            .and(query_param("recursive", "true"))
            .and(query_param("alt", "json"))
            .and(query_param("wait_for_change", "true"))
            .and(query_param("timeout_sec", "60"))
            .and(query_param("last_etag", last_etag))
    }

    #[test]
    fn test_request_url() {
        let fetcher = Fetcher::new(MetadataConfig::default()).unwrap();
        assert_eq!(
            fetcher.request_url(Mode::Immediate).as_str(),
            "http://metadata.google.internal/computeMetadata/v1/?recursive=true&alt=json&last_etag=NONE"
        );
        assert_eq!(
            fetcher.request_url(Mode::LongPoll).as_str(),
            "http://metadata.google.internal/computeMetadata/v1/?recursive=true&alt=json&wait_for_change=true&timeout_sec=60&last_etag=NONE"
        );
    }

    #[tokio::test]
    async fn test_watch_tracks_etag() {
        let server = MockServer::start().await;

        long_poll("NONE")
            .respond_with(metadata_response("abc"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        long_poll("abc")
            .respond_with(metadata_response("abc"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        long_poll("abc")
            .respond_with(metadata_response("def"))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for(&server);
        let cancel = CancellationToken::new();

        let snapshot = fetcher.watch(&cancel).await.unwrap().unwrap();
        assert_eq!(snapshot.project.project_id, "my-project");
        assert!(fetcher.changed());
        assert_eq!(fetcher.etag(), "abc");

        // Same etag again: a snapshot is still returned but nothing changed
        let snapshot = fetcher.watch(&cancel).await.unwrap();
        assert!(snapshot.is_some());
        assert!(!fetcher.changed());
        assert_eq!(fetcher.etag(), "abc");

        fetcher.watch(&cancel).await.unwrap().unwrap();
        assert!(fetcher.changed());
        assert_eq!(fetcher.etag(), "def");
    }

    #[tokio::test]
    async fn test_missing_etag_resets_to_default() {
        let server = MockServer::start().await;
        long_poll("NONE")
            .respond_with(metadata_response("abc"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        long_poll("abc")
            .respond_with(
                ResponseTemplate::new(200).set_body_string(sample_metadata().to_string()),
            )
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for(&server);
        let cancel = CancellationToken::new();

        fetcher.watch(&cancel).await.unwrap().unwrap();
        fetcher.watch(&cancel).await.unwrap().unwrap();
        assert!(fetcher.changed());
        assert_eq!(fetcher.etag(), "NONE");
    }

    #[tokio::test]
    async fn test_get_does_not_touch_etag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(METADATA_PATH))
            .and(header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR))
            .and(query_param("recursive", "true"))
            .and(query_param_is_missing("wait_for_change"))
            .and(query_param("last_etag", "NONE"))
            .respond_with(metadata_response("abc"))
            .expect(1)
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for(&server);
        let snapshot = fetcher.get(&CancellationToken::new()).await.unwrap().unwrap();

        assert_eq!(snapshot.instance.attributes.enable_diagnostics, Some(true));
        assert_eq!(fetcher.etag(), "NONE");
        assert!(!fetcher.changed());
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let server = MockServer::start().await;
        long_poll("NONE")
            .respond_with(metadata_response("abc"))
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for(&server);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(fetcher.watch(&cancel).await.unwrap().is_none());
        assert!(fetcher.get(&cancel).await.unwrap().is_none());
        assert_eq!(fetcher.etag(), "NONE");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_in_flight() {
        let server = MockServer::start().await;
        long_poll("NONE")
            .respond_with(metadata_response("abc").set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for(&server);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        assert!(fetcher.watch(&cancel).await.unwrap().is_none());
        assert_eq!(fetcher.etag(), "NONE");
    }

    #[tokio::test]
    async fn test_transport_error() {
        // Nothing listens on the discard port
        let config = MetadataConfig {
            url: Url::parse("http://127.0.0.1:9/computeMetadata/v1/").unwrap(),
            ..Default::default()
        };
        let mut fetcher = Fetcher::new(config).unwrap();

        let result = fetcher.watch(&CancellationToken::new()).await;
        assert!(matches!(result, Err(MetadataError::Request(_))));
        assert_eq!(fetcher.etag(), "NONE");
    }

    #[tokio::test]
    async fn test_bad_status() {
        let server = MockServer::start().await;
        long_poll("NONE")
            .respond_with(ResponseTemplate::new(403).insert_header("ETag", "abc"))
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for(&server);
        let result = fetcher.watch(&CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(MetadataError::Status(StatusCode::FORBIDDEN))
        ));
        assert_eq!(fetcher.etag(), "NONE");
    }

    #[tokio::test]
    async fn test_decode_error() {
        let server = MockServer::start().await;
        long_poll("NONE")
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "abc")
                    .set_body_string("{\"instance\": [}"),
            )
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for(&server);
        let result = fetcher.watch(&CancellationToken::new()).await;
        assert!(matches!(result, Err(MetadataError::Decode(_))));

        // The etag was already observed before the body failed to decode
        assert_eq!(fetcher.etag(), "abc");
    }

    #[tokio::test]
    async fn test_malformed_keys_reported_once_across_polls() {
        let server = MockServer::start().await;
        let mut body = sample_metadata();
        body["project"]["attributes"]["windows-keys"] = serde_json::json!("{oops\n{oops");
        long_poll("NONE")
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "abc")
                    .set_body_string(body.to_string()),
            )
            .mount(&server)
            .await;
        long_poll("abc")
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "abc")
                    .set_body_string(body.to_string()),
            )
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for(&server);
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            let snapshot = fetcher.watch(&cancel).await.unwrap().unwrap();
            assert!(snapshot.project.attributes.windows_keys.is_empty());
            assert_eq!(snapshot.instance.attributes.windows_keys.len(), 1);
        }
        assert_eq!(fetcher.malformed_keys().len(), 1);
    }
}
