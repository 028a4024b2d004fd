use std::io;
use std::time::Duration;

use reqwest::{StatusCode, header};
use tracing::{debug, instrument, warn};

use domain::coords::TileCoord;
use pixel_hawk_application::error::{AppError, AppResult};
use pixel_hawk_application::fetch::httpdate::{format_http_date, parse_http_date};
use pixel_hawk_application::ports::outgoing::tile_backend::{
    BackendResponse, FetchConditions, TileBackendPort,
};

#[derive(Debug, Clone)]
pub struct ReqwestTileBackendConfig {
    /// Tile URL template with `{x}` and `{y}` placeholders.
    pub url_template: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

pub struct ReqwestTileBackend {
    client: reqwest::Client,
    url_template: String,
}

impl ReqwestTileBackend {
    pub fn new(config: ReqwestTileBackendConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Transport {
                message: format!("Failed to build the HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            url_template: config.url_template,
        })
    }

    fn tile_url(&self, coord: TileCoord) -> String {
        self.url_template
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }

    async fn send(
        &self,
        url: &str,
        conditions: &FetchConditions,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self.client.get(url);
        if let Some(etag) = &conditions.etag {
            request = request.header(header::IF_NONE_MATCH, etag);
        }
        if let Some(stamp) = conditions.last_update.and_then(format_http_date) {
            request = request.header(header::IF_MODIFIED_SINCE, stamp);
        }
        request.send().await
    }
}

/// Walk the source chain down to an `io::Error` of kind `ConnectionReset`.
fn chain_has_connection_reset(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionReset {
                return true;
            }
        }
        current = err.source();
    }
    false
}

fn transport_error(url: &str, error: &reqwest::Error) -> AppError {
    AppError::Transport {
        message: format!("GET {url} failed: {error}"),
    }
}

#[async_trait::async_trait]
impl TileBackendPort for ReqwestTileBackend {
    #[instrument(skip(self, conditions))]
    async fn fetch_tile(
        &self,
        coord: TileCoord,
        conditions: &FetchConditions,
    ) -> AppResult<BackendResponse> {
        let url = self.tile_url(coord);

        let response = match self.send(&url, conditions).await {
            Ok(response) => response,
            Err(error) if chain_has_connection_reset(&error) => {
                debug!("connection reset on {url}; retrying once");
                self.send(&url, conditions)
                    .await
                    .map_err(|e| transport_error(&url, &e))?
            }
            Err(error) => return Err(transport_error(&url, &error)),
        };

        match response.status() {
            StatusCode::NOT_MODIFIED => Ok(BackendResponse::NotModified),
            status if status.is_success() => {
                let etag = response
                    .headers()
                    .get(header::ETAG)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                let last_modified = response
                    .headers()
                    .get(header::LAST_MODIFIED)
                    .and_then(|value| value.to_str().ok())
                    .and_then(parse_http_date);
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| transport_error(&url, &e))?;
                Ok(BackendResponse::Fetched {
                    bytes: bytes.to_vec(),
                    etag,
                    last_modified,
                })
            }
            status => {
                warn!("upstream answered {status} for {url}");
                Err(AppError::Transport {
                    message: format!("upstream answered {status} for {url}"),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn backend(template: &str) -> ReqwestTileBackend {
        ReqwestTileBackend::new(ReqwestTileBackendConfig {
            url_template: template.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        })
        .unwrap()
    }

    #[test]
    fn url_template_expands_both_axes() {
        let backend = backend("https://example.test/files/s0/tiles/{x}/{y}.png");
        assert_eq!(
            backend.tile_url(TileCoord::new(42, 17)),
            "https://example.test/files/s0/tiles/42/17.png"
        );
    }

    #[test]
    fn connection_reset_detection_walks_the_chain() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "peer hung up");
        let wrapped = io::Error::other(reset);
        assert!(chain_has_connection_reset(&wrapped));

        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "nobody home");
        assert!(!chain_has_connection_reset(&refused));
    }
}
