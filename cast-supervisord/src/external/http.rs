use std::time::Duration;
use anyhow::{Context, Result};
use async_trait::async_trait;
use crate::capabilities::EndpointProbe;

/// Healthy iff a GET of the URL answers with a 2xx status
pub struct HttpEndpointProbe {
    client: reqwest::Client,
}

impl HttpEndpointProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EndpointProbe for HttpEndpointProbe {
    async fn is_healthy(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    tracing::debug!("Endpoint {} answered {}", url, status);
                }
                status.is_success()
            }
            Err(e) => {
                tracing::debug!("Endpoint {} unreachable: {}", url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};

    async fn serve(status: StatusCode) -> String {
        let app = Router::new().route("/", get(move || async move { status }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_ok_response_is_healthy() {
        let url = serve(StatusCode::OK).await;
        let probe = HttpEndpointProbe::new(Duration::from_secs(5)).unwrap();
        assert!(probe.is_healthy(&url).await);
    }

    #[tokio::test]
    async fn test_server_error_is_unhealthy() {
        let url = serve(StatusCode::INTERNAL_SERVER_ERROR).await;
        let probe = HttpEndpointProbe::new(Duration::from_secs(5)).unwrap();
        assert!(!probe.is_healthy(&url).await);
    }

    #[tokio::test]
    async fn test_closed_port_is_unhealthy() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let probe = HttpEndpointProbe::new(Duration::from_secs(2)).unwrap();
        assert!(!probe.is_healthy(&format!("http://{}/", addr)).await);
    }
}
