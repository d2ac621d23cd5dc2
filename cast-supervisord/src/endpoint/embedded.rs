use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use axum::Router;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use crate::capabilities::ContentEndpoint;

struct RunningServer {
    local_addr: SocketAddr,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Static file server for the content directory, hosted on this process's runtime
pub struct EmbeddedEndpoint {
    content_dir: PathBuf,
    bind: IpAddr,
    running: Mutex<Option<RunningServer>>,
}

impl EmbeddedEndpoint {
    pub fn new(content_dir: PathBuf) -> Self {
        Self::bound_to(content_dir, IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    pub fn bound_to(content_dir: PathBuf, bind: IpAddr) -> Self {
        Self { content_dir, bind, running: Mutex::new(None) }
    }

    /// Address of the live listener, if any
    #[cfg(test)]
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .await
            .as_ref()
            .filter(|s| !s.task.is_finished())
            .map(|s| s.local_addr)
    }

    async fn start(&self, port: u16, content_dir: &Path) -> Result<RunningServer> {
        let app = Router::new().fallback_service(ServeDir::new(content_dir));
        let listener = tokio::net::TcpListener::bind((self.bind, port))
            .await
            .with_context(|| format!("Failed to bind to {}:{}", self.bind, port))?;
        let local_addr = listener.local_addr()?;

        let stop = CancellationToken::new();
        let shutdown = stop.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
            {
                tracing::error!("Content server error: {}", e);
            }
        });

        Ok(RunningServer { local_addr, stop, task })
    }
}

#[async_trait]
impl ContentEndpoint for EmbeddedEndpoint {
    fn name(&self) -> &'static str {
        "embedded"
    }

    async fn check_available(&self) -> Result<()> {
        if !self.content_dir.is_dir() {
            bail!("Content directory {:?} does not exist", self.content_dir);
        }
        Ok(())
    }

    async fn ensure_running(&self, port: u16, content_dir: &Path) -> bool {
        let mut running = self.running.lock().await;
        if let Some(server) = running.as_ref() {
            if !server.task.is_finished() {
                return true;
            }
            tracing::warn!("Content server on {} stopped unexpectedly", server.local_addr);
        }

        match self.start(port, content_dir).await {
            Ok(server) => {
                tracing::info!("Serving {:?} on {}", content_dir, server.local_addr);
                *running = Some(server);
                true
            }
            Err(e) => {
                tracing::error!("Failed to start content server: {:#}", e);
                *running = None;
                false
            }
        }
    }

    async fn cleanup(&self) {
        let Some(server) = self.running.lock().await.take() else {
            return;
        };
        server.stop.cancel();
        if let Err(e) = server.task.await {
            tracing::warn!("Content server task failed: {}", e);
        }
        tracing::info!("Content server on {} stopped", server.local_addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn content() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>dashboard</h1>").unwrap();
        dir
    }

    fn endpoint(dir: &Path) -> EmbeddedEndpoint {
        EmbeddedEndpoint::bound_to(dir.to_path_buf(), IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[tokio::test]
    async fn test_serves_index_from_content_dir() {
        let dir = content();
        let endpoint = endpoint(dir.path());

        assert!(endpoint.ensure_running(0, dir.path()).await);
        let addr = endpoint.local_addr().await.unwrap();

        let body = reqwest::get(format!("http://{}/", addr)).await.unwrap().text().await.unwrap();
        assert!(body.contains("dashboard"));

        endpoint.cleanup().await;
    }

    #[tokio::test]
    async fn test_ensure_running_is_idempotent() {
        let dir = content();
        let endpoint = endpoint(dir.path());

        assert!(endpoint.ensure_running(0, dir.path()).await);
        let first = endpoint.local_addr().await;
        assert!(endpoint.ensure_running(0, dir.path()).await);
        assert_eq!(endpoint.local_addr().await, first);

        endpoint.cleanup().await;
    }

    #[tokio::test]
    async fn test_cleanup_stops_listener() {
        let dir = content();
        let endpoint = endpoint(dir.path());
        assert!(endpoint.ensure_running(0, dir.path()).await);
        let addr = endpoint.local_addr().await.unwrap();

        endpoint.cleanup().await;
        assert_eq!(endpoint.local_addr().await, None);

        let client = reqwest::Client::builder().timeout(Duration::from_secs(2)).build().unwrap();
        assert!(client.get(format!("http://{}/", addr)).send().await.is_err());
    }

    #[tokio::test]
    async fn test_port_in_use_fails() {
        let dir = content();
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let endpoint = endpoint(dir.path());
        assert!(!endpoint.ensure_running(port, dir.path()).await);
        assert_eq!(endpoint.local_addr().await, None);
    }

    #[tokio::test]
    async fn test_missing_content_dir_is_unavailable() {
        let endpoint = EmbeddedEndpoint::new(PathBuf::from("/nonexistent/content"));
        assert!(endpoint.check_available().await.is_err());
        assert!(endpoint.check_available().await.unwrap_err().to_string().contains("does not exist"));
    }
}
