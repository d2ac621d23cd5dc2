use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{bail, Result};
use async_trait::async_trait;
use crate::capabilities::ContentEndpoint;
use crate::external::command;

const HTTPD_DOCROOT: &str = "/usr/local/apache2/htdocs/";
const WARM_UP: Duration = Duration::from_secs(2);
const QUICK_COMMAND: Duration = Duration::from_secs(15);

/// httpd container driven through the docker CLI
pub struct DockerEndpoint {
    container: String,
    image: String,
    content_dir: PathBuf,
    start_timeout: Duration,
}

impl DockerEndpoint {
    pub fn new(container: String, image: String, content_dir: PathBuf, start_timeout: Duration) -> Self {
        Self { container, image, content_dir, start_timeout }
    }

    async fn is_listed(&self) -> bool {
        let filter = format!("name={}", self.container);
        let args = ["ps", "--filter", filter.as_str(), "--format", "{{.Names}}"];
        match command::run("docker", &args, QUICK_COMMAND).await {
            Ok(out) if out.success => container_listed(&out.stdout, &self.container),
            Ok(out) => {
                tracing::warn!("docker ps failed: {}", out.summary());
                false
            }
            Err(e) => {
                tracing::warn!("docker ps failed: {:#}", e);
                false
            }
        }
    }

    async fn remove(&self) {
        if let Err(e) = command::run("docker", &["rm", "-f", self.container.as_str()], QUICK_COMMAND).await {
            tracing::debug!("docker rm failed: {:#}", e);
        }
    }
}

/// Exact name match against `docker ps --format {{.Names}}` output
pub fn container_listed(ps_output: &str, container: &str) -> bool {
    ps_output.lines().any(|line| line.trim() == container)
}

pub fn run_args(container: &str, image: &str, port: u16, content_dir: &Path) -> Vec<String> {
    vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        container.to_string(),
        "-p".to_string(),
        format!("{}:80", port),
        "-v".to_string(),
        format!("{}:{}", content_dir.display(), HTTPD_DOCROOT),
        image.to_string(),
    ]
}

#[async_trait]
impl ContentEndpoint for DockerEndpoint {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn check_available(&self) -> Result<()> {
        let out = command::run("docker", &["info"], QUICK_COMMAND).await?;
        if !out.success {
            bail!("Docker is not running: {}", out.summary());
        }
        if !self.content_dir.is_dir() {
            tracing::warn!("Content directory {:?} does not exist", self.content_dir);
        }
        Ok(())
    }

    async fn ensure_running(&self, port: u16, content_dir: &Path) -> bool {
        if self.is_listed().await {
            tracing::info!("Web server already running");
            return true;
        }

        // A stopped container with the same name blocks `docker run`
        self.remove().await;

        let args = run_args(&self.container, &self.image, port, content_dir);
        match command::run("docker", &args, self.start_timeout).await {
            Ok(out) if out.success => {
                tracing::info!("Web server container {} started on port {}", self.container, port);
                tokio::time::sleep(WARM_UP).await;
                true
            }
            Ok(out) => {
                tracing::error!("Failed to start web server: {}", out.summary());
                false
            }
            Err(e) => {
                tracing::error!("Error starting web server: {:#}", e);
                false
            }
        }
    }

    async fn cleanup(&self) {
        self.remove().await;
        if let Err(e) = command::run("docker", &["container", "prune", "-f"], QUICK_COMMAND).await {
            tracing::debug!("docker container prune failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_name_match_only() {
        let out = "smart-display-server-old\nsmart-display-server\n";
        assert!(container_listed(out, "smart-display-server"));
        assert!(!container_listed("smart-display-server-old\n", "smart-display-server"));
        assert!(!container_listed("", "smart-display-server"));
    }

    #[test]
    fn test_run_arguments_publish_port_and_mount_content() {
        let args = run_args(
            "smart-display-server",
            "httpd:alpine",
            5500,
            Path::new("/opt/smart-display/src"),
        );
        assert_eq!(
            args,
            [
                "run", "-d", "--name", "smart-display-server",
                "-p", "5500:80",
                "-v", "/opt/smart-display/src:/usr/local/apache2/htdocs/",
                "httpd:alpine",
            ]
        );
    }
}
