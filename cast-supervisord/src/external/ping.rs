use std::net::IpAddr;
use std::time::Duration;
use async_trait::async_trait;
use crate::capabilities::LivenessProbe;
use super::command;

/// One ICMP echo through the system `ping`
pub struct PingProbe {
    wait: Duration,
}

impl PingProbe {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }

    fn args(&self, addr: IpAddr) -> Vec<String> {
        vec![
            "-c".to_string(),
            "1".to_string(),
            "-W".to_string(),
            self.wait.as_secs().max(1).to_string(),
            addr.to_string(),
        ]
    }
}

#[async_trait]
impl LivenessProbe for PingProbe {
    async fn is_alive(&self, addr: IpAddr) -> bool {
        // ping enforces -W itself; the extra slack only guards against a wedged process
        let limit = self.wait + Duration::from_secs(3);
        match command::run("ping", &self.args(addr), limit).await {
            Ok(out) => out.success,
            Err(e) => {
                tracing::debug!("Ping {} failed: {:#}", addr, e);
                false
            }
        }
    }
}
