use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

pub const DEFAULT_PROBE_ADDR: &str = "api.groq.com:443";
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    async fn is_network_available(&self) -> bool;
}

/// Treats a successful TCP connect to a well-known host as "online".
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_ADDR)
    }
}

#[async_trait]
impl NetworkMonitor for TcpProbe {
    async fn is_network_available(&self) -> bool {
        can_reach_host(&self.addr, self.timeout).await
    }
}

/// Fixed answer, for offline setups and tests.
#[derive(Clone, Copy, Debug)]
pub struct StaticNetwork(pub bool);

#[async_trait]
impl NetworkMonitor for StaticNetwork {
    async fn is_network_available(&self) -> bool {
        self.0
    }
}

pub async fn can_reach_host(addr: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            tracing::warn!("cannot reach host {addr}: {err}");
            false
        }
        Err(_) => {
            tracing::warn!("cannot reach host {addr}: timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reaches_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let probe = TcpProbe::new(addr).with_timeout(Duration::from_secs(1));
        assert!(probe.is_network_available().await);
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        assert!(!can_reach_host(&addr, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn static_network_reports_its_value() {
        assert!(StaticNetwork(true).is_network_available().await);
        assert!(!StaticNetwork(false).is_network_available().await);
    }
}
