//! Scriptable collaborators for unit tests. Each fake counts its calls.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use anyhow::{bail, Result};
use async_trait::async_trait;
use crate::capabilities::*;
use crate::net::SubnetPrefix;

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

pub struct FakeScanner {
    outcome: Mutex<ScanOutcome>,
    hang: bool,
    calls: AtomicUsize,
    subnets: Mutex<Vec<SubnetPrefix>>,
}

impl FakeScanner {
    pub fn returning(candidates: &[&str]) -> Self {
        Self::with_outcome(ScanOutcome::Candidates(candidates.iter().map(|c| ip(c)).collect()))
    }

    pub fn unavailable() -> Self {
        Self::with_outcome(ScanOutcome::Unavailable)
    }

    pub fn hanging() -> Self {
        Self { hang: true, ..Self::returning(&[]) }
    }

    fn with_outcome(outcome: ScanOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            hang: false,
            calls: AtomicUsize::new(0),
            subnets: Mutex::new(Vec::new()),
        }
    }

    pub fn set_candidates(&self, candidates: &[&str]) {
        *self.outcome.lock().unwrap() =
            ScanOutcome::Candidates(candidates.iter().map(|c| ip(c)).collect());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn subnets(&self) -> Vec<SubnetPrefix> {
        self.subnets.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkScanner for FakeScanner {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn scan(&self, subnet: SubnetPrefix) -> ScanOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.subnets.lock().unwrap().push(subnet);
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.outcome.lock().unwrap().clone()
    }
}

/// Answers true for a configurable set of addresses; used for liveness and identity
pub struct FakeProbe {
    accepted: Mutex<HashSet<IpAddr>>,
    accept_all: bool,
    probed: Mutex<Vec<IpAddr>>,
}

impl FakeProbe {
    pub fn accepting(addrs: &[&str]) -> Self {
        Self {
            accepted: Mutex::new(addrs.iter().map(|a| ip(a)).collect()),
            accept_all: false,
            probed: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting_all() -> Self {
        Self { accept_all: true, ..Self::accepting(&[]) }
    }

    pub fn set_accepting(&self, addrs: &[&str]) {
        *self.accepted.lock().unwrap() = addrs.iter().map(|a| ip(a)).collect();
    }

    pub fn probed(&self) -> Vec<IpAddr> {
        self.probed.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.probed.lock().unwrap().len()
    }

    fn answer(&self, addr: IpAddr) -> bool {
        self.probed.lock().unwrap().push(addr);
        self.accept_all || self.accepted.lock().unwrap().contains(&addr)
    }
}

#[async_trait]
impl LivenessProbe for FakeProbe {
    async fn is_alive(&self, addr: IpAddr) -> bool {
        self.answer(addr)
    }
}

#[async_trait]
impl IdentityProbe for FakeProbe {
    async fn check(&self, addr: IpAddr) -> bool {
        self.answer(addr)
    }
}

pub struct FakeStatusProbe {
    text: Mutex<Option<String>>,
    hang: bool,
    calls: AtomicUsize,
}

impl FakeStatusProbe {
    pub fn new(text: Option<String>) -> Self {
        Self { text: Mutex::new(text), hang: false, calls: AtomicUsize::new(0) }
    }

    pub fn showing() -> Self {
        Self::new(Some("app_id: 84912283\ndisplay_name: DashCast".to_string()))
    }

    pub fn idle() -> Self {
        Self::new(Some("display_name: Backdrop".to_string()))
    }

    pub fn hanging() -> Self {
        Self { hang: true, ..Self::new(None) }
    }

    pub fn set_text(&self, text: Option<&str>) {
        *self.text.lock().unwrap() = text.map(str::to_string);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusProbe for FakeStatusProbe {
    async fn snapshot(&self, _addr: IpAddr) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.text.lock().unwrap().clone()
    }
}

pub struct FakeCastTrigger {
    succeed: AtomicBool,
    casts: Mutex<Vec<(IpAddr, String)>>,
}

impl FakeCastTrigger {
    pub fn new(succeed: bool) -> Self {
        Self { succeed: AtomicBool::new(succeed), casts: Mutex::new(Vec::new()) }
    }

    pub fn set_succeed(&self, succeed: bool) {
        self.succeed.store(succeed, Ordering::SeqCst);
    }

    pub fn casts(&self) -> Vec<(IpAddr, String)> {
        self.casts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.casts.lock().unwrap().len()
    }
}

#[async_trait]
impl CastTrigger for FakeCastTrigger {
    async fn cast(&self, addr: IpAddr, url: &str) -> bool {
        self.casts.lock().unwrap().push((addr, url.to_string()));
        self.succeed.load(Ordering::SeqCst)
    }
}

pub struct FakeEndpoint {
    available: bool,
    starts: AtomicBool,
    ensure_calls: AtomicUsize,
    cleanup_calls: AtomicUsize,
}

impl FakeEndpoint {
    pub fn new() -> Self {
        Self {
            available: true,
            starts: AtomicBool::new(true),
            ensure_calls: AtomicUsize::new(0),
            cleanup_calls: AtomicUsize::new(0),
        }
    }

    pub fn missing_runtime() -> Self {
        Self { available: false, ..Self::new() }
    }

    pub fn set_starts(&self, starts: bool) {
        self.starts.store(starts, Ordering::SeqCst);
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    pub fn cleanup_calls(&self) -> usize {
        self.cleanup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentEndpoint for FakeEndpoint {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn check_available(&self) -> Result<()> {
        if !self.available {
            bail!("runtime missing");
        }
        Ok(())
    }

    async fn ensure_running(&self, _port: u16, _content_dir: &Path) -> bool {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.starts.load(Ordering::SeqCst)
    }

    async fn cleanup(&self) {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeEndpointProbe {
    healthy: AtomicBool,
    urls: Mutex<Vec<String>>,
}

impl FakeEndpointProbe {
    pub fn new(healthy: bool) -> Self {
        Self { healthy: AtomicBool::new(healthy), urls: Mutex::new(Vec::new()) }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.urls.lock().unwrap().len()
    }
}

#[async_trait]
impl EndpointProbe for FakeEndpointProbe {
    async fn is_healthy(&self, url: &str) -> bool {
        self.urls.lock().unwrap().push(url.to_string());
        self.healthy.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeHostnames {
    names: HashMap<IpAddr, String>,
    calls: AtomicUsize,
}

impl FakeHostnames {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            names: entries.iter().map(|(a, n)| (ip(a), n.to_string())).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostnameLookup for FakeHostnames {
    async fn reverse(&self, addr: IpAddr) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.names.get(&addr).cloned()
    }
}

pub struct FixedHostAddress(pub Option<Ipv4Addr>);

impl HostAddress for FixedHostAddress {
    fn outbound_ipv4(&self) -> Option<Ipv4Addr> {
        self.0
    }
}
