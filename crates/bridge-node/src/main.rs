// Path: crates/bridge-node/src/main.rs
//! Process wiring for the SEDA -> EVM bridge orchestrator: parses CLI/env
//! configuration, constructs every component (C1-C12), registers them with
//! the supervisor (C11), and drains on SIGINT/SIGTERM.
//!
//! Config-file parsing itself is out of scope; this binary only
//! overlays an optional TOML file onto `BridgeConfig`'s own `serde::Deserialize`
//! impl, the same way `toml::from_str` is used against any other serde struct.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use alloy_primitives::keccak256;
use async_trait::async_trait;
use clap::Parser;
use seda_bridge_chain::{ChainExecutor, ChainManager};
use seda_bridge_evm::{EvmClient, HttpEvmClient};
use seda_bridge_push::{BatchDiscoverySource, PushService};
use seda_bridge_scheduler::{CompletionRegistrar, DataRequestScheduler};
use seda_bridge_sequence::{SequenceAllocator, SequenceSource, SequenceValidator};
use seda_bridge_supervisor::{EventBus, ManagedComponent, Supervisor};
use seda_bridge_tracker::{BatchWindowSource, CompletionTracker};
use seda_bridge_types::config::BridgeConfig;
use seda_bridge_types::error::SequenceError;
use seda_bridge_types::model::Batch;
use seda_bridge_upstream::{HttpSedaClient, SedaClient};
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

/// The SEDA -> EVM bridge orchestrator.
#[derive(Parser, Debug)]
#[command(name = "seda-bridge-node", about = "SEDA -> EVM bridge orchestrator process")]
struct Args {
    /// Path to a TOML file deserializing into `BridgeConfig`; fields it omits
    /// keep their literal defaults.
    #[arg(long, env = "BRIDGE_CONFIG_PATH")]
    config: Option<PathBuf>,
    /// The SEDA upstream JSON-RPC-shaped facade endpoint.
    #[arg(long, env = "SEDA_ENDPOINT")]
    seda_endpoint: String,
    /// This node's SEDA signer address, used for sequence allocation and
    /// account-sequence queries.
    #[arg(long, env = "SEDA_SIGNER_ADDRESS")]
    signer_address: String,
    /// Address the telemetry HTTP server (`/metrics`, `/healthz`, `/readyz`) binds to.
    #[arg(long, env = "BRIDGE_TELEMETRY_ADDR", default_value = "0.0.0.0:9090")]
    telemetry_addr: SocketAddr,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<BridgeConfig> {
    match path {
        None => Ok(BridgeConfig::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|err| anyhow::anyhow!("failed to read config file {}: {err}", path.display()))?;
            let config: BridgeConfig = toml::from_str(&text)
                .map_err(|err| anyhow::anyhow!("failed to parse config file {}: {err}", path.display()))?;
            Ok(config)
        }
    }
}

/// Adapts [`SedaClient::query_account_sequence`] to the sequence validator's
/// narrower [`SequenceSource`] contract (kept separate per crate to avoid a
/// `seda-bridge-sequence` -> `seda-bridge-upstream` dependency).
struct SedaSequenceSource<C: SedaClient>(Arc<C>);

#[async_trait]
impl<C: SedaClient + Send + Sync> SequenceSource for SedaSequenceSource<C> {
    async fn query_account_sequence(&self, address: &str) -> Result<u64, SequenceError> {
        self.0.query_account_sequence(address).await
    }
}

/// Satisfies the completion tracker's sliding-window batch-assignment fallback
/// by walking backward from the chain's latest signed batch.
struct SedaBatchWindow<C: SedaClient> {
    client: Arc<C>,
}

#[async_trait]
impl<C: SedaClient + Send + Sync> BatchWindowSource for SedaBatchWindow<C> {
    async fn recent_batches(&self, window: u32) -> Vec<Batch> {
        let latest = match self.client.query_batch(0, true).await {
            Ok(Some(output)) => output.batch.batch_number,
            _ => return Vec::new(),
        };
        let floor = latest.saturating_sub(u64::from(window).saturating_sub(1));
        let mut batches = Vec::new();
        for batch_number in (floor..=latest).rev() {
            if let Ok(Some(output)) = self.client.query_batch(batch_number, false).await {
                batches.push(output.batch);
            }
        }
        batches
    }
}

struct SchedulerComponent<C, R>
where
    C: SedaClient + 'static,
    R: CompletionRegistrar + 'static,
{
    inner: Arc<DataRequestScheduler<C, R>>,
}

#[async_trait]
impl<C, R> ManagedComponent for SchedulerComponent<C, R>
where
    C: SedaClient + 'static,
    R: CompletionRegistrar + 'static,
{
    fn name(&self) -> &str {
        "scheduler"
    }
    async fn start(&self) {
        self.inner.start();
    }
    async fn stop(&self) {
        self.inner.stop();
    }
    async fn health(&self) -> bool {
        true
    }
}

struct TrackerComponent<C, B>
where
    C: SedaClient + 'static,
    B: BatchWindowSource + 'static,
{
    inner: Arc<CompletionTracker<C, B>>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

#[async_trait]
impl<C, B> ManagedComponent for TrackerComponent<C, B>
where
    C: SedaClient + 'static,
    B: BatchWindowSource + 'static,
{
    fn name(&self) -> &str {
        "tracker"
    }
    async fn start(&self) {
        let (tx, rx) = watch::channel(false);
        *self.shutdown.lock().await = Some(tx);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(rx).await });
    }
    async fn stop(&self) {
        if let Some(tx) = self.shutdown.lock().await.take() {
            let _ = tx.send(true);
        }
    }
    async fn health(&self) -> bool {
        true
    }
}

struct SequenceValidatorComponent<S: SequenceSource + 'static> {
    inner: Arc<SequenceValidator<S>>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

#[async_trait]
impl<S: SequenceSource + 'static> ManagedComponent for SequenceValidatorComponent<S> {
    fn name(&self) -> &str {
        "sequence_validator"
    }
    async fn start(&self) {
        let (tx, rx) = watch::channel(false);
        *self.shutdown.lock().await = Some(tx);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(rx).await });
    }
    async fn stop(&self) {
        if let Some(tx) = self.shutdown.lock().await.take() {
            let _ = tx.send(true);
        }
    }
    async fn health(&self) -> bool {
        true
    }
}

struct PushComponent<C, D, E>
where
    C: SedaClient + 'static,
    D: BatchDiscoverySource + 'static,
    E: EvmClient + 'static,
{
    inner: Arc<PushService<C, D, E>>,
}

#[async_trait]
impl<C, D, E> ManagedComponent for PushComponent<C, D, E>
where
    C: SedaClient + 'static,
    D: BatchDiscoverySource + 'static,
    E: EvmClient + 'static,
{
    fn name(&self) -> &str {
        "push_service"
    }
    async fn start(&self) {
        self.inner.start().await;
    }
    async fn stop(&self) {
        self.inner.stop().await;
    }
    async fn health(&self) -> bool {
        true
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(err) => {
                warn!(target = "bridge-node", error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    seda_bridge_telemetry::init::init_tracing()?;

    let sink = seda_bridge_telemetry::prometheus::install()?;
    seda_bridge_telemetry::sinks::SINK
        .set(sink)
        .map_err(|_| anyhow::anyhow!("telemetry sink already installed"))?;

    let config = load_config(args.config.as_deref())?;
    if config.chains.is_empty() {
        anyhow::bail!("no destination chains configured; set `chains` in --config");
    }

    tokio::spawn(seda_bridge_telemetry::http::run_server(args.telemetry_addr));

    let seda_client = Arc::new(HttpSedaClient::new(args.seda_endpoint.clone()));

    let seed = match seda_client.query_account_sequence(&args.signer_address).await {
        Ok(seq) => seq,
        Err(err) => {
            warn!(target = "bridge-node", error = %err, "initial sequence query failed; cold-starting at 0");
            0
        }
    };
    let allocator = SequenceAllocator::new(args.signer_address.clone(), seed);

    let validator = Arc::new(SequenceValidator::new(
        SedaSequenceSource(Arc::clone(&seda_client)),
        Arc::clone(&allocator),
        args.signer_address.clone(),
    ));

    let batch_window = Arc::new(SedaBatchWindow { client: Arc::clone(&seda_client) });
    let tracker = CompletionTracker::new(Arc::clone(&seda_client), batch_window, config.tracker.clone());

    let scheduler = DataRequestScheduler::new(
        Arc::clone(&seda_client),
        Arc::clone(&allocator),
        Arc::clone(&tracker),
        config.scheduler.clone(),
    );

    let events = Arc::new(EventBus::new());

    let mut executors = Vec::with_capacity(config.chains.len());
    for chain in &config.chains {
        let domain_separator = keccak256(chain.chain_id.as_bytes()).0;
        let evm_client = HttpEvmClient::new(chain.rpc_endpoint.clone());
        executors.push(ChainExecutor::new(chain.clone(), evm_client, domain_separator));
    }
    let chain_manager = Arc::new(ChainManager::new(executors, config.push.concurrency.max_parallel_chains));

    let push_service = PushService::new(
        Arc::clone(&seda_client),
        Arc::clone(&tracker),
        chain_manager,
        config.push.clone(),
        config.batch_fetch.clone(),
        Some(events.push_sender()),
    );

    let components: Vec<Arc<dyn ManagedComponent>> = vec![
        Arc::new(SchedulerComponent { inner: scheduler }),
        Arc::new(TrackerComponent { inner: tracker, shutdown: Mutex::new(None) }),
        Arc::new(SequenceValidatorComponent { inner: validator, shutdown: Mutex::new(None) }),
        Arc::new(PushComponent { inner: push_service }),
    ];

    let supervisor = Supervisor::new(components, config.supervisor.clone(), events);
    supervisor.initialize().await?;
    supervisor.start().await?;
    info!(target = "bridge-node", chains = config.chains.len(), "bridge orchestrator running");

    wait_for_shutdown_signal().await;
    info!(target = "bridge-node", "shutdown signal received");
    supervisor.shutdown().await?;

    Ok(())
}
