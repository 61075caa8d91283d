//! NMOS SDP patcher
//!
//! Reads an SDP (local file, or a sender's `manifest_href` found through the
//! sender node's IS-04 API), picks a receiver through the receiver node's
//! IS-04 API, and activates the SDP on it through IS-05.
//!
//! ## Usage
//!
//! ```bash
//! # SDP from a sender node, interactive selection on both sides
//! nmos-patcher 192.168.10.20 192.168.10.30:8080
//!
//! # Local SDP file, receiver APIs on separate ports
//! nmos-patcher -s camera1.sdp 192.168.10.30 --receiver-port-04 3212 --receiver-port-05 3215
//!
//! # Non-interactive
//! nmos-patcher 192.168.10.20 192.168.10.30 --sender-id <uuid> --receiver-id <uuid>
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nmos_patcher::config::{HostPort, PatcherConfig};
use nmos_patcher::discovery::{self, NodeApi};
use nmos_patcher::select::{select_by_id, select_from_list};
use nmos_patcher::{HttpClient, Negotiator, paths};

/// Push an SDP to an NMOS IS-05 receiver.
#[derive(Parser, Debug)]
#[command(name = "nmos-patcher", about = "NMOS SDP sender")]
struct Cli {
    /// `[SENDER] RECEIVER` as host[:port]; SENDER is only used without --sdp.
    #[arg(required = true, num_args = 1..=2, value_name = "HOST[:PORT]")]
    endpoints: Vec<HostPort>,

    /// Use a local SDP file instead of a sender's manifest.
    #[arg(short = 's', long)]
    sdp: Option<PathBuf>,

    /// Receiver port for the IS-04 node API.
    #[arg(long, visible_alias = "rp04")]
    receiver_port_04: Option<u16>,

    /// Receiver port for the IS-05 connection API.
    #[arg(long, visible_alias = "rp05")]
    receiver_port_05: Option<u16>,

    /// Select the sender by id instead of prompting.
    #[arg(long)]
    sender_id: Option<String>,

    /// Select the receiver by id instead of prompting.
    #[arg(long)]
    receiver_id: Option<String>,

    /// Wait between commit and reading the active state, in milliseconds.
    #[arg(long, env = "NMOS_PATCHER_SETTLE_MS")]
    settle_ms: Option<u64>,

    /// Per-request HTTP timeout in milliseconds.
    #[arg(long, env = "NMOS_PATCHER_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// TOML config file.
    #[arg(long, env = "NMOS_PATCHER_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Split positionals into `(sender, receiver)`.
    fn endpoints(&self) -> (Option<&HostPort>, &HostPort) {
        match self.endpoints.as_slice() {
            [sender, receiver] => (Some(sender), receiver),
            [receiver] => (None, receiver),
            _ => unreachable!("clap enforces one or two endpoints"),
        }
    }

    fn resolve_config(&self) -> anyhow::Result<PatcherConfig> {
        let mut config = match &self.config {
            Some(path) => PatcherConfig::load(path).map_err(|e| anyhow::anyhow!(e))?,
            None => PatcherConfig::default(),
        };
        if let Some(ms) = self.settle_ms {
            config.settle_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.timeout_ms {
            config.request_timeout = Some(Duration::from_millis(ms));
        }
        if self.receiver_port_04.is_some() {
            config.node_port = self.receiver_port_04;
        }
        if self.receiver_port_05.is_some() {
            config.connection_port = self.receiver_port_05;
        }
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    let (sender_node, receiver_node) = cli.endpoints();

    tracing::info!(
        sender = ?sender_node.map(ToString::to_string),
        receiver = %receiver_node,
        sdp = ?cli.sdp,
        settle_ms = config.settle_delay.as_millis() as u64,
        "nmos-patcher starting"
    );

    let client = HttpClient::new(config.request_timeout).context("building HTTP client")?;

    // ── SDP source ──────────────────────────────────────────────
    let (sdp, sender_id) = match &cli.sdp {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("SDP file not found: {}", path.display()))?;
            (text, None)
        }
        None => {
            let Some(sender_node) = sender_node else {
                anyhow::bail!("Sender IP[:port] or -s option required");
            };
            let node = NodeApi::new(&client, sender_node.root_url(None));
            let version = node.version().await?;
            let senders = node.senders(&version).await?;

            let names = senders.iter().map(|s| s.display_name()).collect();
            let idx = choose(
                names,
                "Please select the Sender to get SDP:",
                cli.sender_id.as_deref(),
                |wanted| select_by_id(&senders, wanted, |s| s.id.as_str()),
            )
            .await?;
            let sender = &senders[idx];

            let sdp = discovery::fetch_manifest(&client, sender).await?;
            (sdp, Some(sender.id.clone()))
        }
    };

    // ── Receiver (IS-04) ────────────────────────────────────────
    let node_root = receiver_node.root_url(config.node_port);
    let node = NodeApi::new(&client, node_root);
    let version = node.version().await?;
    let receivers = node.receivers(&version).await?;

    let names = receivers.iter().map(|r| r.display_name()).collect();
    let idx = choose(
        names,
        "Select the Receiver to send SDP:",
        cli.receiver_id.as_deref(),
        |wanted| select_by_id(&receivers, wanted, |r| r.id.as_str()),
    )
    .await?;
    let receiver_id = receivers[idx].id.clone();

    // ── Connection (IS-05) ──────────────────────────────────────
    let conn_root = receiver_node.root_url(config.connection_port);
    let conn_version = discovery::connection_version(&client, &conn_root).await?;
    let base = paths::receiver_base(&conn_root, &conn_version, &receiver_id);

    let mut negotiator = Negotiator::new(client).with_settle_delay(config.settle_delay);
    let outcome = negotiator.run(&base, &sdp, sender_id.as_deref()).await?;

    println!("\n[Receiver's Active State]");
    println!("{}", serde_json::to_string_pretty(&outcome.active)?);
    Ok(())
}

/// Pick an entry by id when one was given, otherwise prompt on stdin.
async fn choose(
    names: Vec<String>,
    prompt: &'static str,
    wanted: Option<&str>,
    by_id: impl Fn(&str) -> Option<usize>,
) -> anyhow::Result<usize> {
    if let Some(wanted) = wanted {
        return by_id(wanted).with_context(|| format!("no resource with id {wanted}"));
    }
    let idx = tokio::task::spawn_blocking(move || {
        select_from_list(&names, prompt, std::io::stdin().lock(), std::io::stdout())
    })
    .await??;
    Ok(idx)
}
