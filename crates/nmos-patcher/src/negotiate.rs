//! Staged/active negotiation against an IS-05 receiver.
//!
//! One run walks `PathProbing → LegCountDiscovery → Translating → Committing
//! → Verifying → Done`. Every failure is terminal; nothing is retried. The
//! only alternative ever tried is the second staged-path spelling.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use nmos_transport::{Activation, ReceiverPorts, TransportDocument, TranslateError, translate};

use crate::api::{ApiError, ConnectionApi};
use crate::paths::{NegotiatedPath, STAGED_CANDIDATES};

/// Default wait between commit and reading the active state.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum NegotiateError {
    #[error("PATCH failed at both staged paths under {base}")]
    PathResolution { base: String, attempts: Vec<ApiError> },
    #[error("reading transport_params from {url} failed: {source}")]
    Discovery {
        url: String,
        #[source]
        source: ApiError,
    },
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error("commit to {url} failed: {source}")]
    Commit {
        url: String,
        #[source]
        source: ApiError,
    },
    #[error("reading active state from {url} failed: {source}")]
    Verify {
        url: String,
        #[source]
        source: ApiError,
    },
}

// ── Phases ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PathProbing,
    LegCountDiscovery,
    Translating,
    Committing,
    Verifying,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::PathProbing => "path_probing",
            Phase::LegCountDiscovery => "leg_count_discovery",
            Phase::Translating => "translating",
            Phase::Committing => "committing",
            Phase::Verifying => "verifying",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Body used to test whether a staged spelling is routed.
#[derive(Debug, Clone, Serialize)]
pub struct ProbePatch {
    pub activation: Activation,
    pub master_enable: bool,
}

impl Default for ProbePatch {
    fn default() -> Self {
        Self {
            activation: Activation::immediate(),
            master_enable: false,
        }
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct NegotiationOutcome {
    pub path: NegotiatedPath,
    pub ports: ReceiverPorts,
    pub document: TransportDocument,
    /// Receiver's active resource read back after the commit.
    pub active: Value,
}

// ── Negotiator ──────────────────────────────────────────────────────

pub struct Negotiator<C> {
    api: C,
    settle_delay: Duration,
    phase: Phase,
}

impl<C: ConnectionApi> Negotiator<C> {
    pub fn new(api: C) -> Self {
        Self {
            api,
            settle_delay: DEFAULT_SETTLE_DELAY,
            phase: Phase::Idle,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Push `sdp` to the receiver at `base` and return its new active state.
    pub async fn run(
        &mut self,
        base: &str,
        sdp: &str,
        sender_id: Option<&str>,
    ) -> Result<NegotiationOutcome, NegotiateError> {
        let result = self.drive(base, sdp, sender_id).await;
        if let Err(e) = &result {
            tracing::error!(phase = %self.phase, error = %e, "negotiation failed");
            self.phase = Phase::Failed;
        }
        result
    }

    async fn drive(
        &mut self,
        base: &str,
        sdp: &str,
        sender_id: Option<&str>,
    ) -> Result<NegotiationOutcome, NegotiateError> {
        self.enter(Phase::PathProbing);
        let path = self.resolve_staged_path(base).await?;

        self.enter(Phase::LegCountDiscovery);
        let ports = self.discover_receiver_ports(&path.staged).await?;

        self.enter(Phase::Translating);
        let document = translate(sdp, sender_id, ports)?;

        self.enter(Phase::Committing);
        self.commit(&path.staged, &document).await?;

        self.enter(Phase::Verifying);
        let active = self.verify(&path.active).await?;

        self.enter(Phase::Done);
        Ok(NegotiationOutcome {
            path,
            ports,
            document,
            active,
        })
    }

    fn enter(&mut self, phase: Phase) {
        tracing::info!(from = %self.phase, to = %phase, "negotiation phase");
        self.phase = phase;
    }

    /// Probe the staged spellings in order and adopt the first one accepted.
    pub async fn resolve_staged_path(&self, base: &str) -> Result<NegotiatedPath, NegotiateError> {
        let probe = ProbePatch::default();
        let mut attempts = Vec::with_capacity(STAGED_CANDIDATES.len());

        for (spelling, build) in STAGED_CANDIDATES {
            let staged = build(base);
            match self.api.apply_patch(&staged, &probe).await {
                Ok(_) => {
                    tracing::info!(path = %staged, spelling, "PATCH accepted");
                    return Ok(NegotiatedPath::from_staged(staged));
                }
                Err(e) => {
                    tracing::warn!(path = %staged, spelling, error = %e, "PATCH rejected");
                    attempts.push(e);
                }
            }
        }

        Err(NegotiateError::PathResolution {
            base: base.to_string(),
            attempts,
        })
    }

    /// Read the staged resource and count its `transport_params`.
    pub async fn discover_receiver_ports(
        &self,
        staged: &str,
    ) -> Result<ReceiverPorts, NegotiateError> {
        let current = self
            .api
            .fetch_json(staged)
            .await
            .map_err(|source| NegotiateError::Discovery {
                url: staged.to_string(),
                source,
            })?;
        let count = current
            .get("transport_params")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let ports = ReceiverPorts::from_param_count(count);
        tracing::info!(count, ?ports, "receiver leg count");
        Ok(ports)
    }

    pub async fn commit(
        &self,
        staged: &str,
        document: &TransportDocument,
    ) -> Result<Value, NegotiateError> {
        if let Ok(pretty) = serde_json::to_string_pretty(document) {
            tracing::info!(path = %staged, "PATCH body:\n{pretty}");
        }
        self.api
            .apply_patch(staged, document)
            .await
            .map_err(|source| NegotiateError::Commit {
                url: staged.to_string(),
                source,
            })
    }

    /// Wait for activation to settle, then read the active resource.
    pub async fn verify(&self, active: &str) -> Result<Value, NegotiateError> {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        let state = self
            .api
            .fetch_json(active)
            .await
            .map_err(|source| NegotiateError::Verify {
                url: active.to_string(),
                source,
            })?;
        tracing::info!(path = %active, "receiver active state read back");
        Ok(state)
    }
}
