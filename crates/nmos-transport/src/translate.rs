//! Session description → IS-05 transport document.
//!
//! The scan is a left-to-right fold over SDP lines. Media-level fields
//! (`m=`, `c=`, `a=source-filter:`) accumulate into the leg in progress; an
//! `a=mid:` line closes it, committing it under its label when it carries
//! both a port and a multicast group.

use thiserror::Error;

use crate::model::{
    Activation, ReceiverPorts, TransportDocument, TransportFile, TransportLeg, TransportParam,
};

const PRIMARY: &str = "primary";
const SECONDARY: &str = "secondary";

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("could not extract transport_params from SDP (missing required information)")]
    Extraction,
    #[error("malformed {field} in SDP line {line:?}")]
    MalformedField { field: &'static str, line: String },
}

// ── Accumulator ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LegBuilder {
    destination_port: Option<u16>,
    multicast_ip: Option<String>,
    source_ip: Option<String>,
}

impl LegBuilder {
    fn is_complete(&self) -> bool {
        self.destination_port.is_some()
            && self.multicast_ip.as_deref().is_some_and(|ip| !ip.is_empty())
    }

    fn build(&self) -> Option<TransportLeg> {
        if !self.is_complete() {
            return None;
        }
        Some(TransportLeg {
            destination_port: self.destination_port?,
            multicast_ip: self.multicast_ip.clone()?,
            source_ip: self.source_ip.clone(),
            rtp_enabled: true,
        })
    }
}

/// Committed legs keyed by `a=mid` label, in first-commit order.
#[derive(Debug, Default)]
struct LegSet {
    legs: Vec<(String, TransportLeg)>,
}

impl LegSet {
    fn commit(&mut self, label: String, leg: TransportLeg) {
        match self.legs.iter_mut().find(|(l, _)| *l == label) {
            Some(slot) => slot.1 = leg,
            None => self.legs.push((label, leg)),
        }
    }

    fn get(&self, label: &str) -> Option<&TransportLeg> {
        self.legs.iter().find(|(l, _)| l == label).map(|(_, leg)| leg)
    }

    fn first(&self) -> Option<&TransportLeg> {
        self.legs.first().map(|(_, leg)| leg)
    }

    fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }
}

#[derive(Debug, Default)]
struct ScanState {
    current: LegBuilder,
    labeled: LegSet,
}

impl ScanState {
    fn step(mut self, line: &str) -> Result<Self, TranslateError> {
        if line.starts_with("m=") {
            let port = line
                .split_whitespace()
                .nth(1)
                .and_then(|tok| tok.parse::<u16>().ok())
                .ok_or_else(|| malformed("destination port", line))?;
            self.current.destination_port = Some(port);
        } else if line.starts_with("c=IN IP4") {
            let addr = line
                .split_whitespace()
                .nth(2)
                .ok_or_else(|| malformed("connection address", line))?;
            // Drop the "/ttl" (and any "/count") suffix.
            let group = addr.split('/').next().unwrap_or_default();
            self.current.multicast_ip = Some(group.to_string());
        } else if line.starts_with("a=source-filter:") {
            self.current.source_ip = line.split_whitespace().last().map(str::to_string);
        } else if line.starts_with("a=mid:") {
            let label = line.split(':').nth(1).unwrap_or_default().trim().to_lowercase();
            let finished = std::mem::take(&mut self.current);
            match finished.build() {
                Some(leg) => {
                    tracing::debug!(label = %label, port = leg.destination_port, "committed leg");
                    self.labeled.commit(label, leg);
                }
                None => tracing::debug!(label = %label, "incomplete leg discarded"),
            }
        }
        Ok(self)
    }
}

fn malformed(field: &'static str, line: &str) -> TranslateError {
    TranslateError::MalformedField {
        field,
        line: line.to_string(),
    }
}

// ── Line endings ────────────────────────────────────────────────────

/// Convert `\r\n` and bare `\r` to `\n`.
fn normalize_line_endings(sdp: &str) -> String {
    sdp.replace("\r\n", "\n").replace('\r', "\n")
}

/// Re-serialize with CRLF, collapsing blank lines so no `\r\n\r\n` remains.
fn to_crlf(normalized: &str) -> String {
    let mut out = normalized.replace('\n', "\r\n");
    while out.contains("\r\n\r\n") {
        out = out.replace("\r\n\r\n", "\r\n");
    }
    out
}

// ── Translation ─────────────────────────────────────────────────────

fn select_legs(state: &ScanState) -> Result<Vec<TransportParam>, TranslateError> {
    let labeled = &state.labeled;

    if let (Some(primary), Some(secondary)) = (labeled.get(PRIMARY), labeled.get(SECONDARY)) {
        return Ok(vec![
            TransportParam::Leg(primary.clone()),
            TransportParam::Leg(secondary.clone()),
        ]);
    }
    if let Some(primary) = labeled.get(PRIMARY) {
        return Ok(vec![
            TransportParam::Leg(primary.clone()),
            TransportParam::disabled(),
        ]);
    }
    if let Some(only) = labeled.first() {
        return Ok(vec![TransportParam::Leg(only.clone()), TransportParam::disabled()]);
    }

    // No a=mid at all: fall back to the trailing leg, which must also name a source.
    match state.current.build() {
        Some(leg) if leg.source_ip.as_deref().is_some_and(|s| !s.is_empty()) => {
            Ok(vec![TransportParam::Leg(leg), TransportParam::disabled()])
        }
        _ => Err(TranslateError::Extraction),
    }
}

/// Translate a session description into the PATCH body for a receiver.
///
/// `ports` is the receiver's current leg count; a single-leg receiver gets
/// only the first entry.
pub fn translate(
    sdp: &str,
    sender_id: Option<&str>,
    ports: ReceiverPorts,
) -> Result<TransportDocument, TranslateError> {
    let normalized = normalize_line_endings(sdp);

    let state = normalized
        .lines()
        .try_fold(ScanState::default(), |state, line| state.step(line))?;

    if state.labeled.is_empty() {
        tracing::debug!("no a=mid labels found, using trailing media section");
    }

    let mut transport_params = select_legs(&state)?;
    transport_params.truncate(ports.max_legs());

    tracing::debug!(
        legs = transport_params.len(),
        labels = state.labeled.legs.len(),
        "translated SDP"
    );

    Ok(TransportDocument {
        activation: Activation::immediate(),
        master_enable: true,
        sender_id: sender_id.map(str::to_string),
        transport_file: TransportFile::sdp(to_crlf(&normalized)),
        transport_params,
    })
}
