//! IS-05 transport types.
//!
//! Struct field order matches the order the fields appear in the JSON sent to
//! the receiver; serde preserves declaration order when serializing.

use serde::{Deserialize, Serialize};

/// MIME type of the embedded transport file.
pub const SDP_MIME_TYPE: &str = "application/sdp";

// ── Activation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    ActivateImmediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    pub mode: ActivationMode,
}

impl Activation {
    pub fn immediate() -> Self {
        Self {
            mode: ActivationMode::ActivateImmediate,
        }
    }
}

// ── Transport params ────────────────────────────────────────────────

/// One RTP leg of a receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportLeg {
    pub destination_port: u16,
    pub multicast_ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    pub rtp_enabled: bool,
}

/// Placeholder for an unused leg: serializes as `{"rtp_enabled": false}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisabledLeg {
    pub rtp_enabled: bool,
}

impl Default for DisabledLeg {
    fn default() -> Self {
        Self { rtp_enabled: false }
    }
}

/// A single `transport_params` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransportParam {
    Leg(TransportLeg),
    Disabled(DisabledLeg),
}

impl TransportParam {
    pub fn disabled() -> Self {
        TransportParam::Disabled(DisabledLeg::default())
    }

    pub fn as_leg(&self) -> Option<&TransportLeg> {
        match self {
            TransportParam::Leg(leg) => Some(leg),
            TransportParam::Disabled(_) => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, TransportParam::Disabled(_))
    }
}

// ── Document ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportFile {
    pub data: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

impl TransportFile {
    pub fn sdp(data: String) -> Self {
        Self {
            data,
            mime_type: SDP_MIME_TYPE.to_string(),
        }
    }
}

/// PATCH body committed to a receiver's staged endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportDocument {
    pub activation: Activation,
    pub master_enable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    pub transport_file: TransportFile,
    pub transport_params: Vec<TransportParam>,
}

/// Number of RTP legs a receiver is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverPorts {
    /// One leg, no redundancy.
    Single,
    /// Primary and secondary legs (ST 2022-7 style).
    Redundant,
}

impl ReceiverPorts {
    /// Map a receiver's current `transport_params` length to a leg count.
    ///
    /// Only an explicit single entry restricts the output; anything else
    /// keeps both legs.
    pub fn from_param_count(count: usize) -> Self {
        if count == 1 {
            ReceiverPorts::Single
        } else {
            if count != 2 {
                tracing::warn!(count, "unexpected transport_params length, assuming two legs");
            }
            ReceiverPorts::Redundant
        }
    }

    pub fn max_legs(self) -> usize {
        match self {
            ReceiverPorts::Single => 1,
            ReceiverPorts::Redundant => 2,
        }
    }
}
