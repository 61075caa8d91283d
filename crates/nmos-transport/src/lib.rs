//! SDP to NMOS IS-05 translation.
//!
//! This crate contains:
//! - **Data model** — transport legs, the disabled placeholder, and the
//!   ordered PATCH document sent to a receiver's staged endpoint
//! - **Translator** — turns a multicast RTP session description into that
//!   document, honouring the receiver's leg count (single or redundant)

pub mod model;
pub mod translate;

pub use model::{
    Activation, ActivationMode, DisabledLeg, ReceiverPorts, TransportDocument, TransportFile,
    TransportLeg, TransportParam,
};
pub use translate::{TranslateError, translate};
