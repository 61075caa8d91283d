//! NMOS SDP patcher.
//!
//! Pushes an SDP session description to an IS-05 receiver:
//! - **api** — the HTTP collaborator (`ConnectionApi`, `reqwest` client)
//! - **discovery** — IS-04 senders/receivers, manifests, API versions
//! - **paths** — staged/active URL spellings
//! - **negotiate** — probe, leg-count discovery, commit, verify
//! - **select** — numbered prompts for interactive use
//! - **config** — TOML settings and `host[:port]` endpoints

pub mod api;
pub mod config;
pub mod discovery;
pub mod negotiate;
pub mod paths;
pub mod select;

pub use api::{ApiError, ConnectionApi, HttpClient};
pub use negotiate::{NegotiateError, NegotiationOutcome, Negotiator, Phase};
pub use paths::NegotiatedPath;
