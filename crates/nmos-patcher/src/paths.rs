//! IS-05 resource paths.

/// Staged/active URL pair for one receiver, fixed for the rest of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedPath {
    pub staged: String,
    pub active: String,
}

impl NegotiatedPath {
    pub fn from_staged(staged: String) -> Self {
        let active = active_from_staged(&staged);
        Self { staged, active }
    }
}

/// Builds a staged URL from a receiver base URL.
pub type StagedPathBuilder = fn(&str) -> String;

/// Spellings of the staged endpoint, in the order they are probed.
///
/// Some connection API implementations only route the trailing-slash form,
/// others only the bare form.
pub const STAGED_CANDIDATES: [(&str, StagedPathBuilder); 2] = [
    ("trailing slash", staged_with_slash),
    ("no trailing slash", staged_without_slash),
];

pub fn staged_with_slash(base: &str) -> String {
    format!("{}/staged/", base.trim_end_matches('/'))
}

pub fn staged_without_slash(base: &str) -> String {
    format!("{}/staged", base.trim_end_matches('/'))
}

/// Swap the last `staged` segment for `active` and ensure a trailing slash.
pub fn active_from_staged(staged: &str) -> String {
    let mut active = match staged.rfind("staged") {
        Some(idx) => format!("{}active{}", &staged[..idx], &staged[idx + "staged".len()..]),
        None => staged.to_string(),
    };
    if !active.ends_with('/') {
        active.push('/');
    }
    active
}

/// `{root}/x-nmos/connection/{version}/single/receivers/{receiver_id}`
pub fn receiver_base(root: &str, version: &str, receiver_id: &str) -> String {
    format!(
        "{}/x-nmos/connection/{}/single/receivers/{}",
        root.trim_end_matches('/'),
        version.trim_matches('/'),
        receiver_id
    )
}
