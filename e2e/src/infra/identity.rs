//! Resolving the OS identity that scopes stack names.

use crate::domain::stack::normalize_identity;

/// Variables consulted in order for the current user name.
const USER_VARS: &[&str] = &["USER", "LOGNAME", "USERNAME"];

/// The normalised identity of the user running this process.
///
/// Falls back to the placeholder when no user variable is set.
#[must_use]
pub fn current_identity() -> String {
    let raw = USER_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()));
    normalize_identity(raw.as_deref())
}
