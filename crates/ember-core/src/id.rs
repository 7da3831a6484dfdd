//! Identifier generation

use crate::clock::now_millis;

/// Generate an identifier of the form `<PREFIX>-<millis>-<random>`.
///
/// The random suffix is nine lowercase hex characters, so ids created in the
/// same millisecond still differ.
pub fn prefixed_id(prefix: &str) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, now_millis(), &random[..9])
}

/// Generate a process-unique job identifier
pub fn job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
