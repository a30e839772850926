//! Action history
//!
//! Every mutating operation leaves one summary event on the
//! `reia::history` target. Route that target to a file or collector with
//! the subscriber's filter to keep an audit trail. Dry runs never call
//! into this module.

use serde::Serialize;

/// Target used for history events
pub const HISTORY_TARGET: &str = "reia::history";

/// Record a completed action
///
/// `details` is serialized to JSON and attached to the event.
pub fn record<D: Serialize>(utility: &str, action: &str, message: &str, details: &D) {
    let details = serde_json::to_string(details).unwrap_or_default();
    tracing::info!(target: HISTORY_TARGET, utility, action, details = %details, "{message}");
}

