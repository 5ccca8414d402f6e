//! Per-token-record state machine (spec §4.4 "State machine per token record").

/// One token record's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Nothing loaded from disk yet.
    Unloaded,
    /// A load or refresh attempt is in flight (only observable briefly;
    /// the per-record mutex means no other task can observe it mid-flight).
    Loading,
    /// A non-expired access token is cached and ready to serve.
    Valid,
    /// A refresh-token exchange is in flight.
    Refreshing,
    /// Waiting on the user to complete the portal/callback round trip.
    DeviceCodePending,
    /// Explicitly revoked, or a device-code flow timed out. Requires a
    /// fresh interactive flow (non-static aliases) to leave this state.
    Revoked,
}
