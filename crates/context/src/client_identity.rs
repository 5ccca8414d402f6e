/// Identifies the caller behind a request, for rate accounting (§5) and
/// logging. Derived from the inbound bearer token; opaque beyond that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Stable identifier derived from the inbound credential (e.g. a hash
    /// of the bearer token). Never the raw credential itself.
    pub client_id: String,
}
