/// Classification for fallback policy.
///
/// Used by the geocoding chain to decide whether a failing tier lets the
/// next tier run.
///
/// # Behavior Summary
///
/// | Class | Try Next Tier? |
/// |-------|----------------|
/// | `Never` | No |
/// | `NextTier` | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never fall through - the request itself is invalid or the failure is
    /// local (storage, serialization) and another tier would fail the same way.
    Never,

    /// Fall through to the next tier.
    ///
    /// Used for upstream failures (network, rate limiting, timeouts) and for
    /// answers that were rejected by the plausibility check.
    NextTier,
}
