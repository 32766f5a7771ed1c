//! Interception eligibility for outbound requests.
//!
//! Only idempotent same-origin traffic is worth intercepting: non-GET
//! requests carry side effects, and cross-origin requests would leave the
//! agent hanging on third parties it cannot vouch for.

use crate::request::OutboundRequest;
use reqwest::Method;
use url::Url;

/// Why a request was not intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NonGet,
    CrossOrigin,
}

/// Result of classifying an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// The request goes through the resolution strategy.
    Eligible,
    /// The request passes straight through to the host's own networking.
    Skip(SkipReason),
}

/// Decide whether a request is eligible for interception.
///
/// Pure function; performs no lookups and no I/O.
pub fn classify(request: &OutboundRequest, own_origin: &Url) -> Eligibility {
    if request.method != Method::GET {
        return Eligibility::Skip(SkipReason::NonGet);
    }

    if request.url.origin() != own_origin.origin() {
        return Eligibility::Skip(SkipReason::CrossOrigin);
    }

    Eligibility::Eligible
}
