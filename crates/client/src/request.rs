//! The intercepted outbound request model.

use reqwest::Method;
use stowage_core::cache::request_identity;
use url::Url;

/// How the host issued the request.
///
/// Top-level navigations get shell-fallback treatment when the network is
/// unreachable; subresources simply fail through to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Navigation,
    Subresource,
}

/// An outbound request intercepted from the application.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub disposition: Disposition,
}

impl OutboundRequest {
    /// A plain subresource GET.
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, disposition: Disposition::Subresource }
    }

    /// A top-level navigation GET.
    pub fn navigation(url: Url) -> Self {
        Self { method: Method::GET, url, disposition: Disposition::Navigation }
    }

    /// The cache identity for this request.
    pub fn identity(&self) -> String {
        request_identity(self.method.as_str(), self.url.as_str())
    }

    pub fn is_navigation(&self) -> bool {
        self.disposition == Disposition::Navigation
    }
}
