//! Default `web-fetch` host allowlist for `network: defaults`.
//!
//! The upstream source's allowlist evolves over time and spec.md §9
//! explicitly calls out that the exact default set should not be guessed.
//! This pins a snapshot rather than inventing a "complete" policy; it is
//! documented as a point-in-time list, not a live-updated one.

/// Snapshot date: 2026-07-26. Revisit against upstream before relying on
/// this for anything beyond local development.
pub const DEFAULT_ALLOWED_DOMAINS: &[&str] = &[
    "github.com",
    "api.github.com",
    "raw.githubusercontent.com",
    "objects.githubusercontent.com",
    "codeload.github.com",
];

pub fn is_default_allowed(domain: &str) -> bool {
    DEFAULT_ALLOWED_DOMAINS.iter().any(|d| *d == domain)
}
