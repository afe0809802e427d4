//! # Linkdeck Linkcheck
//!
//! Validates and probes a candidate URL before it is accepted into the link
//! library.
//!
//! - [`normalize_url`]: adds `https://` to bare domains
//! - [`LinkReachabilityChecker`]: HEAD then GET probe with a timeout, plus
//!   `<title>`, description and favicon scraping for HTML pages
//! - [`relay`]: the dev-mode `GET /api/linkcheck` service, for contexts
//!   where the probe cannot be made directly
//!
//! Probing never fails from the caller's point of view: every network or
//! parsing problem ends up in [`LinkCheckResult::error`] with
//! `reachable: false`.
//!
//! ```rust,ignore
//! use linkdeck_linkcheck::{CheckOptions, CheckerConfig, LinkReachabilityChecker};
//!
//! let checker = LinkReachabilityChecker::new(CheckerConfig::default())?;
//! let result = checker.check("example.com", CheckOptions::default()).await;
//! assert_eq!(result.normalized_url, "https://example.com");
//! ```

pub mod checker;
pub mod error;
pub mod meta;
pub mod normalize;
mod probe;
pub mod relay;

pub use checker::{CheckMode, CheckOptions, CheckerConfig, LinkCheckResult, LinkReachabilityChecker};
pub use error::LinkCheckError;
pub use meta::PageMeta;
pub use normalize::{is_http_url, normalize_url};
pub use relay::{RelayResponse, RelayState, relay_router};

/// Default probe timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 6_000;
