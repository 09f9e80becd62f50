//! Bugzilla REST access.
//!
//! - `types`: response shapes for search, bug metadata and comment threads
//! - `client`: the [`BugSource`] seam and its HTTP implementation

pub mod client;
pub mod types;

pub use client::{
    BugSource, BugzillaClient, BugzillaClientConfig, BugzillaEndpoints, DEFAULT_BASE_URL,
    DEFAULT_USER_AGENT,
};
pub use types::*;
