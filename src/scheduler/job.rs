//! Fetch job definitions.
//!
//! Every bug produces exactly two jobs: one for its metadata and one for its
//! comment thread. Jobs are immutable descriptions of network work.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bugzilla::{BugId, BugzillaEndpoints};

/// Which resource of a bug a job fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Meta,
    Comments,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Meta => "meta",
            JobKind::Comments => "comments",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of network work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchJob {
    pub bug_id: BugId,
    pub kind: JobKind,
    /// URL of the resource to fetch.
    pub locator: String,
}

impl FetchJob {
    pub fn new(bug_id: BugId, kind: JobKind, locator: impl Into<String>) -> Self {
        Self {
            bug_id,
            kind,
            locator: locator.into(),
        }
    }

    /// The metadata and comments jobs for `bug_id`, in that order.
    pub fn pair_for(bug_id: BugId, endpoints: &BugzillaEndpoints) -> [FetchJob; 2] {
        [
            FetchJob::new(bug_id, JobKind::Meta, endpoints.meta_url(bug_id)),
            FetchJob::new(bug_id, JobKind::Comments, endpoints.comments_url(bug_id)),
        ]
    }
}
