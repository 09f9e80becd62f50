//! Response shapes for the Bugzilla REST API.
//!
//! Only the fields the feature extractor reads are modelled. Required fields
//! are required here too, so a response with the wrong shape fails to decode
//! instead of feeding undefined values into the scores.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::FetchError;

/// Opaque identity of a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BugId(u64);

impl BugId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BugId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BugId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(BugId)
    }
}

impl From<u64> for BugId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Result of a `/rest/bug?...` search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub bugs: Vec<BugSummary>,
}

/// One entry of a search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugSummary {
    pub id: BugId,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Result of `/rest/bug/<id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugMetaResponse {
    pub bugs: Vec<BugDetail>,
}

impl BugMetaResponse {
    /// The single bug this response is expected to carry.
    pub fn into_bug(self, bug_id: BugId) -> Result<BugDetail, FetchError> {
        self.bugs.into_iter().next().ok_or_else(|| {
            FetchError::parse(
                format!("metadata for bug {}", bug_id),
                "response contains no bugs",
            )
        })
    }
}

/// Metadata of a single bug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugDetail {
    pub id: BugId,
    pub cc: Vec<String>,
    pub blocks: Vec<u64>,
    pub depends_on: Vec<u64>,
    #[serde(default)]
    pub creator_detail: Option<CreatorDetail>,
    pub product: String,
    pub component: String,
    pub resolution: String,
    pub is_open: bool,
    pub severity: String,
    pub summary: String,
}

impl BugDetail {
    /// Reporter address, if the tracker exposed one.
    pub fn reporter_email(&self) -> Option<&str> {
        self.creator_detail
            .as_ref()
            .and_then(|detail| detail.email.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatorDetail {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
}

/// Result of `/rest/bug/<id>/comment`, keyed by the bug id as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentsResponse {
    pub bugs: HashMap<String, BugComments>,
}

impl CommentsResponse {
    /// Take the comment thread of `bug_id` out of the response.
    pub fn into_thread(mut self, bug_id: BugId) -> Result<BugComments, FetchError> {
        self.bugs.remove(&bug_id.to_string()).ok_or_else(|| {
            FetchError::parse(
                format!("comments for bug {}", bug_id),
                "response has no entry for this bug",
            )
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BugComments {
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub raw_text: String,
    #[serde(default)]
    pub creator: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bug_id_parse_and_display() {
        let id: BugId = " 1093402 ".parse().expect("should parse");
        assert_eq!(id, BugId::new(1093402));
        assert_eq!(id.to_string(), "1093402");
        assert!("abc".parse::<BugId>().is_err());
    }

    #[test]
    fn test_search_response_decodes_ids() {
        let body = json!({"bugs": [{"id": 1, "summary": "a"}, {"id": 2}]});
        let response: SearchResponse = serde_json::from_value(body).expect("should decode");
        let ids: Vec<BugId> = response.bugs.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![BugId::new(1), BugId::new(2)]);
    }

    #[test]
    fn test_meta_response_requires_fields() {
        let body = json!({"bugs": [{"id": 7, "cc": []}]});
        assert!(serde_json::from_value::<BugMetaResponse>(body).is_err());
    }

    #[test]
    fn test_meta_response_without_creator_detail() {
        let body = json!({"bugs": [{
            "id": 7, "cc": ["a"], "blocks": [], "depends_on": [1, 2],
            "product": "Core", "component": "DOM", "resolution": "",
            "is_open": true, "severity": "normal", "summary": "crash"
        }]});
        let response: BugMetaResponse = serde_json::from_value(body).expect("should decode");
        let bug = response.into_bug(BugId::new(7)).expect("one bug");
        assert!(bug.reporter_email().is_none());
        assert_eq!(bug.depends_on.len(), 2);
    }

    #[test]
    fn test_empty_meta_response_is_a_parse_error() {
        let response = BugMetaResponse { bugs: Vec::new() };
        let err = response.into_bug(BugId::new(9)).unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
        assert!(err.to_string().contains("bug 9"));
    }

    #[test]
    fn test_comments_response_lookup() {
        let body = json!({"bugs": {"42": {"comments": [{"raw_text": "first"}]}}});
        let response: CommentsResponse = serde_json::from_value(body).expect("should decode");
        let thread = response.into_thread(BugId::new(42)).expect("thread");
        assert_eq!(thread.comments[0].raw_text, "first");

        let body = json!({"bugs": {"42": {"comments": []}}});
        let response: CommentsResponse = serde_json::from_value(body).expect("should decode");
        assert!(response.into_thread(BugId::new(43)).is_err());
    }
}
