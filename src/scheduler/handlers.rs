//! Turns fetched documents into feature slot updates.

use tracing::warn;

use crate::accumulator::{FeatureSlot, SlotUpdate};
use crate::bugzilla::{BugComments, BugDetail, BugId, BugMetaResponse, CommentsResponse};
use crate::error::FetchError;
use crate::metrics;
use crate::scoring::{self, Severity};

use super::job::{FetchJob, JobKind};

/// Decode the body fetched for `job` and score it.
pub fn updates_for(job: &FetchJob, body: serde_json::Value) -> Result<Vec<SlotUpdate>, FetchError> {
    match job.kind {
        JobKind::Meta => {
            let bug = decode_meta(job.bug_id, body)?;
            let severity = Severity::parse(&bug.severity);
            if !severity.is_known() {
                metrics::record_unknown_severity();
                warn!(bug_id = %job.bug_id, severity = %bug.severity, "Unknown severity label");
            }
            Ok(meta_updates(&bug, &severity))
        }
        JobKind::Comments => {
            let thread = decode_comments(job.bug_id, body)?;
            Ok(comment_updates(&thread))
        }
    }
}

pub fn decode_meta(bug_id: BugId, body: serde_json::Value) -> Result<BugDetail, FetchError> {
    let response: BugMetaResponse = serde_json::from_value(body)
        .map_err(|e| FetchError::parse(format!("metadata for bug {}", bug_id), e))?;
    response.into_bug(bug_id)
}

pub fn decode_comments(bug_id: BugId, body: serde_json::Value) -> Result<BugComments, FetchError> {
    let response: CommentsResponse = serde_json::from_value(body)
        .map_err(|e| FetchError::parse(format!("comments for bug {}", bug_id), e))?;
    response.into_thread(bug_id)
}

/// The seven metadata slots.
pub fn meta_updates(bug: &BugDetail, severity: &Severity) -> Vec<SlotUpdate> {
    vec![
        SlotUpdate::new(FeatureSlot::CcCount, bug.cc.len() as f64 / 10.0),
        SlotUpdate::new(
            FeatureSlot::BlockDependCount,
            (bug.blocks.len() + bug.depends_on.len()) as f64 / 10.0,
        ),
        SlotUpdate::new(
            FeatureSlot::ReporterScore,
            scoring::reporter_score(bug.reporter_email()),
        ),
        SlotUpdate::new(
            FeatureSlot::ComponentScore,
            scoring::component_score(&bug.product, &bug.component),
        ),
        SlotUpdate::new(
            FeatureSlot::ResolutionScore,
            scoring::resolution_score(&bug.resolution, bug.is_open),
        ),
        SlotUpdate::new(FeatureSlot::SeverityScore, scoring::severity_score(severity)),
        SlotUpdate::new(FeatureSlot::SummaryScore, scoring::summary_score(&bug.summary)),
    ]
}

/// The two comment slots. A thread without comments has zero richness.
pub fn comment_updates(thread: &BugComments) -> Vec<SlotUpdate> {
    let richness = thread
        .comments
        .first()
        .map(|comment| scoring::comment_score(&comment.raw_text))
        .unwrap_or(0.0);

    vec![
        SlotUpdate::new(FeatureSlot::CommentCount, thread.comments.len() as f64 / 100.0),
        SlotUpdate::new(FeatureSlot::FirstCommentRichness, richness),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value_of(updates: &[SlotUpdate], slot: FeatureSlot) -> f64 {
        updates
            .iter()
            .find(|u| u.slot == slot)
            .map(|u| u.value)
            .expect("slot present")
    }

    fn meta_body() -> serde_json::Value {
        json!({"bugs": [{
            "id": 1100,
            "cc": ["a@example.com", "b@example.com", "c@example.com"],
            "blocks": [1],
            "depends_on": [2, 3, 4],
            "creator_detail": {"email": "dev@mozilla.com"},
            "product": "Core",
            "component": "Graphics",
            "resolution": "",
            "is_open": true,
            "severity": "major",
            "summary": "[e10s] gfx crash"
        }]})
    }

    #[test]
    fn test_meta_job_fills_seven_slots() {
        let job = FetchJob::new(BugId::new(1100), JobKind::Meta, "u");
        let updates = updates_for(&job, meta_body()).expect("updates");

        assert_eq!(updates.len(), 7);
        let slots: Vec<FeatureSlot> = updates.iter().map(|u| u.slot).collect();
        assert_eq!(slots, FeatureSlot::META.to_vec());

        assert!((value_of(&updates, FeatureSlot::CcCount) - 0.3).abs() < 1e-9);
        assert!((value_of(&updates, FeatureSlot::BlockDependCount) - 0.4).abs() < 1e-9);
        assert_eq!(value_of(&updates, FeatureSlot::ReporterScore), 1.0);
        assert_eq!(value_of(&updates, FeatureSlot::ComponentScore), 1.0);
        assert_eq!(value_of(&updates, FeatureSlot::ResolutionScore), 1.0);
        assert!((value_of(&updates, FeatureSlot::SeverityScore) - 0.4).abs() < 1e-9);
        // 3 words + gfx + tag
        assert!((value_of(&updates, FeatureSlot::SummaryScore) - 1.53).abs() < 1e-9);
    }

    #[test]
    fn test_comments_job_fills_two_slots() {
        let job = FetchJob::new(BugId::new(1100), JobKind::Comments, "u");
        let body = json!({"bugs": {"1100": {"comments": [
            {"raw_text": "steps to reproduce here"},
            {"raw_text": "confirmed"}
        ]}}});
        let updates = updates_for(&job, body).expect("updates");

        assert_eq!(updates.len(), 2);
        assert!((value_of(&updates, FeatureSlot::CommentCount) - 0.02).abs() < 1e-9);
        assert!((value_of(&updates, FeatureSlot::FirstCommentRichness) - 0.004).abs() < 1e-9);
    }

    #[test]
    fn test_empty_thread_scores_zero_richness() {
        let updates = comment_updates(&BugComments::default());
        assert_eq!(value_of(&updates, FeatureSlot::CommentCount), 0.0);
        assert_eq!(value_of(&updates, FeatureSlot::FirstCommentRichness), 0.0);
    }

    #[test]
    fn test_wrong_shape_is_parse_error() {
        let job = FetchJob::new(BugId::new(5), JobKind::Meta, "u");
        let err = updates_for(&job, json!({"error": true, "message": "nope"})).unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
        assert!(!err.is_transport());

        let job = FetchJob::new(BugId::new(5), JobKind::Comments, "u");
        let err = updates_for(&job, json!({"bugs": {"6": {"comments": []}}})).unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
    }

    #[test]
    fn test_unknown_severity_scores_below_scale() {
        let mut body = meta_body();
        body["bugs"][0]["severity"] = json!("S3");
        let job = FetchJob::new(BugId::new(1100), JobKind::Meta, "u");
        let updates = updates_for(&job, body).expect("updates");
        assert!((value_of(&updates, FeatureSlot::SeverityScore) + 0.1).abs() < 1e-9);
    }
}
