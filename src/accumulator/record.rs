//! Per-bug feature records.

use serde::Serialize;
use std::fmt;

/// Number of features in every dataset line.
pub const FEATURE_COUNT: usize = 9;

/// A named position in the feature vector, in dataset column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSlot {
    CcCount,
    BlockDependCount,
    ReporterScore,
    ComponentScore,
    ResolutionScore,
    SeverityScore,
    SummaryScore,
    CommentCount,
    FirstCommentRichness,
}

impl FeatureSlot {
    /// Every slot, in column order.
    pub const ALL: [FeatureSlot; FEATURE_COUNT] = [
        FeatureSlot::CcCount,
        FeatureSlot::BlockDependCount,
        FeatureSlot::ReporterScore,
        FeatureSlot::ComponentScore,
        FeatureSlot::ResolutionScore,
        FeatureSlot::SeverityScore,
        FeatureSlot::SummaryScore,
        FeatureSlot::CommentCount,
        FeatureSlot::FirstCommentRichness,
    ];

    /// Slots filled from a bug's metadata.
    pub const META: [FeatureSlot; 7] = [
        FeatureSlot::CcCount,
        FeatureSlot::BlockDependCount,
        FeatureSlot::ReporterScore,
        FeatureSlot::ComponentScore,
        FeatureSlot::ResolutionScore,
        FeatureSlot::SeverityScore,
        FeatureSlot::SummaryScore,
    ];

    /// Slots filled from a bug's comment thread.
    pub const COMMENTS: [FeatureSlot; 2] =
        [FeatureSlot::CommentCount, FeatureSlot::FirstCommentRichness];

    /// Zero-based column index. The dataset file uses `index() + 1`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            FeatureSlot::CcCount => "cc_count",
            FeatureSlot::BlockDependCount => "block_depend_count",
            FeatureSlot::ReporterScore => "reporter_score",
            FeatureSlot::ComponentScore => "component_score",
            FeatureSlot::ResolutionScore => "resolution_score",
            FeatureSlot::SeverityScore => "severity_score",
            FeatureSlot::SummaryScore => "summary_score",
            FeatureSlot::CommentCount => "comment_count",
            FeatureSlot::FirstCommentRichness => "first_comment_richness",
        }
    }
}

impl fmt::Display for FeatureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value destined for one slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotUpdate {
    pub slot: FeatureSlot,
    pub value: f64,
}

impl SlotUpdate {
    pub fn new(slot: FeatureSlot, value: f64) -> Self {
        Self { slot, value }
    }
}

/// A complete, ordered feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    pub fn get(&self, slot: FeatureSlot) -> f64 {
        self.0[slot.index()]
    }
}

/// The partially filled features of one bug.
///
/// A record is complete once all nine slots hold a value, whichever job
/// delivered them and in whatever order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BugRecord {
    slots: [Option<f64>; FEATURE_COUNT],
    written: bool,
}

impl BugRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, update: SlotUpdate) {
        self.slots[update.slot.index()] = Some(update.value);
    }

    pub fn get(&self, slot: FeatureSlot) -> Option<f64> {
        self.slots[slot.index()]
    }

    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.filled() == FEATURE_COUNT
    }

    pub fn is_written(&self) -> bool {
        self.written
    }

    pub(crate) fn mark_written(&mut self) {
        self.written = true;
    }

    /// Slots still waiting for a value.
    pub fn missing(&self) -> Vec<FeatureSlot> {
        FeatureSlot::ALL
            .into_iter()
            .filter(|slot| self.slots[slot.index()].is_none())
            .collect()
    }

    /// The feature vector, once every slot is filled.
    pub fn features(&self) -> Option<FeatureVector> {
        let mut values = [0.0; FEATURE_COUNT];
        for (value, slot) in values.iter_mut().zip(self.slots.iter()) {
            *value = (*slot)?;
        }
        Some(FeatureVector(values))
    }
}
