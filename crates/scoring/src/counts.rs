use std::collections::BTreeMap;

use disfl_annotation::{COMBINED_TAGS, Tag};

/// Hit / false-alarm / miss counters for one tag class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TagCounts {
    pub hits: u64,
    pub false_alarms: u64,
    pub misses: u64,
}

impl TagCounts {
    pub fn merge(&mut self, other: &TagCounts) {
        self.hits += other.hits;
        self.false_alarms += other.false_alarms;
        self.misses += other.misses;
    }
}

/// Boundary error counters for NIST_SU: errors are normalised by the number
/// of gold boundaries, not by word count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NistCounts {
    pub false_alarms: u64,
    pub misses: u64,
    pub gold_boundaries: u64,
}

impl NistCounts {
    pub fn merge(&mut self, other: &NistCounts) {
        self.false_alarms += other.false_alarms;
        self.misses += other.misses;
        self.gold_boundaries += other.gold_boundaries;
    }
}

/// Unit error counters for DSER and SegER: a count of wrong units over a
/// count of gold units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SegCounts {
    pub errors: u64,
    pub total: u64,
}

impl SegCounts {
    pub fn merge(&mut self, other: &SegCounts) {
        self.errors += other.errors;
        self.total += other.total;
    }
}

/// All corpus-level counters for one scoring granularity (word or interval).
///
/// Per-tag counters accumulate across speakers; derived metrics are computed
/// once at report time from the summed counts.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CountTable {
    pub tags: BTreeMap<Tag, TagCounts>,
    pub relaxed: BTreeMap<Tag, TagCounts>,
    pub nist_su: NistCounts,
    pub dser: SegCounts,
    pub seg_er: SegCounts,
}

impl CountTable {
    pub fn tag(&self, tag: Tag) -> TagCounts {
        self.tags.get(&tag).copied().unwrap_or_default()
    }

    pub fn tag_mut(&mut self, tag: Tag) -> &mut TagCounts {
        self.tags.entry(tag).or_default()
    }

    pub fn relaxed(&self, tag: Tag) -> TagCounts {
        self.relaxed.get(&tag).copied().unwrap_or_default()
    }

    pub fn relaxed_mut(&mut self, tag: Tag) -> &mut TagCounts {
        self.relaxed.entry(tag).or_default()
    }

    /// Pooled counts over the reparandum-start, interregnum and repair-start
    /// classes.
    pub fn combined(&self) -> TagCounts {
        let mut pooled = TagCounts::default();
        for tag in COMBINED_TAGS {
            pooled.merge(&self.tag(tag));
        }
        pooled
    }

    pub fn merge(&mut self, other: &CountTable) {
        for (tag, counts) in &other.tags {
            self.tag_mut(*tag).merge(counts);
        }
        for (tag, counts) in &other.relaxed {
            self.relaxed_mut(*tag).merge(counts);
        }
        self.nist_su.merge(&other.nist_su);
        self.dser.merge(&other.dser);
        self.seg_er.merge(&other.seg_er);
    }
}
