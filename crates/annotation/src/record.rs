use std::collections::BTreeMap;
use std::fmt;

use crate::markup::Markup;

/// Key of one speaker side of one dialogue, `{dialogue}:{speaker}`.
///
/// All per-speaker structures are keyed by this; `BTreeMap` ordering gives
/// the deterministic sorted-key processing order the output tables rely on.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct SpeakerKey {
    pub dialogue: String,
    pub speaker: String,
}

impl SpeakerKey {
    pub fn new(dialogue: impl Into<String>, speaker: impl Into<String>) -> Self {
        Self {
            dialogue: dialogue.into(),
            speaker: speaker.into(),
        }
    }
}

impl fmt::Display for SpeakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dialogue, self.speaker)
    }
}

/// One annotated word/interval of a speaker's dialogue.
///
/// `index` is the interval index from the corpus row id; word-level scoring
/// walks records positionally, interval-level scoring aligns on `index`.
/// Gold records are immutable once loaded; hypothesis records are replaced
/// snapshot by snapshot until the stream stabilises.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Record {
    pub index: u32,
    pub start: f64,
    pub end: f64,
    pub word: String,
    pub pos: String,
    pub markup: Markup,
}

/// One incremental hypothesis revision: the rows that became available (or
/// were re-labelled) at `time`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub time: f64,
    pub rows: Vec<Record>,
}

pub type SpeakerRecords = BTreeMap<SpeakerKey, Vec<Record>>;
pub type SpeakerSnapshots = BTreeMap<SpeakerKey, Vec<Snapshot>>;
