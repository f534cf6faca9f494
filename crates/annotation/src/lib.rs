pub mod markup;
pub mod record;
pub mod tags;

pub use markup::{BoundaryTag, DisfluencyEvent, Markup, MarkupError, RepairSubtype};
pub use record::{Record, Snapshot, SpeakerKey, SpeakerRecords, SpeakerSnapshots};
pub use tags::{ACC_TAGS, COMBINED_KEY, COMBINED_TAGS, RELAXED_TAGS, TTD_TAGS, Tag};
