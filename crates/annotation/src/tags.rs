/// Tag codes scored by the evaluator.
///
/// The code strings (`<rms`, `t>`, …) double as markup prefixes and as the
/// column-name fragments in the result tables, so they are kept verbatim
/// rather than normalised.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumIter,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum Tag {
    /// First word of a reparandum.
    #[strum(serialize = "<rms")]
    ReparandumStart,
    /// Non-initial reparandum word.
    #[strum(serialize = "<rm")]
    Reparandum,
    /// Interregnum word between reparandum and repair.
    #[strum(serialize = "<i")]
    Interregnum,
    /// Edit term outside any repair structure.
    #[strum(serialize = "<e")]
    EditTerm,
    /// First word of a repair.
    #[strum(serialize = "<rps")]
    RepairStart,
    /// Non-initial repair word.
    #[strum(serialize = "<rp")]
    Repair,
    /// Last word of a repair, subtype unspecified.
    #[strum(serialize = "<rpn")]
    RepairEnd,
    /// Repair end, repetition subtype.
    #[strum(serialize = "<rpnrep")]
    RepairEndRep,
    /// Repair end, substitution subtype.
    #[strum(serialize = "<rpnsub")]
    RepairEndSub,
    /// Repair end, deletion subtype.
    #[strum(serialize = "<rpndel")]
    RepairEndDel,
    /// Last word of a speaker turn.
    #[strum(serialize = "t>")]
    TurnFinal,
}

impl Tag {
    pub fn code(&self) -> String {
        self.to_string()
    }

    /// Whether exact matching for this tag requires the repair-id anchor to
    /// resolve to the same reparandum onset on both sides.
    pub fn is_repair_linked(&self) -> bool {
        !matches!(self, Tag::EditTerm | Tag::TurnFinal)
    }
}

/// Individually scored tags, in report column order.
pub const ACC_TAGS: [Tag; 11] = [
    Tag::ReparandumStart,
    Tag::Reparandum,
    Tag::Interregnum,
    Tag::EditTerm,
    Tag::RepairStart,
    Tag::Repair,
    Tag::RepairEnd,
    Tag::RepairEndRep,
    Tag::RepairEndSub,
    Tag::RepairEndDel,
    Tag::TurnFinal,
];

/// Subtags pooled into the combined structural class: the onsets of the
/// three repair regions plus the interregnum.
pub const COMBINED_TAGS: [Tag; 3] = [Tag::ReparandumStart, Tag::Interregnum, Tag::RepairStart];

/// Report key for the pooled class.
pub const COMBINED_KEY: &str = "<rms.<i.<rps";

/// Tags additionally scored with window-relaxed matching.
pub const RELAXED_TAGS: [Tag; 3] = [Tag::RepairStart, Tag::EditTerm, Tag::TurnFinal];

/// Tags for which time-to-detection is tracked.
pub const TTD_TAGS: [Tag; 4] = [
    Tag::ReparandumStart,
    Tag::RepairStart,
    Tag::EditTerm,
    Tag::TurnFinal,
];

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn codes_match_markup_vocabulary() {
        assert_eq!(Tag::ReparandumStart.code(), "<rms");
        assert_eq!(Tag::RepairEndDel.code(), "<rpndel");
        assert_eq!(Tag::TurnFinal.code(), "t>");
    }

    #[test]
    fn acc_tags_cover_every_variant() {
        assert_eq!(Tag::iter().count(), ACC_TAGS.len());
        for tag in Tag::iter() {
            assert!(ACC_TAGS.contains(&tag));
        }
    }

    #[test]
    fn relaxed_and_ttd_are_subsets_of_acc() {
        assert!(RELAXED_TAGS.iter().all(|t| ACC_TAGS.contains(t)));
        assert!(TTD_TAGS.iter().all(|t| ACC_TAGS.contains(t)));
    }
}
