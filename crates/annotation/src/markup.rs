use std::fmt;

use crate::tags::Tag;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MarkupError {
    #[error("markup token does not start with '<': {0:?}")]
    NotATag(String),
    #[error("unterminated markup token: {0:?}")]
    Unterminated(String),
    #[error("unknown markup tag: {0:?}")]
    UnknownTag(String),
    #[error("malformed attribute in {0:?}")]
    MalformedAttribute(String),
    #[error("tag {0:?} requires a repair id")]
    MissingId(String),
    #[error("more than one utterance boundary tag")]
    DuplicateBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RepairSubtype {
    Repetition,
    Substitution,
    Deletion,
}

/// One disfluency event anchored to a word, parsed out of the raw markup.
///
/// Repair-structure events carry the repair id that links reparandum,
/// interregnum and repair positions of the same repair within a speaker's
/// dialogue.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DisfluencyEvent {
    ReparandumStart { id: String },
    Reparandum { id: String },
    Interregnum { id: String },
    EditTerm,
    RepairStart { id: String },
    Repair { id: String },
    RepairEnd { id: String, subtype: Option<RepairSubtype> },
}

impl DisfluencyEvent {
    pub fn tag(&self) -> Tag {
        match self {
            DisfluencyEvent::ReparandumStart { .. } => Tag::ReparandumStart,
            DisfluencyEvent::Reparandum { .. } => Tag::Reparandum,
            DisfluencyEvent::Interregnum { .. } => Tag::Interregnum,
            DisfluencyEvent::EditTerm => Tag::EditTerm,
            DisfluencyEvent::RepairStart { .. } => Tag::RepairStart,
            DisfluencyEvent::Repair { .. } => Tag::Repair,
            DisfluencyEvent::RepairEnd { .. } => Tag::RepairEnd,
        }
    }

    pub fn repair_id(&self) -> Option<&str> {
        match self {
            DisfluencyEvent::ReparandumStart { id }
            | DisfluencyEvent::Reparandum { id }
            | DisfluencyEvent::Interregnum { id }
            | DisfluencyEvent::RepairStart { id }
            | DisfluencyEvent::Repair { id }
            | DisfluencyEvent::RepairEnd { id, .. } => Some(id),
            DisfluencyEvent::EditTerm => None,
        }
    }
}

/// Utterance boundary state of a word: whether a turn starts at it and
/// whether the turn ends after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BoundaryTag {
    /// `<cc/>`: mid-turn word.
    ContinueContinue,
    /// `<ct/>`: turn ends after this word.
    ContinueTurnFinal,
    /// `<tc/>`: turn starts at this word.
    TurnStartContinue,
    /// `<tt/>`: single-word turn.
    TurnStartTurnFinal,
}

impl BoundaryTag {
    pub fn is_turn_final(&self) -> bool {
        matches!(
            self,
            BoundaryTag::ContinueTurnFinal | BoundaryTag::TurnStartTurnFinal
        )
    }

    pub fn is_turn_start(&self) -> bool {
        matches!(
            self,
            BoundaryTag::TurnStartContinue | BoundaryTag::TurnStartTurnFinal
        )
    }

    fn code(&self) -> &'static str {
        match self {
            BoundaryTag::ContinueContinue => "<cc/>",
            BoundaryTag::ContinueTurnFinal => "<ct/>",
            BoundaryTag::TurnStartContinue => "<tc/>",
            BoundaryTag::TurnStartTurnFinal => "<tt/>",
        }
    }
}

/// Parsed annotation of one word: zero or more disfluency events plus an
/// optional utterance boundary tag. The raw markup string is parsed once at
/// load time; scoring never touches tag text again.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Markup {
    events: Vec<DisfluencyEvent>,
    boundary: Option<BoundaryTag>,
}

impl Markup {
    pub fn new(events: Vec<DisfluencyEvent>, boundary: Option<BoundaryTag>) -> Self {
        Self { events, boundary }
    }

    /// Parse a raw markup string, e.g. `<rms id="1"/><tc/>`.
    ///
    /// `<f/>` marks a fluent word and contributes no event. Unknown tokens
    /// are an error, not silently dropped; gold corpora are trusted input
    /// and a typo there should fail loudly at load time.
    pub fn parse(input: &str) -> Result<Self, MarkupError> {
        let mut events = Vec::new();
        let mut boundary: Option<BoundaryTag> = None;

        let mut rest = input.trim();
        while !rest.is_empty() {
            if !rest.starts_with('<') {
                return Err(MarkupError::NotATag(rest.to_string()));
            }
            let end = rest
                .find("/>")
                .ok_or_else(|| MarkupError::Unterminated(rest.to_string()))?;
            let token = &rest[..end + 2];
            let inner = &rest[1..end];
            rest = rest[end + 2..].trim_start();

            let mut parts = inner.split_whitespace();
            let name = parts
                .next()
                .ok_or_else(|| MarkupError::UnknownTag(token.to_string()))?;
            let id = parts.next().map(|attr| parse_id(attr, token)).transpose()?;
            if parts.next().is_some() {
                return Err(MarkupError::MalformedAttribute(token.to_string()));
            }

            let mut set_boundary = |tag: BoundaryTag| {
                if boundary.replace(tag).is_some() {
                    Err(MarkupError::DuplicateBoundary)
                } else {
                    Ok(())
                }
            };

            match name {
                "f" => {}
                "e" => events.push(DisfluencyEvent::EditTerm),
                "rms" => events.push(DisfluencyEvent::ReparandumStart {
                    id: require_id(id, token)?,
                }),
                "rm" => events.push(DisfluencyEvent::Reparandum {
                    id: require_id(id, token)?,
                }),
                "i" => events.push(DisfluencyEvent::Interregnum {
                    id: require_id(id, token)?,
                }),
                "rps" => events.push(DisfluencyEvent::RepairStart {
                    id: require_id(id, token)?,
                }),
                "rp" => events.push(DisfluencyEvent::Repair {
                    id: require_id(id, token)?,
                }),
                "rpn" => events.push(DisfluencyEvent::RepairEnd {
                    id: require_id(id, token)?,
                    subtype: None,
                }),
                "rpnrep" => events.push(DisfluencyEvent::RepairEnd {
                    id: require_id(id, token)?,
                    subtype: Some(RepairSubtype::Repetition),
                }),
                "rpnsub" => events.push(DisfluencyEvent::RepairEnd {
                    id: require_id(id, token)?,
                    subtype: Some(RepairSubtype::Substitution),
                }),
                "rpndel" => events.push(DisfluencyEvent::RepairEnd {
                    id: require_id(id, token)?,
                    subtype: Some(RepairSubtype::Deletion),
                }),
                "cc" => set_boundary(BoundaryTag::ContinueContinue)?,
                "ct" => set_boundary(BoundaryTag::ContinueTurnFinal)?,
                "tc" => set_boundary(BoundaryTag::TurnStartContinue)?,
                "tt" => set_boundary(BoundaryTag::TurnStartTurnFinal)?,
                other => return Err(MarkupError::UnknownTag(other.to_string())),
            }
        }

        Ok(Self { events, boundary })
    }

    pub fn events(&self) -> &[DisfluencyEvent] {
        &self.events
    }

    pub fn boundary(&self) -> Option<BoundaryTag> {
        self.boundary
    }

    pub fn is_turn_final(&self) -> bool {
        self.boundary.is_some_and(|b| b.is_turn_final())
    }

    /// All tag codes this word counts towards.
    ///
    /// A subtyped repair end counts for both its subtype code and the plain
    /// `<rpn` class; a turn-final boundary contributes `t>`.
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags = Vec::new();
        for event in &self.events {
            tags.push(event.tag());
            if let DisfluencyEvent::RepairEnd {
                subtype: Some(subtype),
                ..
            } = event
            {
                tags.push(match subtype {
                    RepairSubtype::Repetition => Tag::RepairEndRep,
                    RepairSubtype::Substitution => Tag::RepairEndSub,
                    RepairSubtype::Deletion => Tag::RepairEndDel,
                });
            }
        }
        if self.is_turn_final() {
            tags.push(Tag::TurnFinal);
        }
        tags
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags().contains(&tag)
    }

    /// Repair id carried by the first event counting towards `tag`, if any.
    pub fn repair_id_for(&self, tag: Tag) -> Option<&str> {
        self.events
            .iter()
            .find(|e| {
                e.tag() == tag
                    || matches!(
                        (e, tag),
                        (
                            DisfluencyEvent::RepairEnd { .. },
                            Tag::RepairEndRep | Tag::RepairEndSub | Tag::RepairEndDel
                        )
                    )
            })
            .and_then(|e| e.repair_id())
    }

    /// Number of repair onsets at this word, the unit of the speaker
    /// disfluency-rate tables.
    pub fn repair_starts(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DisfluencyEvent::RepairStart { .. }))
            .count()
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.events.is_empty() {
            write!(f, "<f/>")?;
        }
        for event in &self.events {
            match event {
                DisfluencyEvent::ReparandumStart { id } => write!(f, "<rms id=\"{id}\"/>")?,
                DisfluencyEvent::Reparandum { id } => write!(f, "<rm id=\"{id}\"/>")?,
                DisfluencyEvent::Interregnum { id } => write!(f, "<i id=\"{id}\"/>")?,
                DisfluencyEvent::EditTerm => write!(f, "<e/>")?,
                DisfluencyEvent::RepairStart { id } => write!(f, "<rps id=\"{id}\"/>")?,
                DisfluencyEvent::Repair { id } => write!(f, "<rp id=\"{id}\"/>")?,
                DisfluencyEvent::RepairEnd { id, subtype } => {
                    let name = match subtype {
                        None => "rpn",
                        Some(RepairSubtype::Repetition) => "rpnrep",
                        Some(RepairSubtype::Substitution) => "rpnsub",
                        Some(RepairSubtype::Deletion) => "rpndel",
                    };
                    write!(f, "<{name} id=\"{id}\"/>")?;
                }
            }
        }
        if let Some(boundary) = self.boundary {
            write!(f, "{}", boundary.code())?;
        }
        Ok(())
    }
}

fn parse_id(attr: &str, token: &str) -> Result<String, MarkupError> {
    attr.strip_prefix("id=\"")
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string)
        .ok_or_else(|| MarkupError::MalformedAttribute(token.to_string()))
}

fn require_id(id: Option<String>, token: &str) -> Result<String, MarkupError> {
    id.ok_or_else(|| MarkupError::MissingId(token.to_string()))
}
