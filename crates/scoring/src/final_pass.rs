use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::PathBuf;

use disfl_annotation::{DisfluencyEvent, RELAXED_TAGS, Record, SpeakerKey, SpeakerRecords, Tag};
use itertools::Itertools;

use crate::counts::CountTable;
use crate::error::Error;
use crate::rates::{RateTable, SpeakerRates};

/// What the final scorer computes and emits.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Lockstep word-position scoring (transcript-driven input).
    pub word: bool,
    /// Interval-id aligned scoring (ASR-driven input).
    pub interval: bool,
    /// Also score utterance boundary placement (NIST_SU, DSER, SegER).
    pub utt_eval: bool,
    /// Collect per-occurrence samples for the relaxed tag classes.
    pub error_analysis: bool,
    /// Dump the aligned gold/hypothesis token stream to this path.
    pub aligned_output: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            word: true,
            interval: false,
            utt_eval: false,
            error_analysis: false,
            aligned_output: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Outcome {
    TruePositive,
    FalsePositive,
    FalseNegative,
}

impl Outcome {
    pub fn code(&self) -> &'static str {
        match self {
            Outcome::TruePositive => "TP",
            Outcome::FalsePositive => "FP",
            Outcome::FalseNegative => "FN",
        }
    }
}

/// One relaxed-tag occurrence kept for qualitative review: the focal word in
/// a window of surrounding words, with both annotations.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ErrorSample {
    pub speaker: SpeakerKey,
    pub tag: Tag,
    pub outcome: Outcome,
    pub context: String,
    pub gold: String,
    pub hyp: String,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ErrorAnalysis {
    pub samples: Vec<ErrorSample>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalScores {
    pub word_counts: CountTable,
    pub interval_counts: CountTable,
    pub rates: RateTable,
    pub error_analysis: Option<ErrorAnalysis>,
}

/// Score every hypothesis speaker against gold, in sorted key order.
///
/// Speakers missing from gold are skipped with a diagnostic. Counters from
/// all speakers merge into one table per granularity; speaker rate tallies
/// accumulate per `dialogue:speaker` key.
pub fn score_final(
    hyp: &SpeakerRecords,
    gold: &SpeakerRecords,
    options: &Options,
) -> Result<FinalScores, Error> {
    let mut scores = FinalScores::default();
    if options.error_analysis {
        scores.error_analysis = Some(ErrorAnalysis::default());
    }

    let mut aligned = match &options.aligned_output {
        Some(path) => {
            let file = File::create(path).map_err(|e| Error::output("create", path, e))?;
            Some((path, BufWriter::new(file)))
        }
        None => None,
    };

    for (speaker, hyp_records) in hyp {
        let Some(gold_records) = gold.get(speaker) else {
            tracing::warn!(%speaker, "no gold annotation for speaker, skipping");
            continue;
        };

        accumulate_rates(
            scores.rates.entry(speaker.clone()).or_default(),
            hyp_records,
            gold_records,
        );

        if options.word {
            let pairs = align_positional(gold_records, hyp_records);
            score_aligned(
                speaker,
                &pairs,
                options,
                &mut scores.word_counts,
                scores.error_analysis.as_mut(),
            );
            if let Some((path, writer)) = aligned.as_mut() {
                write_aligned(writer, speaker, &pairs)
                    .map_err(|e| Error::output("write", path, e))?;
            }
        }
        if options.interval {
            let pairs = align_by_interval(gold_records, hyp_records);
            // Samples come from whichever granularity runs first.
            let analysis = if options.word {
                None
            } else {
                scores.error_analysis.as_mut()
            };
            score_aligned(
                speaker,
                &pairs,
                options,
                &mut scores.interval_counts,
                analysis,
            );
        }
    }

    if let Some((path, mut writer)) = aligned {
        writer
            .flush()
            .map_err(|e| Error::output("flush", path, e))?;
    }

    Ok(scores)
}

type Pair<'a> = (Option<&'a Record>, Option<&'a Record>);

fn align_positional<'a>(gold: &'a [Record], hyp: &'a [Record]) -> Vec<Pair<'a>> {
    (0..gold.len().max(hyp.len()))
        .map(|i| (gold.get(i), hyp.get(i)))
        .collect()
}

fn align_by_interval<'a>(gold: &'a [Record], hyp: &'a [Record]) -> Vec<Pair<'a>> {
    let gold_by_index: BTreeMap<u32, &Record> = gold.iter().map(|r| (r.index, r)).collect();
    let hyp_by_index: BTreeMap<u32, &Record> = hyp.iter().map(|r| (r.index, r)).collect();
    gold_by_index
        .keys()
        .chain(hyp_by_index.keys())
        .copied()
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .map(|i| {
            (
                gold_by_index.get(&i).copied(),
                hyp_by_index.get(&i).copied(),
            )
        })
        .collect()
}

fn score_aligned(
    speaker: &SpeakerKey,
    pairs: &[Pair<'_>],
    options: &Options,
    table: &mut CountTable,
    mut analysis: Option<&mut ErrorAnalysis>,
) {
    let gold_anchors = repair_anchors(pairs.iter().map(|(g, _)| *g));
    let hyp_anchors = repair_anchors(pairs.iter().map(|(_, h)| *h));

    // Exact per-position matching.
    for (gold, hyp) in pairs {
        let gold_tags = gold.map(|r| r.markup.tags()).unwrap_or_default();
        let hyp_tags = hyp.map(|r| r.markup.tags()).unwrap_or_default();

        for &tag in gold_tags.iter().unique() {
            let hit = hyp_tags.contains(&tag)
                && anchors_agree(tag, *gold, *hyp, &gold_anchors, &hyp_anchors);
            if hit {
                table.tag_mut(tag).hits += 1;
            } else {
                table.tag_mut(tag).misses += 1;
            }
        }
        for &tag in hyp_tags.iter().unique() {
            let hit = gold_tags.contains(&tag)
                && anchors_agree(tag, *gold, *hyp, &gold_anchors, &hyp_anchors);
            if !hit {
                table.tag_mut(tag).false_alarms += 1;
            }
        }
    }

    // Relaxed matching within gold turn windows.
    for window in gold_windows(pairs) {
        for tag in RELAXED_TAGS {
            let gold_positions: Vec<usize> = window
                .clone()
                .filter(|&p| pairs[p].0.is_some_and(|r| r.markup.has_tag(tag)))
                .collect();
            let hyp_positions: Vec<usize> = window
                .clone()
                .filter(|&p| pairs[p].1.is_some_and(|r| r.markup.has_tag(tag)))
                .collect();
            let matched = gold_positions.len().min(hyp_positions.len());

            let counts = table.relaxed_mut(tag);
            counts.hits += matched as u64;
            counts.misses += (gold_positions.len() - matched) as u64;
            counts.false_alarms += (hyp_positions.len() - matched) as u64;

            if let Some(analysis) = analysis.as_deref_mut() {
                collect_samples(
                    analysis,
                    speaker,
                    tag,
                    pairs,
                    &gold_positions,
                    &hyp_positions,
                    matched,
                );
            }
        }
    }

    if options.utt_eval {
        score_segmentation(pairs, table);
    }
}

/// Position of each repair id's reparandum onset along the aligned axis.
fn repair_anchors<'a>(
    side: impl Iterator<Item = Option<&'a Record>>,
) -> BTreeMap<&'a str, usize> {
    let mut anchors = BTreeMap::new();
    for (pos, record) in side.enumerate() {
        let Some(record) = record else { continue };
        for event in record.markup.events() {
            if let DisfluencyEvent::ReparandumStart { id } = event {
                anchors.entry(id.as_str()).or_insert(pos);
            }
        }
    }
    anchors
}

/// Repair-linked tags only hit when both repair ids resolve to the same
/// reparandum onset position; the ids themselves are free to differ.
fn anchors_agree(
    tag: Tag,
    gold: Option<&Record>,
    hyp: Option<&Record>,
    gold_anchors: &BTreeMap<&str, usize>,
    hyp_anchors: &BTreeMap<&str, usize>,
) -> bool {
    if !tag.is_repair_linked() {
        return true;
    }
    let gold_anchor = gold
        .and_then(|r| r.markup.repair_id_for(tag))
        .and_then(|id| gold_anchors.get(id));
    let hyp_anchor = hyp
        .and_then(|r| r.markup.repair_id_for(tag))
        .and_then(|id| hyp_anchors.get(id));
    gold_anchor == hyp_anchor
}

/// Consecutive position ranges ending at a gold turn-final record, plus the
/// trailing remainder if the stream does not end on a boundary.
fn gold_windows(pairs: &[Pair<'_>]) -> Vec<Range<usize>> {
    let mut windows = Vec::new();
    let mut start = 0;
    for (pos, (gold, _)) in pairs.iter().enumerate() {
        if gold.is_some_and(|r| r.markup.is_turn_final()) {
            windows.push(start..pos + 1);
            start = pos + 1;
        }
    }
    if start < pairs.len() {
        windows.push(start..pairs.len());
    }
    windows
}

fn collect_samples(
    analysis: &mut ErrorAnalysis,
    speaker: &SpeakerKey,
    tag: Tag,
    pairs: &[Pair<'_>],
    gold_positions: &[usize],
    hyp_positions: &[usize],
    matched: usize,
) {
    let mut push = |outcome: Outcome, focus: usize| {
        let (gold, hyp) = pairs[focus];
        analysis.samples.push(ErrorSample {
            speaker: speaker.clone(),
            tag,
            outcome,
            context: context_window(pairs, focus),
            gold: gold.map(|r| r.markup.to_string()).unwrap_or_default(),
            hyp: hyp.map(|r| r.markup.to_string()).unwrap_or_default(),
        });
    };

    for &pos in &gold_positions[..matched] {
        push(Outcome::TruePositive, pos);
    }
    for &pos in &gold_positions[matched..] {
        push(Outcome::FalseNegative, pos);
    }
    for &pos in &hyp_positions[matched..] {
        push(Outcome::FalsePositive, pos);
    }
}

/// Up to three words either side of the focal position, focal word
/// bracketed.
fn context_window(pairs: &[Pair<'_>], focus: usize) -> String {
    let lo = focus.saturating_sub(3);
    let hi = (focus + 3).min(pairs.len().saturating_sub(1));
    (lo..=hi)
        .map(|pos| {
            let word = pairs[pos]
                .0
                .or(pairs[pos].1)
                .map(|r| r.word.as_str())
                .unwrap_or("");
            if pos == focus {
                format!("[{word}]")
            } else {
                word.to_string()
            }
        })
        .join(" ")
}

fn score_segmentation(pairs: &[Pair<'_>], table: &mut CountTable) {
    for (gold, hyp) in pairs {
        let gold_final = gold.is_some_and(|r| r.markup.is_turn_final());
        let hyp_final = hyp.is_some_and(|r| r.markup.is_turn_final());
        if gold_final {
            table.nist_su.gold_boundaries += 1;
            if !hyp_final {
                table.nist_su.misses += 1;
            }
        } else if hyp_final {
            table.nist_su.false_alarms += 1;
        }
    }

    let gold_spans = utterance_spans(pairs, |pair| pair.0);
    let hyp_spans = utterance_spans(pairs, |pair| pair.1);

    // DSER: a gold utterance is right when both of its boundaries are.
    for &(start, end) in &gold_spans {
        table.dser.total += 1;
        let end_matched = pairs[end].1.is_some_and(|r| r.markup.is_turn_final());
        let start_matched =
            start == 0 || pairs[start - 1].1.is_some_and(|r| r.markup.is_turn_final());
        if !(end_matched && start_matched) {
            table.dser.errors += 1;
        }
    }

    // SegER: symmetric span-set disagreement over gold spans.
    let gold_set: BTreeSet<(usize, usize)> = gold_spans.into_iter().collect();
    let hyp_set: BTreeSet<(usize, usize)> = hyp_spans.into_iter().collect();
    table.seg_er.total += gold_set.len() as u64;
    table.seg_er.errors += (gold_set.difference(&hyp_set).count()
        + hyp_set.difference(&gold_set).count()) as u64;
}

/// Complete utterance spans of one side, as inclusive position ranges ending
/// at a turn-final record. A trailing open span is not an utterance.
fn utterance_spans<'a>(
    pairs: &[Pair<'a>],
    side: impl Fn(&Pair<'a>) -> Option<&'a Record>,
) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (pos, pair) in pairs.iter().enumerate() {
        if side(pair).is_some_and(|r| r.markup.is_turn_final()) {
            spans.push((start, pos));
            start = pos + 1;
        }
    }
    spans
}

fn accumulate_rates(rates: &mut SpeakerRates, hyp: &[Record], gold: &[Record]) {
    rates.repairs_hyp += hyp
        .iter()
        .map(|r| r.markup.repair_starts() as u64)
        .sum::<u64>();
    rates.repairs_gold += gold
        .iter()
        .map(|r| r.markup.repair_starts() as u64)
        .sum::<u64>();
    rates.utts_hyp += hyp.iter().filter(|r| r.markup.is_turn_final()).count() as u64;
    rates.utts_gold += gold.iter().filter(|r| r.markup.is_turn_final()).count() as u64;
    rates.words_hyp += hyp.len() as u64;
    rates.words_gold += gold.len() as u64;
}

fn write_aligned(
    writer: &mut impl Write,
    speaker: &SpeakerKey,
    pairs: &[Pair<'_>],
) -> std::io::Result<()> {
    writeln!(writer, "File: {speaker}")?;
    for &(gold, hyp) in pairs {
        let timing = gold.or(hyp);
        let (start, end) = timing.map(|r| (r.start, r.end)).unwrap_or((0.0, 0.0));
        let word = match (gold, hyp) {
            (Some(g), Some(h)) if g.word != h.word => format!("{}@{}", g.word, h.word),
            (Some(g), _) => g.word.clone(),
            (None, Some(h)) => format!("@{}", h.word),
            (None, None) => String::new(),
        };
        let gold_markup = gold.map(|r| r.markup.to_string()).unwrap_or_default();
        let hyp_markup = hyp.map(|r| r.markup.to_string()).unwrap_or_default();
        writeln!(
            writer,
            "{start:.2}\t{end:.2}\t{word}\t{gold_markup}@{hyp_markup}"
        )?;
    }
    writeln!(writer)
}
