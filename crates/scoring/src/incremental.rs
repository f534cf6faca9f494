use std::collections::{BTreeMap, BTreeSet};

use disfl_annotation::{Record, SpeakerRecords, SpeakerSnapshots, TTD_TAGS, Tag};

/// Revision tally behind the edit-overhead metric. Every write of a word's
/// annotation counts, including the first; a one-shot stream therefore has
/// exactly one revision per token and 0% overhead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct EditOverhead {
    pub revisions: u64,
    pub final_tokens: u64,
}

impl EditOverhead {
    /// `100 * (revisions / final_tokens - 1)`, 0 for an empty stream.
    pub fn relative(&self) -> f64 {
        if self.revisions == 0 || self.final_tokens == 0 {
            return 0.0;
        }
        100.0 * (self.revisions as f64 / self.final_tokens as f64 - 1.0)
    }
}

/// Everything the replay of the incremental streams produces.
///
/// Time-to-detection sample lists hold one entry per *detected* gold event;
/// events never detected contribute nothing, so averages cover detections
/// only. `stabilized` is the end-of-stream hypothesis handed to the final
/// scorer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncrementalScores {
    /// First-detection latency in words, per tag.
    pub ttd_word: BTreeMap<Tag, Vec<f64>>,
    /// First-detection latency in seconds, per tag.
    pub ttd_time: BTreeMap<Tag, Vec<f64>>,
    /// Last never-revised correct detection of a turn-final, in words.
    pub ttd_final_turn_word: Vec<f64>,
    /// Last never-revised correct detection of a turn-final, in seconds.
    pub ttd_final_turn_time: Vec<f64>,
    pub overhead_all: EditOverhead,
    pub overhead_disfluency: EditOverhead,
    pub overhead_boundary: EditOverhead,
    pub stabilized: SpeakerRecords,
}

/// Replay each speaker's snapshot stream in one forward pass.
///
/// Holds the latest annotation per word index; a snapshot row whose markup
/// differs from the held one is an edit. Detection latencies are measured
/// against the gold word position (word granularity, clocked by the last
/// word the snapshot covers) and the gold onset time (time granularity,
/// clocked by the snapshot timestamp).
pub fn score_incremental(
    increco: &SpeakerSnapshots,
    gold: &SpeakerRecords,
) -> IncrementalScores {
    let mut scores = IncrementalScores::default();

    for (speaker, snapshots) in increco {
        let Some(gold_records) = gold.get(speaker) else {
            tracing::warn!(%speaker, "no gold annotation for speaker, skipping");
            continue;
        };
        let gold_by_index: BTreeMap<u32, (usize, &Record)> = gold_records
            .iter()
            .enumerate()
            .map(|(pos, r)| (r.index, (pos, r)))
            .collect();

        let mut held: BTreeMap<u32, Record> = BTreeMap::new();
        let mut detected: BTreeSet<(u32, Tag)> = BTreeSet::new();
        let mut final_turn: BTreeMap<u32, (f64, f64)> = BTreeMap::new();
        let mut clock: usize = 0;

        for snapshot in snapshots {
            // The word clock advances to the furthest gold position this
            // snapshot covers, before any row is diffed.
            for row in &snapshot.rows {
                if let Some(&(pos, _)) = gold_by_index.get(&row.index) {
                    clock = clock.max(pos);
                }
            }

            for row in &snapshot.rows {
                let previous = held.get(&row.index);
                let changed = previous.is_none_or(|prev| prev.markup != row.markup);
                if changed {
                    scores.overhead_all.revisions += 1;
                    let events_changed =
                        previous.is_none_or(|prev| prev.markup.events() != row.markup.events());
                    if events_changed {
                        scores.overhead_disfluency.revisions += 1;
                    }
                    let boundary_changed = previous
                        .is_none_or(|prev| prev.markup.boundary() != row.markup.boundary());
                    if boundary_changed {
                        scores.overhead_boundary.revisions += 1;
                    }
                }

                if let Some(&(gold_pos, gold_record)) = gold_by_index.get(&row.index) {
                    for tag in TTD_TAGS {
                        let newly_correct = gold_record.markup.has_tag(tag)
                            && row.markup.has_tag(tag)
                            && !previous.is_some_and(|prev| prev.markup.has_tag(tag))
                            && detected.insert((row.index, tag));
                        if newly_correct {
                            scores
                                .ttd_word
                                .entry(tag)
                                .or_default()
                                .push((clock - gold_pos) as f64);
                            scores
                                .ttd_time
                                .entry(tag)
                                .or_default()
                                .push(snapshot.time - gold_record.start);
                        }
                    }

                    if gold_record.markup.is_turn_final() {
                        let was_correct = previous.is_some_and(|prev| prev.markup.is_turn_final());
                        let is_correct = row.markup.is_turn_final();
                        if is_correct && !was_correct {
                            final_turn.insert(
                                row.index,
                                ((clock - gold_pos) as f64, snapshot.time - gold_record.start),
                            );
                        } else if !is_correct && was_correct {
                            final_turn.remove(&row.index);
                        }
                    }
                }

                held.insert(row.index, row.clone());
            }
        }

        let tokens = held.len() as u64;
        scores.overhead_all.final_tokens += tokens;
        scores.overhead_disfluency.final_tokens += tokens;
        scores.overhead_boundary.final_tokens += tokens;

        for (word, time) in final_turn.into_values() {
            scores.ttd_final_turn_word.push(word);
            scores.ttd_final_turn_time.push(time);
        }

        scores
            .stabilized
            .insert(speaker.clone(), held.into_values().collect());
    }

    scores
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use disfl_annotation::{Markup, Snapshot, SpeakerKey};

    use super::*;

    fn rec(index: u32, word: &str, markup: &str) -> Record {
        Record {
            index,
            start: index as f64,
            end: index as f64 + 1.0,
            word: word.to_string(),
            pos: "UH".to_string(),
            markup: Markup::parse(markup).unwrap(),
        }
    }

    fn gold_three_words() -> SpeakerRecords {
        let mut gold = SpeakerRecords::new();
        gold.insert(
            SpeakerKey::new("KB1", "A"),
            vec![
                rec(0, "i", "<f/><cc/>"),
                rec(1, "uh", "<e/><cc/>"),
                rec(2, "go", "<f/><ct/>"),
            ],
        );
        gold
    }

    fn stream(snapshots: Vec<Snapshot>) -> SpeakerSnapshots {
        let mut increco = SpeakerSnapshots::new();
        increco.insert(SpeakerKey::new("KB1", "A"), snapshots);
        increco
    }

    #[test]
    fn detection_on_arrival_has_zero_word_latency() {
        let increco = stream(vec![
            Snapshot {
                time: 1.0,
                rows: vec![rec(0, "i", "<f/><cc/>")],
            },
            Snapshot {
                time: 2.5,
                rows: vec![rec(1, "uh", "<e/><cc/>")],
            },
            Snapshot {
                time: 3.0,
                rows: vec![rec(2, "go", "<f/><ct/>")],
            },
        ]);

        let scores = score_incremental(&increco, &gold_three_words());
        assert_eq!(scores.ttd_word[&Tag::EditTerm], vec![0.0]);
        // Gold word 1 starts at t=1.0 and was labelled at t=2.5.
        assert_relative_eq!(scores.ttd_time[&Tag::EditTerm][0], 1.5);
        assert_eq!(scores.ttd_word[&Tag::TurnFinal], vec![0.0]);
        assert_eq!(scores.overhead_all.relative(), 0.0);
    }

    #[test]
    fn late_revision_detection_counts_word_distance() {
        let increco = stream(vec![
            Snapshot {
                time: 1.0,
                rows: vec![rec(0, "i", "<f/><cc/>"), rec(1, "uh", "<f/><cc/>")],
            },
            Snapshot {
                time: 3.0,
                rows: vec![rec(1, "uh", "<e/><cc/>"), rec(2, "go", "<f/><ct/>")],
            },
        ]);

        let scores = score_incremental(&increco, &gold_three_words());
        // The relabel arrives in the snapshot that covers word 2.
        assert_eq!(scores.ttd_word[&Tag::EditTerm], vec![1.0]);
        assert_relative_eq!(scores.ttd_time[&Tag::EditTerm][0], 2.0);

        // Four annotation writes over three final tokens.
        assert_eq!(scores.overhead_all.revisions, 4);
        assert_eq!(scores.overhead_all.final_tokens, 3);
        assert_relative_eq!(scores.overhead_all.relative(), 100.0 * (4.0 / 3.0 - 1.0));
    }

    #[test]
    fn undetected_gold_event_yields_no_sample() {
        let increco = stream(vec![Snapshot {
            time: 3.0,
            rows: vec![
                rec(0, "i", "<f/><cc/>"),
                rec(1, "uh", "<f/><cc/>"),
                rec(2, "go", "<f/><ct/>"),
            ],
        }]);

        let scores = score_incremental(&increco, &gold_three_words());
        assert!(!scores.ttd_word.contains_key(&Tag::EditTerm));
        assert_eq!(scores.ttd_word[&Tag::TurnFinal].len(), 1);
    }

    #[test]
    fn boundary_only_revision_skips_disfluency_overhead() {
        let increco = stream(vec![
            Snapshot {
                time: 1.0,
                rows: vec![rec(0, "i", "<f/><cc/>")],
            },
            Snapshot {
                time: 2.0,
                rows: vec![rec(0, "i", "<f/><ct/>")],
            },
        ]);

        let mut gold = SpeakerRecords::new();
        gold.insert(SpeakerKey::new("KB1", "A"), vec![rec(0, "i", "<f/><ct/>")]);

        let scores = score_incremental(&increco, &gold);
        assert_eq!(scores.overhead_all.revisions, 2);
        assert_eq!(scores.overhead_boundary.revisions, 2);
        assert_eq!(scores.overhead_disfluency.revisions, 1);
    }

    #[test]
    fn final_turn_sample_survives_only_unrevised_detections() {
        let mut gold = SpeakerRecords::new();
        gold.insert(
            SpeakerKey::new("KB1", "A"),
            vec![rec(0, "i", "<f/><cc/>"), rec(1, "go", "<f/><ct/>")],
        );

        let increco = stream(vec![
            Snapshot {
                time: 1.0,
                rows: vec![rec(0, "i", "<f/><cc/>"), rec(1, "go", "<f/><ct/>")],
            },
            Snapshot {
                time: 2.0,
                rows: vec![rec(1, "go", "<f/><cc/>")],
            },
            Snapshot {
                time: 4.0,
                rows: vec![rec(1, "go", "<f/><ct/>")],
            },
        ]);

        let scores = score_incremental(&increco, &gold);
        assert_eq!(scores.ttd_final_turn_time.len(), 1);
        // Only the re-detection at t=4.0 was never revised away.
        assert_relative_eq!(scores.ttd_final_turn_time[0], 3.0);
        // First detection is still the t=1.0 one.
        assert_relative_eq!(scores.ttd_time[&Tag::TurnFinal][0], 0.0);
    }

    #[test]
    fn stabilized_hypothesis_reflects_latest_markup_in_index_order() {
        let increco = stream(vec![
            Snapshot {
                time: 1.0,
                rows: vec![rec(1, "uh", "<f/><cc/>"), rec(0, "i", "<f/><cc/>")],
            },
            Snapshot {
                time: 2.0,
                rows: vec![rec(1, "uh", "<e/><cc/>"), rec(2, "go", "<f/><ct/>")],
            },
        ]);

        let scores = score_incremental(&increco, &gold_three_words());
        let rows = &scores.stabilized[&SpeakerKey::new("KB1", "A")];
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(rows[1].markup.has_tag(Tag::EditTerm));
    }

    #[test]
    fn speaker_missing_from_gold_is_skipped() {
        let mut increco = stream(vec![Snapshot {
            time: 1.0,
            rows: vec![rec(0, "i", "<f/><cc/>")],
        }]);
        increco.insert(
            SpeakerKey::new("KB9", "Z"),
            vec![Snapshot {
                time: 1.0,
                rows: vec![rec(0, "um", "<e/><cc/>")],
            }],
        );

        let scores = score_incremental(&increco, &gold_three_words());
        assert!(!scores.stabilized.contains_key(&SpeakerKey::new("KB9", "Z")));
    }
}
