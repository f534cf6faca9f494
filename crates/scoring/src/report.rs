use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use disfl_annotation::{ACC_TAGS, COMBINED_KEY, RELAXED_TAGS, TTD_TAGS, Tag};
use itertools::Itertools;

use crate::counts::CountTable;
use crate::error::Error;
use crate::final_pass::{ErrorAnalysis, FinalScores, Options};
use crate::incremental::IncrementalScores;
use crate::metrics::{dser, nist_su, precision_recall_f1, seg_er};
use crate::rates::{RateTable, correlations};
use crate::stats::mean;

/// The flat result table of one evaluation run, in its fixed column order.
///
/// The order is a static schema, never map iteration order: accuracy columns
/// per granularity, then incremental timing columns, then the rate
/// correlations.
pub fn result_rows(
    scores: &FinalScores,
    incremental: Option<&IncrementalScores>,
    options: &Options,
) -> Vec<(String, f64)> {
    let mut rows = Vec::new();

    let granularities: &[(&str, &CountTable)] = &[
        ("word", &scores.word_counts),
        ("interval", &scores.interval_counts),
    ];
    for (mode, table) in granularities {
        let enabled = match *mode {
            "word" => options.word,
            _ => options.interval,
        };
        if !enabled {
            continue;
        }

        for tag in ACC_TAGS {
            push_prf(&mut rows, &format!("{tag}_{mode}"), table.tag(tag));
        }
        push_prf(&mut rows, &format!("{COMBINED_KEY}_{mode}"), table.combined());
        for tag in RELAXED_TAGS {
            push_prf(&mut rows, &format!("{tag}_relaxed_{mode}"), table.relaxed(tag));
        }
        if options.utt_eval {
            rows.push((format!("NIST_SU_{mode}"), nist_su(&table.nist_su)));
            rows.push((format!("DSER_{mode}"), dser(&table.dser)));
            rows.push((format!("SegER_{mode}"), seg_er(&table.seg_er)));
        }
    }

    if let Some(inc) = incremental {
        let samples: &[(&str, &std::collections::BTreeMap<Tag, Vec<f64>>, &Vec<f64>)] = &[
            ("word", &inc.ttd_word, &inc.ttd_final_turn_word),
            ("interval", &inc.ttd_time, &inc.ttd_final_turn_time),
        ];
        for (unit, ttd, final_turn) in samples {
            let enabled = match *unit {
                "word" => options.word,
                _ => options.interval,
            };
            if !enabled {
                continue;
            }
            for tag in TTD_TAGS {
                let latency = ttd.get(&tag).map(|s| mean(s)).unwrap_or(f64::NAN);
                rows.push((format!("t_t_detection_{tag}_{unit}"), latency));
            }
            rows.push((
                format!("t_t_detection_final_t>_{unit}"),
                mean(final_turn),
            ));
        }

        rows.push((
            "edit_overhead_rel_<rm".to_string(),
            inc.overhead_disfluency.relative(),
        ));
        if options.utt_eval {
            rows.push((
                "edit_overhead_rel_tto".to_string(),
                inc.overhead_boundary.relative(),
            ));
        }
        rows.push(("edit_overhead_rel".to_string(), inc.overhead_all.relative()));
    }

    let corr = correlations(&scores.rates);
    for (pairing, correlation) in [
        ("number", corr.number),
        ("rate_per_word", corr.per_word),
        ("rate_per_utt", corr.per_turn),
    ] {
        rows.push((format!("pearson_r_correl_rps_{pairing}"), correlation.r));
        rows.push((
            format!("pearson_p_correl_rps_{pairing}"),
            correlation.p_value,
        ));
    }

    rows
}

fn push_prf(rows: &mut Vec<(String, f64)>, key: &str, counts: crate::counts::TagCounts) {
    let (p, r, f1) = precision_recall_f1(&counts);
    rows.push((format!("p_{key}"), p));
    rows.push((format!("r_{key}"), r));
    rows.push((format!("f1_{key}"), f1));
}

/// One results row per evaluation run. The header is written when the file
/// is created; later runs append, so one file collects a whole experiment
/// grid.
pub fn write_results_csv(
    path: &Path,
    corpus: &str,
    rows: &[(String, f64)],
) -> Result<(), Error> {
    let new_file = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::output("open", path, e))?;
    let mut writer = BufWriter::new(file);

    if new_file {
        let header = rows.iter().map(|(key, _)| key.as_str()).join(",");
        writeln!(writer, "corpus,{header}").map_err(|e| Error::output("write", path, e))?;
    }
    let values = rows.iter().map(|(_, value)| format_value(*value)).join(",");
    writeln!(writer, "{corpus},{values}").map_err(|e| Error::output("write", path, e))?;
    writer.flush().map_err(|e| Error::output("flush", path, e))
}

/// Per-speaker disfluency-rate table, one row per `dialogue:speaker` key.
pub fn write_speaker_rates_csv(
    path: &Path,
    corpus: &str,
    rates: &RateTable,
) -> Result<(), Error> {
    let file = std::fs::File::create(path).map_err(|e| Error::output("create", path, e))?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "corpus,dialogue,speaker,turns,words,rps_hyp,rps_gold,\
         rate_per_utt_hyp,rate_per_utt_gold,rate_per_word_hyp,rate_per_word_gold"
    )
    .map_err(|e| Error::output("write", path, e))?;

    for (speaker, tallies) in rates {
        let derived = tallies.derived();
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{}",
            corpus,
            speaker.dialogue,
            speaker.speaker,
            tallies.utts_gold,
            tallies.words_gold,
            tallies.repairs_hyp,
            tallies.repairs_gold,
            format_value(derived.hyp_per_turn),
            format_value(derived.gold_per_turn),
            format_value(derived.hyp_per_word),
            format_value(derived.gold_per_word),
        )
        .map_err(|e| Error::output("write", path, e))?;
    }
    writer.flush().map_err(|e| Error::output("flush", path, e))
}

/// Relaxed-tag occurrence samples for qualitative review.
pub fn write_error_analysis_csv(path: &Path, analysis: &ErrorAnalysis) -> Result<(), Error> {
    let file = std::fs::File::create(path).map_err(|e| Error::output("create", path, e))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "speaker,tag,outcome,context,gold,hyp")
        .map_err(|e| Error::output("write", path, e))?;
    for sample in &analysis.samples {
        writeln!(
            writer,
            "{},{},{},\"{}\",\"{}\",\"{}\"",
            sample.speaker,
            sample.tag,
            sample.outcome.code(),
            sample.context,
            sample.gold,
            sample.hyp,
        )
        .map_err(|e| Error::output("write", path, e))?;
    }
    writer.flush().map_err(|e| Error::output("flush", path, e))
}

/// Floats render with fixed precision; undefined values render as `NA`.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else {
        format!("{value:.6}")
    }
}

#[cfg(test)]
mod tests {
    use disfl_annotation::SpeakerKey;

    use super::*;
    use crate::rates::SpeakerRates;

    fn perfect_word_scores() -> FinalScores {
        let mut scores = FinalScores::default();
        scores.word_counts.tag_mut(Tag::EditTerm).hits = 3;
        scores
    }

    #[test]
    fn schema_starts_with_word_accuracy_columns() {
        let rows = result_rows(&perfect_word_scores(), None, &Options::default());
        assert_eq!(rows[0].0, "p_<rms_word");
        assert_eq!(rows[1].0, "r_<rms_word");
        assert_eq!(rows[2].0, "f1_<rms_word");
        assert!(rows.iter().any(|(k, _)| k == "p_<rms.<i.<rps_word"));
        assert!(rows.iter().any(|(k, _)| k == "f1_t>_relaxed_word"));
        assert!(rows.iter().all(|(k, _)| !k.contains("interval")));
        assert!(rows.iter().all(|(k, _)| !k.starts_with("NIST_SU")));
        assert!(rows.iter().all(|(k, _)| !k.starts_with("t_t_detection")));
    }

    #[test]
    fn perfect_counts_report_ones_and_empty_counts_zeros() {
        let rows = result_rows(&perfect_word_scores(), None, &Options::default());
        let get = |key: &str| rows.iter().find(|(k, _)| k == key).unwrap().1;
        assert_eq!(get("p_<e_word"), 1.0);
        assert_eq!(get("r_<e_word"), 1.0);
        assert_eq!(get("f1_<e_word"), 1.0);
        assert_eq!(get("f1_<rps_word"), 0.0);
    }

    #[test]
    fn utt_eval_and_incremental_columns_appear_in_order() {
        let options = Options {
            utt_eval: true,
            ..Options::default()
        };
        let mut inc = IncrementalScores::default();
        inc.ttd_word.entry(Tag::EditTerm).or_default().push(2.0);
        inc.overhead_all.revisions = 4;
        inc.overhead_all.final_tokens = 4;

        let rows = result_rows(&perfect_word_scores(), Some(&inc), &options);
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        let pos = |key: &str| keys.iter().position(|k| *k == key).unwrap();
        assert!(pos("NIST_SU_word") < pos("t_t_detection_<rms_word"));
        assert!(pos("t_t_detection_final_t>_word") < pos("edit_overhead_rel_<rm"));
        assert!(pos("edit_overhead_rel_<rm") < pos("edit_overhead_rel_tto"));
        assert!(pos("edit_overhead_rel") < pos("pearson_r_correl_rps_number"));

        let get = |key: &str| rows.iter().find(|(k, _)| k == key).unwrap().1;
        assert_eq!(get("t_t_detection_<e_word"), 2.0);
        // No sample list for <rms: undefined, not zero.
        assert!(get("t_t_detection_<rms_word").is_nan());
        assert_eq!(get("edit_overhead_rel"), 0.0);
    }

    #[test]
    fn results_csv_appends_rows_after_first_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let rows = vec![
            ("f1_<e_word".to_string(), 0.5),
            ("pearson_r_correl_rps_number".to_string(), f64::NAN),
        ];

        write_results_csv(&path, "swbd", &rows).unwrap();
        write_results_csv(&path, "bnc", &rows).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "corpus,f1_<e_word,pearson_r_correl_rps_number");
        assert_eq!(lines[1], "swbd,0.500000,NA");
        assert!(lines[2].starts_with("bnc,"));
    }

    #[test]
    fn speaker_rates_csv_has_one_row_per_speaker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.csv");

        let mut rates = RateTable::new();
        rates.insert(
            SpeakerKey::new("KB1", "A"),
            SpeakerRates {
                repairs_hyp: 2,
                repairs_gold: 4,
                utts_hyp: 8,
                utts_gold: 8,
                words_hyp: 100,
                words_gold: 100,
            },
        );
        write_speaker_rates_csv(&path, "swbd", &rates).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("corpus,dialogue,speaker,turns,words"));
        assert_eq!(
            lines[1],
            "swbd,KB1,A,8,100,2,4,0.250000,0.500000,0.020000,0.040000"
        );
    }
}
