use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use disfl_corpus::{load_final_hypothesis, load_gold, load_increco};
use disfl_scoring::{
    Options, format_value, result_rows, score_final, score_incremental, write_error_analysis_csv,
    write_results_csv, write_speaker_rates_csv,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "disfleval",
    about = "Score disfluency detection and utterance segmentation against gold transcripts"
)]
struct Cli {
    /// Gold transcript, tab-separated rows of
    /// `interval_ID  start  end  word  POS  markup`.
    #[arg(long, env = "DISFLEVAL_GOLD")]
    gold: PathBuf,

    /// Hypothesis file: a one-shot final annotation pass, or with
    /// `--increco` a timestamped incremental stream.
    #[arg(long, env = "DISFLEVAL_HYPOTHESIS")]
    hypothesis: PathBuf,

    /// Replay the hypothesis as an increco stream and also compute
    /// time-to-detection and edit overhead.
    #[arg(long)]
    increco: bool,

    /// Additionally score utterance boundary placement
    /// (NIST_SU, DSER, SegER).
    #[arg(long)]
    utt_eval: bool,

    /// Word-position scoring for transcript-driven hypotheses. On by
    /// default; only switched off when `--intervals` is given alone.
    #[arg(long)]
    word: bool,

    /// Interval-id aligned scoring for ASR-driven hypotheses.
    #[arg(long)]
    intervals: bool,

    /// Collect relaxed-tag occurrence samples into this CSV.
    #[arg(long)]
    error_analysis: Option<PathBuf>,

    /// Dump the aligned gold/hypothesis token stream to this file.
    #[arg(long)]
    aligned_output: Option<PathBuf>,

    /// Append one result row to this CSV (header written on creation).
    #[arg(long, env = "DISFLEVAL_RESULTS")]
    results: Option<PathBuf>,

    /// Write the per-speaker disfluency-rate table to this CSV.
    #[arg(long)]
    speaker_rates: Option<PathBuf>,

    /// Corpus label recorded in the output tables.
    #[arg(long, env = "DISFLEVAL_CORPUS", default_value = "corpus")]
    corpus: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let options = Options {
        word: cli.word || !cli.intervals,
        interval: cli.intervals,
        utt_eval: cli.utt_eval,
        error_analysis: cli.error_analysis.is_some(),
        aligned_output: cli.aligned_output.clone(),
    };

    let gold = load_gold(&cli.gold)
        .with_context(|| format!("loading gold transcript {}", cli.gold.display()))?;

    let (scores, incremental) = if cli.increco {
        let stream = load_increco(&cli.hypothesis)
            .with_context(|| format!("loading increco stream {}", cli.hypothesis.display()))?;
        let incremental = score_incremental(&stream, &gold);
        let scores = score_final(&incremental.stabilized, &gold, &options)?;
        (scores, Some(incremental))
    } else {
        let hyp = load_final_hypothesis(&cli.hypothesis)
            .with_context(|| format!("loading hypothesis {}", cli.hypothesis.display()))?;
        (score_final(&hyp, &gold, &options)?, None)
    };

    let rows = result_rows(&scores, incremental.as_ref(), &options);

    if let Some(path) = &cli.results {
        write_results_csv(path, &cli.corpus, &rows)
            .with_context(|| format!("writing results table {}", path.display()))?;
        tracing::info!(path = %path.display(), "results row appended");
    }
    if let Some(path) = &cli.speaker_rates {
        write_speaker_rates_csv(path, &cli.corpus, &scores.rates)
            .with_context(|| format!("writing speaker rates {}", path.display()))?;
    }
    if let (Some(path), Some(analysis)) = (&cli.error_analysis, scores.error_analysis.as_ref()) {
        write_error_analysis_csv(path, analysis)
            .with_context(|| format!("writing error analysis {}", path.display()))?;
    }

    let mut headline = rows;
    headline.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, value) in &headline {
        println!("{key}\t{}", format_value(*value));
    }

    Ok(())
}
