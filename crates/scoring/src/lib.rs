pub mod counts;
pub mod error;
pub mod final_pass;
pub mod incremental;
pub mod metrics;
pub mod rates;
pub mod report;
pub mod stats;

pub use counts::{CountTable, NistCounts, SegCounts, TagCounts};
pub use error::Error;
pub use final_pass::{ErrorAnalysis, ErrorSample, FinalScores, Options, Outcome, score_final};
pub use incremental::{EditOverhead, IncrementalScores, score_incremental};
pub use metrics::{div, dser, nist_su, precision_recall_f1, seg_er};
pub use rates::{DerivedRates, RateCorrelations, RateTable, SpeakerRates, correlations};
pub use report::{
    format_value, result_rows, write_error_analysis_csv, write_results_csv,
    write_speaker_rates_csv,
};
pub use stats::{Correlation, mean, pearson};
