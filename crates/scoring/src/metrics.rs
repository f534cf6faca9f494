use crate::counts::{NistCounts, SegCounts, TagCounts};

/// Division that treats an empty numerator or denominator as zero instead of
/// NaN/inf, so empty corpora score 0 rather than poisoning the report.
pub fn div(num: f64, denom: f64) -> f64 {
    if num == 0.0 || denom == 0.0 {
        0.0
    } else {
        num / denom
    }
}

/// Precision, recall and F1 from hit/false-alarm/miss counts.
pub fn precision_recall_f1(counts: &TagCounts) -> (f64, f64, f64) {
    let tp = counts.hits as f64;
    let precision = div(tp, tp + counts.false_alarms as f64);
    let recall = div(tp, tp + counts.misses as f64);
    let f1 = div(2.0 * precision * recall, precision + recall);
    (precision, recall, f1)
}

/// NIST_SU: boundary insertions plus deletions over gold boundary count.
pub fn nist_su(counts: &NistCounts) -> f64 {
    div(
        (counts.false_alarms + counts.misses) as f64,
        counts.gold_boundaries as f64,
    )
}

/// DSER: gold reparandum spans not reproduced exactly, over gold span count.
pub fn dser(counts: &SegCounts) -> f64 {
    div(counts.errors as f64, counts.total as f64)
}

/// SegER: utterance spans present in only one of gold/hypothesis, over gold
/// span count.
pub fn seg_er(counts: &SegCounts) -> f64 {
    div(counts.errors as f64, counts.total as f64)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn div_guards_zero_on_either_side() {
        assert_eq!(div(0.0, 5.0), 0.0);
        assert_eq!(div(5.0, 0.0), 0.0);
        assert_relative_eq!(div(1.0, 4.0), 0.25);
    }

    #[test]
    fn precision_recall_f1_from_counts() {
        let counts = TagCounts {
            hits: 6,
            false_alarms: 2,
            misses: 4,
        };
        let (p, r, f1) = precision_recall_f1(&counts);
        assert_relative_eq!(p, 0.75);
        assert_relative_eq!(r, 0.6);
        assert_relative_eq!(f1, 2.0 * 0.75 * 0.6 / (0.75 + 0.6));
    }

    #[test]
    fn all_zero_counts_score_zero_not_nan() {
        let (p, r, f1) = precision_recall_f1(&TagCounts::default());
        assert_eq!((p, r, f1), (0.0, 0.0, 0.0));
    }

    #[test]
    fn nist_su_sums_insertions_and_deletions() {
        let counts = NistCounts {
            false_alarms: 3,
            misses: 1,
            gold_boundaries: 8,
        };
        assert_relative_eq!(nist_su(&counts), 0.5);
    }

    #[test]
    fn unit_error_rates_divide_errors_by_gold_total() {
        let counts = SegCounts {
            errors: 2,
            total: 10,
        };
        assert_relative_eq!(dser(&counts), 0.2);
        assert_relative_eq!(seg_er(&counts), 0.2);
        assert_eq!(dser(&SegCounts::default()), 0.0);
    }
}
