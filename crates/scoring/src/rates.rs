use std::collections::BTreeMap;

use disfl_annotation::SpeakerKey;

use crate::metrics::div;
use crate::stats::{Correlation, pearson};

/// Raw per-speaker tallies behind the disfluency-rate tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SpeakerRates {
    pub repairs_hyp: u64,
    pub repairs_gold: u64,
    pub utts_hyp: u64,
    pub utts_gold: u64,
    pub words_hyp: u64,
    pub words_gold: u64,
}

/// The four derived rates. Every division carries its own zero guard; a
/// speaker with no gold utterances still gets a defined hypothesis-side
/// rate and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct DerivedRates {
    pub hyp_per_turn: f64,
    pub gold_per_turn: f64,
    pub hyp_per_word: f64,
    pub gold_per_word: f64,
}

impl SpeakerRates {
    pub fn merge(&mut self, other: &SpeakerRates) {
        self.repairs_hyp += other.repairs_hyp;
        self.repairs_gold += other.repairs_gold;
        self.utts_hyp += other.utts_hyp;
        self.utts_gold += other.utts_gold;
        self.words_hyp += other.words_hyp;
        self.words_gold += other.words_gold;
    }

    pub fn derived(&self) -> DerivedRates {
        DerivedRates {
            hyp_per_turn: div(self.repairs_hyp as f64, self.utts_hyp as f64),
            gold_per_turn: div(self.repairs_gold as f64, self.utts_gold as f64),
            hyp_per_word: div(self.repairs_hyp as f64, self.words_hyp as f64),
            gold_per_word: div(self.repairs_gold as f64, self.words_gold as f64),
        }
    }
}

pub type RateTable = BTreeMap<SpeakerKey, SpeakerRates>;

/// Hypothesis/gold agreement of the speaker disfluency rates, over the
/// whole speaker population.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RateCorrelations {
    /// Raw repair counts per speaker.
    pub number: Correlation,
    /// Repairs per word.
    pub per_word: Correlation,
    /// Repairs per turn.
    pub per_turn: Correlation,
}

pub fn correlations(rates: &RateTable) -> RateCorrelations {
    let mut hyp_counts = Vec::with_capacity(rates.len());
    let mut gold_counts = Vec::with_capacity(rates.len());
    let mut hyp_per_word = Vec::with_capacity(rates.len());
    let mut gold_per_word = Vec::with_capacity(rates.len());
    let mut hyp_per_turn = Vec::with_capacity(rates.len());
    let mut gold_per_turn = Vec::with_capacity(rates.len());

    for speaker in rates.values() {
        let derived = speaker.derived();
        hyp_counts.push(speaker.repairs_hyp as f64);
        gold_counts.push(speaker.repairs_gold as f64);
        hyp_per_word.push(derived.hyp_per_word);
        gold_per_word.push(derived.gold_per_word);
        hyp_per_turn.push(derived.hyp_per_turn);
        gold_per_turn.push(derived.gold_per_turn);
    }

    RateCorrelations {
        number: pearson(&hyp_counts, &gold_counts),
        per_word: pearson(&hyp_per_word, &gold_per_word),
        per_turn: pearson(&hyp_per_turn, &gold_per_turn),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn rates(repairs_hyp: u64, repairs_gold: u64) -> SpeakerRates {
        SpeakerRates {
            repairs_hyp,
            repairs_gold,
            utts_hyp: 10,
            utts_gold: 10,
            words_hyp: 100,
            words_gold: 100,
        }
    }

    #[test]
    fn derived_rates_guard_each_division_independently() {
        let speaker = SpeakerRates {
            repairs_hyp: 4,
            repairs_gold: 2,
            utts_hyp: 0,
            utts_gold: 8,
            words_hyp: 100,
            words_gold: 0,
        };
        let derived = speaker.derived();
        assert_eq!(derived.hyp_per_turn, 0.0);
        assert_relative_eq!(derived.gold_per_turn, 0.25);
        assert_relative_eq!(derived.hyp_per_word, 0.04);
        assert_eq!(derived.gold_per_word, 0.0);
    }

    #[test]
    fn two_speaker_correlation_collapses_to_sign() {
        let mut table = RateTable::new();
        table.insert(SpeakerKey::new("KB1", "A"), rates(2, 1));
        table.insert(SpeakerKey::new("KB1", "B"), rates(4, 5));

        let c = correlations(&table);
        assert_eq!(c.number.r, 1.0);
        assert_eq!(c.number.p_value, 1.0);
        assert_eq!(c.per_word.r, 1.0);
        assert_eq!(c.per_turn.r, 1.0);
    }

    #[test]
    fn single_speaker_correlation_is_undefined() {
        let mut table = RateTable::new();
        table.insert(SpeakerKey::new("KB1", "A"), rates(2, 1));

        let c = correlations(&table);
        assert!(c.number.r.is_nan());
        assert!(c.number.p_value.is_nan());
    }

    #[test]
    fn constant_rate_vector_is_undefined() {
        let mut table = RateTable::new();
        table.insert(SpeakerKey::new("KB1", "A"), rates(3, 1));
        table.insert(SpeakerKey::new("KB1", "B"), rates(3, 2));
        table.insert(SpeakerKey::new("KB2", "A"), rates(3, 5));

        let c = correlations(&table);
        assert!(c.number.r.is_nan());
    }
}
