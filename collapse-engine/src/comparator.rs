//! Cross-case pattern tests.
//!
//! Three qualitative hypotheses are checked across a set of historical
//! cases:
//!
//! 1. **Cascade order**: trust declines first, technology last.
//! 2. **Trust threshold**: at the inflection of K(t), trust is below 0.40.
//! 3. **Speed/capacity**: higher peak K goes with slower collapse.
//!
//! The thresholds are fixed documented choices, not a pre-registered test.

use crate::case::HistoricalCase;
use crate::error::{CollapseError, Result};
use crate::harmony::{Harmony, N_HARMONIES, TRUST_THRESHOLD_RANGE};
use crate::recovery::{argmax, peak_and_nadir};
use early_warning::{correlation, gradient, gradient_with_axis};
use serde::{Deserialize, Serialize};

/// Sample spacing used by the inflection heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpacingPolicy {
    /// Unit spacing between samples, ignoring the time axis
    #[default]
    SampleIndex,
    /// Non-uniform differences against the case's time axis
    TimeAxis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorConfig {
    /// Trust level the inflection must fall below
    pub trust_cutoff: f64,
    /// Open interval reported as "in range"
    pub threshold_band: (f64, f64),
    /// Minimum correlation for the speed/capacity hypothesis
    pub correlation_threshold: f64,
    /// Maximum p-value for the speed/capacity hypothesis
    pub p_value_threshold: f64,
    pub spacing: SpacingPolicy,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            trust_cutoff: 0.40,
            threshold_band: TRUST_THRESHOLD_RANGE,
            correlation_threshold: 0.3,
            p_value_threshold: 0.1,
            spacing: SpacingPolicy::SampleIndex,
        }
    }
}

impl ComparatorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.threshold_band.0 > config.threshold_band.1 {
            return Err(CollapseError::ConfigError(
                "threshold band lower bound exceeds upper bound".into(),
            ));
        }
        Ok(config)
    }
}

/// Order in which one case's harmonies begin to decline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseSequence {
    pub case: String,
    pub sequence: Vec<Harmony>,
    pub first_to_decline: Option<Harmony>,
    pub last_to_decline: Option<Harmony>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceComparison {
    pub individual: Vec<CaseSequence>,
    pub modal_first: Option<Harmony>,
    pub modal_last: Option<Harmony>,
    pub trust_first_count: usize,
    pub technology_last_count: usize,
    pub supports_hypothesis: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseThreshold {
    pub case: String,
    pub inflection_index: usize,
    pub inflection_time: f64,
    pub trust_at_inflection: f64,
    pub below_cutoff: bool,
    pub in_band: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdComparison {
    pub individual: Vec<CaseThreshold>,
    pub mean_trust_at_inflection: f64,
    /// Population standard deviation
    pub std_trust_at_inflection: f64,
    pub all_below_cutoff: bool,
    pub all_in_band: bool,
    pub supports_hypothesis: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedCapacity {
    pub cases: Vec<String>,
    pub peak_k: Vec<f64>,
    pub collapse_durations: Vec<f64>,
    /// `None` with fewer than two cases or a constant sample
    pub correlation: Option<f64>,
    pub p_value: Option<f64>,
    pub supports_hypothesis: bool,
}

/// All three comparisons over one case set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub sequences: SequenceComparison,
    pub thresholds: ThresholdComparison,
    pub speed_capacity: SpeedCapacity,
}

/// Harmonies ordered by the index of their own peak.
///
/// A harmony peaking at the final sample has not started declining within
/// the record and is left out. Ties keep harmony order.
pub fn decline_sequence(case: &HistoricalCase) -> Vec<Harmony> {
    let last = case.len().saturating_sub(1);
    let mut peaks: Vec<(Harmony, usize)> = Harmony::ALL
        .iter()
        .filter_map(|&h| {
            let row = case.harmony(h);
            argmax(&row).filter(|&p| p < last).map(|p| (h, p))
        })
        .collect();
    peaks.sort_by_key(|&(_, p)| p);
    peaks.into_iter().map(|(h, _)| h).collect()
}

/// Most frequent harmony; ties go to the lowest harmony index.
fn modal(values: impl IntoIterator<Item = Harmony>) -> Option<Harmony> {
    let mut counts = [0usize; N_HARMONIES];
    for h in values {
        counts[h.index()] += 1;
    }
    let mut best: Option<(usize, usize)> = None;
    for (i, &c) in counts.iter().enumerate() {
        if c > 0 && best.map_or(true, |(_, bc)| c > bc) {
            best = Some((i, c));
        }
    }
    best.and_then(|(i, _)| Harmony::from_index(i))
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Compares collapse dynamics across historical cases.
#[derive(Debug, Clone)]
pub struct MultiCaseComparator {
    cases: Vec<HistoricalCase>,
    config: ComparatorConfig,
}

impl MultiCaseComparator {
    pub fn new(cases: Vec<HistoricalCase>) -> Result<Self> {
        Self::with_config(cases, ComparatorConfig::default())
    }

    pub fn with_config(cases: Vec<HistoricalCase>, config: ComparatorConfig) -> Result<Self> {
        if cases.is_empty() {
            return Err(CollapseError::EmptyInput("no cases to compare".into()));
        }
        Ok(Self { cases, config })
    }

    pub fn cases(&self) -> &[HistoricalCase] {
        &self.cases
    }

    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    pub fn compare_cascade_sequences(&self) -> SequenceComparison {
        let individual: Vec<CaseSequence> = self
            .cases
            .iter()
            .map(|case| {
                let sequence = decline_sequence(case);
                log::debug!("{}: decline sequence {:?}", case.name(), sequence);
                CaseSequence {
                    case: case.name().to_string(),
                    first_to_decline: sequence.first().copied(),
                    last_to_decline: sequence.last().copied(),
                    sequence,
                }
            })
            .collect();

        let modal_first = modal(individual.iter().filter_map(|s| s.first_to_decline));
        let modal_last = modal(individual.iter().filter_map(|s| s.last_to_decline));

        SequenceComparison {
            trust_first_count: individual
                .iter()
                .filter(|s| s.first_to_decline == Some(Harmony::Trust))
                .count(),
            technology_last_count: individual
                .iter()
                .filter(|s| s.last_to_decline == Some(Harmony::Technology))
                .count(),
            supports_hypothesis: modal_first == Some(Harmony::Trust)
                && modal_last == Some(Harmony::Technology),
            individual,
            modal_first,
            modal_last,
        }
    }

    /// Index of the most negative second difference of K(t).
    ///
    /// A heuristic for where the decline became self-reinforcing; with
    /// [`SpacingPolicy::SampleIndex`] it ignores irregular sampling.
    fn inflection_index(&self, case: &HistoricalCase) -> Result<usize> {
        let k = case.k_index();
        let d2 = match self.config.spacing {
            SpacingPolicy::SampleIndex => gradient(&gradient(&k)),
            SpacingPolicy::TimeAxis => {
                let d1 = gradient_with_axis(&k, case.time())?;
                gradient_with_axis(&d1, case.time())?
            }
        };
        let neg: Vec<f64> = d2.iter().map(|v| -v).collect();
        argmax(&neg).ok_or_else(|| CollapseError::EmptyInput(case.name().to_string()))
    }

    /// Trust at the K(t) inflection point of each case.
    ///
    /// Cases with fewer than three samples have no meaningful second
    /// difference and are skipped.
    pub fn compare_trust_thresholds(&self) -> Result<ThresholdComparison> {
        let (lo, hi) = self.config.threshold_band;
        let mut individual = Vec::with_capacity(self.cases.len());

        for case in &self.cases {
            if case.len() < 3 {
                log::warn!(
                    "skipping '{}' in threshold comparison: {} samples",
                    case.name(),
                    case.len()
                );
                continue;
            }
            let idx = self.inflection_index(case)?;
            let trust = case.trust()[idx];
            individual.push(CaseThreshold {
                case: case.name().to_string(),
                inflection_index: idx,
                inflection_time: case.time()[idx],
                trust_at_inflection: trust,
                below_cutoff: trust < self.config.trust_cutoff,
                in_band: lo < trust && trust < hi,
            });
        }

        if individual.is_empty() {
            return Err(CollapseError::EmptyInput(
                "no case long enough for an inflection point".into(),
            ));
        }

        let values: Vec<f64> = individual.iter().map(|c| c.trust_at_inflection).collect();
        let (mean, std) = mean_std(&values);
        let all_below_cutoff = individual.iter().all(|c| c.below_cutoff);

        Ok(ThresholdComparison {
            mean_trust_at_inflection: mean,
            std_trust_at_inflection: std,
            all_below_cutoff,
            all_in_band: individual.iter().all(|c| c.in_band),
            supports_hypothesis: all_below_cutoff,
            individual,
        })
    }

    /// Correlation between peak K and collapse duration across cases.
    pub fn compare_speed_capacity(&self) -> Result<SpeedCapacity> {
        let mut peak_k = Vec::with_capacity(self.cases.len());
        let mut durations = Vec::with_capacity(self.cases.len());

        for case in &self.cases {
            let k = case.k_index();
            let pn = peak_and_nadir(&k)
                .ok_or_else(|| CollapseError::EmptyInput(case.name().to_string()))?;
            peak_k.push(k[pn.peak]);
            durations.push(case.time()[pn.nadir] - case.time()[pn.peak]);
        }

        let corr = if peak_k.len() < 2 {
            None
        } else {
            correlation(&peak_k, &durations)?
        };

        let supports_hypothesis = corr.map_or(false, |c| {
            c.r > self.config.correlation_threshold && c.p_value < self.config.p_value_threshold
        });

        Ok(SpeedCapacity {
            cases: self.cases.iter().map(|c| c.name().to_string()).collect(),
            peak_k,
            collapse_durations: durations,
            correlation: corr.map(|c| c.r),
            p_value: corr.map(|c| c.p_value),
            supports_hypothesis,
        })
    }

    pub fn compare_all(&self) -> Result<ComparisonReport> {
        Ok(ComparisonReport {
            sequences: self.compare_cascade_sequences(),
            thresholds: self.compare_trust_thresholds()?,
            speed_capacity: self.compare_speed_capacity()?,
        })
    }
}
