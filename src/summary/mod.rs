//! Aggregator
//!
//! Groups a key's `SampleSet` by field name and reduces every field's series
//! to a single number with the key's summarization strategy.

pub mod stats;

use crate::engine::{GroupedSeries, SampleSet, SummarizedValue};
use crate::error::AggregationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy contract: one key's samples in, one value per field out
pub trait Summarizer: Send + Sync + fmt::Debug {
    fn summarize(&self, key: &str, samples: &SampleSet) -> Result<SummarizedValue, AggregationError>;
}

/// Named strategies selectable from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMethod {
    Mean,
    Median,
    Mode,
    #[default]
    MeanWithoutOutliers,
    MedianWithoutOutliers,
    ModeWithoutOutliers,
}

impl SummaryMethod {
    /// Reduce one field's series
    pub fn reduce(&self, field: &str, series: &[f64]) -> Result<f64, AggregationError> {
        let non_finite = || AggregationError::NonFinite { field: field.to_string() };
        if series.iter().any(|x| !x.is_finite()) {
            return Err(non_finite());
        }

        let trimmed;
        let series = if self.trims_outliers() {
            trimmed = stats::remove_outliers(series);
            &trimmed[..]
        } else {
            series
        };

        if series.is_empty() {
            return Err(AggregationError::EmptySeries { field: field.to_string() });
        }

        let value = match self {
            SummaryMethod::Mean | SummaryMethod::MeanWithoutOutliers => stats::mean(series),
            SummaryMethod::Median | SummaryMethod::MedianWithoutOutliers => stats::median(series),
            SummaryMethod::Mode | SummaryMethod::ModeWithoutOutliers => stats::mode(series),
        };
        if !value.is_finite() {
            return Err(non_finite());
        }
        Ok(value)
    }

    pub fn trims_outliers(&self) -> bool {
        matches!(
            self,
            SummaryMethod::MeanWithoutOutliers
                | SummaryMethod::MedianWithoutOutliers
                | SummaryMethod::ModeWithoutOutliers
        )
    }
}

impl Summarizer for SummaryMethod {
    fn summarize(&self, key: &str, samples: &SampleSet) -> Result<SummarizedValue, AggregationError> {
        if samples.is_empty() {
            return Err(AggregationError::EmptyDataset { key: key.to_string() });
        }

        group_by_field(samples)
            .iter()
            .map(|(field, series)| Ok((field.clone(), self.reduce(field, series)?)))
            .collect()
    }
}

/// Collect every source's value for each field name
pub fn group_by_field(samples: &SampleSet) -> GroupedSeries {
    let mut grouped = GroupedSeries::new();
    for sample in samples {
        for (field, value) in sample {
            grouped.entry(field.clone()).or_default().push(*value);
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Sample;

    fn sample(pairs: &[(&str, f64)]) -> Sample {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_group_by_field() {
        let samples = vec![sample(&[("a", 10.0), ("b", 5.0)]), sample(&[("a", 20.0)])];
        let grouped = group_by_field(&samples);

        assert_eq!(grouped["a"].len(), 2);
        assert_eq!(grouped["b"].len(), 1);
        assert_eq!(grouped.len(), 2);
    }

    #[test]
    fn test_empty_dataset_fails() {
        let err = SummaryMethod::default().summarize("ETH", &Vec::new()).unwrap_err();
        assert_eq!(err, AggregationError::EmptyDataset { key: "ETH".to_string() });
    }

    #[test]
    fn test_default_is_mean_without_outliers() {
        let samples: SampleSet = [10.0, 11.0, 9.0, 10.0, 10.5, 9.5, 1e9]
            .iter()
            .map(|v| sample(&[("price", *v)]))
            .collect();

        let value = SummaryMethod::default().summarize("BTC", &samples).unwrap();
        assert_eq!(value["price"], 10.0);

        let raw = SummaryMethod::Mean.summarize("BTC", &samples).unwrap();
        assert!(raw["price"] > 1e8);
    }

    #[test]
    fn test_reducers_per_field() {
        let samples = vec![
            sample(&[("a", 1.0), ("b", 4.0)]),
            sample(&[("a", 2.0), ("b", 4.0)]),
            sample(&[("a", 6.0), ("b", 7.0)]),
        ];

        let median = SummaryMethod::Median.summarize("k", &samples).unwrap();
        assert_eq!(median["a"], 2.0);
        assert_eq!(median["b"], 4.0);

        let mode = SummaryMethod::Mode.summarize("k", &samples).unwrap();
        assert_eq!(mode["a"], 1.0);
        assert_eq!(mode["b"], 4.0);

        let mean = SummaryMethod::Mean.summarize("k", &samples).unwrap();
        assert_eq!(mean["a"], 3.0);
        assert_eq!(mean["b"], 5.0);
    }

    #[test]
    fn test_field_absent_everywhere_never_summarized() {
        let samples = vec![sample(&[("a", 1.0)]), sample(&[("a", 3.0)])];
        let value = SummaryMethod::MedianWithoutOutliers.summarize("k", &samples).unwrap();

        assert_eq!(value.keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(value["a"], 2.0);
    }

    #[test]
    fn test_nan_in_series_is_an_error() {
        let samples: SampleSet = [1.0, 2.0, f64::NAN]
            .iter()
            .map(|v| sample(&[("price", *v)]))
            .collect();

        for method in [SummaryMethod::MeanWithoutOutliers, SummaryMethod::Median, SummaryMethod::Mode] {
            assert_eq!(
                method.summarize("k", &samples).unwrap_err(),
                AggregationError::NonFinite { field: "price".to_string() }
            );
        }
    }

    #[test]
    fn test_overflowing_mean_is_an_error() {
        let samples = vec![sample(&[("a", f64::MAX)]), sample(&[("a", f64::MAX)])];
        assert!(matches!(
            SummaryMethod::Mean.summarize("k", &samples),
            Err(AggregationError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_method_names_in_config() {
        let method: SummaryMethod = serde_json::from_str("\"mode_without_outliers\"").unwrap();
        assert_eq!(method, SummaryMethod::ModeWithoutOutliers);
        assert!(method.trims_outliers());
        assert!(!SummaryMethod::Median.trims_outliers());
    }
}
