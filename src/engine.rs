//! Engine configuration and the per-tick data model
//!
//! ```text
//! EngineConfig
//!   └─ KeyMapping (key, summary strategy)
//!        └─ SourceSpec (url, field → path, normalizer)
//!
//! tick:  Sample (one per source) → SampleSet → GroupedSeries → SummarizedValue
//! ```
//!
//! Mappings are loaded once from JSON and never mutated afterwards.

use crate::config::ConfigError;
use crate::extract::{Normalize, Normalizer};
use crate::summary::{Summarizer, SummaryMethod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Field name → value reported by one source
pub type Sample = BTreeMap<String, f64>;

/// Every source's sample for one key in one tick
pub type SampleSet = Vec<Sample>;

/// Field name → values from each source that reported it
pub type GroupedSeries = BTreeMap<String, Vec<f64>>;

/// Field name → summarized value, ready to publish
pub type SummarizedValue = BTreeMap<String, f64>;

/// One external data endpoint contributing values to a key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub url: String,

    /// Output field name → extraction path (e.g. `$.data.price`)
    pub paths: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalizer: Option<Normalizer>,

    /// Programmatic normalizer; takes precedence over `normalizer`
    #[serde(skip)]
    pub custom_normalizer: Option<Arc<dyn Normalize>>,
}

impl SourceSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            paths: BTreeMap::new(),
            normalizer: None,
            custom_normalizer: None,
        }
    }

    pub fn with_path(mut self, field: impl Into<String>, path: impl Into<String>) -> Self {
        self.paths.insert(field.into(), path.into());
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn with_custom_normalizer(mut self, normalizer: Arc<dyn Normalize>) -> Self {
        self.custom_normalizer = Some(normalizer);
        self
    }

    /// Normalizer in effect for this source, if any
    pub fn active_normalizer(&self) -> Option<&dyn Normalize> {
        match (&self.custom_normalizer, &self.normalizer) {
            (Some(custom), _) => Some(custom.as_ref()),
            (None, Some(named)) => Some(named as &dyn Normalize),
            (None, None) => None,
        }
    }
}

/// Binds a logical key to its sources and summarization strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMapping {
    pub key: String,

    pub sources: Vec<SourceSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryMethod>,

    /// Programmatic strategy; takes precedence over `summary`
    #[serde(skip)]
    pub custom_summarizer: Option<Arc<dyn Summarizer>>,
}

impl KeyMapping {
    pub fn new(key: impl Into<String>, sources: Vec<SourceSpec>) -> Self {
        Self {
            key: key.into(),
            sources,
            summary: None,
            custom_summarizer: None,
        }
    }

    pub fn with_summary(mut self, method: SummaryMethod) -> Self {
        self.summary = Some(method);
        self
    }

    pub fn with_custom_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.custom_summarizer = Some(summarizer);
        self
    }

    /// Strategy in effect for this key (mean without outliers when unset)
    pub fn summarizer(&self) -> &dyn Summarizer {
        match (&self.custom_summarizer, &self.summary) {
            (Some(custom), _) => custom.as_ref(),
            (None, Some(method)) => method as &dyn Summarizer,
            (None, None) => &SummaryMethod::MeanWithoutOutliers,
        }
    }
}

/// Ordered collection of key mappings, read-only for the process lifetime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub mappings: Vec<KeyMapping>,
}

impl EngineConfig {
    pub fn new(mappings: Vec<KeyMapping>) -> Result<Self, ConfigError> {
        let engine = Self { mappings };
        engine.validate()?;
        Ok(engine)
    }

    /// Load and validate the engine configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;

        Self::from_json(&json).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse { path: display, source },
            other => other,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let engine: EngineConfig = serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        engine.validate()?;

        log::info!("📋 Loaded {} key mappings", engine.mappings.len());
        Ok(engine)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for mapping in &self.mappings {
            if mapping.key.trim().is_empty() {
                return Err(ConfigError::InvalidValue("mapping key cannot be empty".to_string()));
            }
            if mapping.sources.is_empty() {
                return Err(ConfigError::InvalidValue(format!(
                    "mapping '{}' has no sources",
                    mapping.key
                )));
            }
            for source in &mapping.sources {
                if source.paths.is_empty() {
                    return Err(ConfigError::InvalidValue(format!(
                        "source {} for '{}' has no paths",
                        source.url, mapping.key
                    )));
                }
            }
        }
        Ok(())
    }
}
