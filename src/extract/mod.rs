//! Value Extractor
//!
//! Fetches one source, evaluates each configured path against the response and
//! produces a single `Sample`. There is no partial success: either every field
//! resolves to a float or the whole source fails.

pub mod fetcher;
pub mod normalize;
pub mod path;

pub use fetcher::{HttpFetcher, SourceFetcher};
pub use normalize::{Normalize, Normalizer, RawFields};

use crate::engine::{Sample, SourceSpec};
use crate::error::ExtractError;
use serde_json::Value;

/// Fetch a source and extract its sample
pub async fn fetch_sample(fetcher: &dyn SourceFetcher, spec: &SourceSpec) -> Result<Sample, ExtractError> {
    let document = fetcher.fetch(&spec.url).await?;
    extract_sample(spec, &document)
}

/// Evaluate a source's paths against an already-fetched document
pub fn extract_sample(spec: &SourceSpec, document: &Value) -> Result<Sample, ExtractError> {
    let mut raw = RawFields::new();
    for (field, path) in &spec.paths {
        let value = path::lookup(document, field, path)?;
        raw.insert(field.clone(), value.clone());
    }

    match spec.active_normalizer() {
        Some(normalizer) => {
            let sample = normalizer.normalize(&raw)?;
            for (field, value) in &sample {
                normalize::finite(field, *value)?;
            }
            Ok(sample)
        }
        None => raw
            .iter()
            .map(|(field, value)| Ok((field.clone(), normalize::require_number(field, value)?)))
            .collect(),
    }
}
