//! Coverage decoders.

pub mod json;
pub mod lcov;
pub mod xml;

use std::sync::Arc;

use crate::domain::models::CoverageFormat;
use crate::domain::ports::CoverageDecoder;

pub use json::JsonCoverageDecoder;
pub use lcov::LcovDecoder;
pub use xml::{CoberturaDecoder, JacocoDecoder};

/// Decoder for the configured artifact format.
pub fn decoder_for(format: CoverageFormat) -> Arc<dyn CoverageDecoder> {
    match format {
        CoverageFormat::Lcov => Arc::new(LcovDecoder),
        CoverageFormat::Json => Arc::new(JsonCoverageDecoder),
        CoverageFormat::Cobertura => Arc::new(CoberturaDecoder),
        CoverageFormat::Jacoco => Arc::new(JacocoDecoder),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_format_has_a_decoder() {
        let names: Vec<String> = [
            CoverageFormat::Lcov,
            CoverageFormat::Json,
            CoverageFormat::Cobertura,
            CoverageFormat::Jacoco,
        ]
        .into_iter()
        .map(|format| decoder_for(format).name().to_string())
        .collect();

        assert_eq!(names, ["lcov", "json", "cobertura", "jacoco"]);
    }
}
