//! Analyzer that replays a recommendation saved from the AI backend.
//!
//! Lets the whole wizard run without network access: the recommendation
//! comes from a JSON file and the photo from an image file on disk.

use safecut_core::{CapturedImage, StyleRecommendation};
use safecut_session::{AnalysisOutput, AnalysisRequest, Analyzer, AnalyzerError};
use std::path::{Path, PathBuf};

pub struct RecordedAnalyzer {
    recommendation: PathBuf,
    image: Option<PathBuf>,
    extras: Vec<(String, String)>,
}

impl RecordedAnalyzer {
    pub fn new(recommendation: PathBuf, image: Option<PathBuf>, extras: Vec<(String, String)>) -> Self {
        Self {
            recommendation,
            image,
            extras,
        }
    }
}

impl Analyzer for RecordedAnalyzer {
    fn analyze(&mut self, request: &AnalysisRequest) -> Result<AnalysisOutput, AnalyzerError> {
        let image = self.image.as_deref().map(load_image).transpose()?;

        let raw = std::fs::read_to_string(&self.recommendation)?;
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            AnalyzerError::Backend(format!(
                "{}: invalid recommendation JSON: {e}",
                self.recommendation.display()
            ))
        })?;

        let mut options = request.options.clone();
        for (key, val) in &self.extras {
            options = options.with_extra(key.clone(), val.clone());
        }

        tracing::debug!(
            path = %self.recommendation.display(),
            image = image.as_ref().map(|i| i.len()),
            "replayed recommendation"
        );

        Ok(AnalysisOutput {
            recommendation: StyleRecommendation(value),
            image,
            options,
        })
    }
}

/// Read a captured photo and detect its format from the content.
pub fn load_image(path: &Path) -> Result<CapturedImage, AnalyzerError> {
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(AnalyzerError::NoFace);
    }
    let format = image::guess_format(&bytes).map_err(|e| {
        AnalyzerError::Backend(format!("{}: unrecognized image: {e}", path.display()))
    })?;
    Ok(CapturedImage::new(format.to_mime_type(), bytes))
}
