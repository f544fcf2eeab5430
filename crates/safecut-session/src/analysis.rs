//! Contract with the external analysis collaborator.
//!
//! The collaborator does face capture and AI generation. It must pass the
//! session's limit check before doing any costly work, and reports either a
//! result or nothing at all; a failed analysis leaves the wizard where it is.

use crate::controller::{LimitDecision, SessionError, SessionHandle};
use safecut_core::{
    AnalysisOptions, AnalysisResult, AppState, AttemptId, CapturedImage, Language,
    StyleRecommendation,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("no face found in the captured image")]
    NoFace,
    #[error("analysis backend failed: {0}")]
    Backend(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// What the collaborator is asked to do.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub attempt: AttemptId,
    pub options: AnalysisOptions,
    pub language: Language,
}

/// What the collaborator produces.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub recommendation: StyleRecommendation,
    pub image: Option<CapturedImage>,
    /// Options actually used; normally the requested ones.
    pub options: AnalysisOptions,
}

/// Face capture + hairstyle generation backend.
pub trait Analyzer: Send + 'static {
    fn analyze(&mut self, request: &AnalysisRequest) -> Result<AnalysisOutput, AnalyzerError>;
}

/// How an analysis attempt ended.
#[derive(Debug)]
pub enum AnalysisRun {
    /// Result stored and usage counted; the wizard is on the result step.
    Completed(AppState),
    /// Quota used up; the limit modal is showing and nothing ran.
    LimitReached(AppState),
    /// The attempt was superseded (reset, or already completed).
    Stale,
    /// The collaborator failed; nothing was recorded.
    Failed(AnalyzerError),
}

/// Check the limit for `attempt`, run `analyzer` off the async runtime, and
/// deliver its result.
pub async fn run_analysis<A: Analyzer>(
    handle: &SessionHandle,
    attempt: AttemptId,
    mut analyzer: A,
) -> Result<AnalysisRun, SessionError> {
    let options = match handle.check_limit(attempt).await? {
        LimitDecision::Allowed(options) => options,
        LimitDecision::Denied => return Ok(AnalysisRun::LimitReached(handle.snapshot().await?)),
        LimitDecision::Stale => return Ok(AnalysisRun::Stale),
    };

    let request = AnalysisRequest {
        attempt,
        options,
        language: handle.snapshot().await?.language,
    };
    tracing::info!(%attempt, gender = %request.options.gender, "analysis started");

    let output = tokio::task::spawn_blocking(move || analyzer.analyze(&request)).await?;

    match output {
        Ok(output) => {
            let result = AnalysisResult {
                recommendation: output.recommendation,
                image: output.image,
                options: output.options,
            };
            if handle.complete_analysis(attempt, result).await? {
                Ok(AnalysisRun::Completed(handle.snapshot().await?))
            } else {
                Ok(AnalysisRun::Stale)
            }
        }
        Err(e) => {
            tracing::warn!(%attempt, error = %e, "analysis failed; nothing recorded");
            Ok(AnalysisRun::Failed(e))
        }
    }
}
