use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Gender context used to steer the hairstyle analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(format!("unknown gender: {other} (expected male or female)")),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => f.write_str("Male"),
            Gender::Female => f.write_str("Female"),
        }
    }
}

/// UI language. Korean is the product default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ko,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Ko => "ko",
            Language::En => "en",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ko" | "kr" | "korean" => Ok(Language::Ko),
            "en" | "english" => Ok(Language::En),
            other => Err(format!("unsupported language: {other} (expected ko or en)")),
        }
    }
}

/// Coarse screen the user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardStep {
    #[default]
    Welcome,
    Analysis,
    Result,
}

impl WizardStep {
    /// Zero-based position in the three-step flow.
    pub fn index(&self) -> usize {
        match self {
            WizardStep::Welcome => 0,
            WizardStep::Analysis => 1,
            WizardStep::Result => 2,
        }
    }

    /// Fill fraction of the progress bar, in (0, 1].
    pub fn progress(&self) -> f32 {
        (self.index() + 1) as f32 / 3.0
    }
}

/// Options handed to the analysis collaborator and echoed back with its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub gender: Gender,
    /// Free-form collaborator options (e.g. "length" = "short").
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl AnalysisOptions {
    pub fn new(gender: Gender) -> Self {
        Self {
            gender,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }
}

/// Photo captured before analysis. Bytes are never serialized.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedImage {
    /// MIME type, e.g. "image/jpeg".
    pub mime: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl CapturedImage {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Recommendation payload produced by the AI collaborator.
///
/// Opaque to the session core: it is carried to the result screen as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleRecommendation(pub serde_json::Value);

/// Everything the result screen needs after a completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub recommendation: StyleRecommendation,
    pub image: Option<CapturedImage>,
    pub options: AnalysisOptions,
}

/// Token identifying one analysis attempt.
///
/// Issued when the user enters the analysis step. Completions carrying any
/// other token are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}

/// Today's usage counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Local calendar day the count belongs to.
    pub date: NaiveDate,
    /// Analyses completed on `date`.
    pub count: u32,
    /// Credits earned by sharing. Survive day changes.
    pub bonus_credits: u32,
}

impl UsageRecord {
    /// A fresh record for `date` with nothing used and no credits.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            count: 0,
            bonus_credits: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_parse() {
        assert_eq!("male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!(" Female ".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!("F".parse::<Gender>().unwrap(), Gender::Female);
        assert!("other".parse::<Gender>().is_err());
    }

    #[test]
    fn test_language_parse_and_default() {
        assert_eq!(Language::default(), Language::Ko);
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert_eq!("ko".parse::<Language>().unwrap().code(), "ko");
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_step_progress() {
        assert!((WizardStep::Welcome.progress() - 1.0 / 3.0).abs() < 1e-6);
        assert!((WizardStep::Analysis.progress() - 2.0 / 3.0).abs() < 1e-6);
        assert!((WizardStep::Result.progress() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_captured_image_bytes_not_serialized() {
        let image = CapturedImage::new("image/png", vec![1, 2, 3]);
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json, serde_json::json!({ "mime": "image/png" }));
        assert_eq!(image.len(), 3);
    }

    #[test]
    fn test_options_extras_skipped_when_empty() {
        let json = serde_json::to_value(AnalysisOptions::new(Gender::Male)).unwrap();
        assert_eq!(json, serde_json::json!({ "gender": "Male" }));

        let with_extra = AnalysisOptions::new(Gender::Female).with_extra("length", "short");
        assert_eq!(with_extra.extras.get("length").map(String::as_str), Some("short"));
    }
}
