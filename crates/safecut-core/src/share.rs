//! Invite-a-friend sharing.
//!
//! Share texts are embedded at compile time from
//! `assets/share_messages.toml`. The platform supplies the actual share
//! sheet and clipboard through [`NativeShare`] and [`Clipboard`].
//!
//! Every invite grants a credit, whatever the share sheet reports. A
//! dismissed share sheet counts the same as a completed one.

use crate::types::Language;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

const SHARE_MESSAGES: &str = include_str!("../assets/share_messages.toml");

static CATALOG: OnceLock<Catalog> = OnceLock::new();

#[derive(Debug, Clone, Deserialize)]
struct Catalog {
    ko: ShareMessages,
    en: ShareMessages,
}

/// Localized strings for one language.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareMessages {
    pub title: String,
    pub text: String,
    /// Shown after the link is copied to the clipboard.
    pub copied: String,
}

fn catalog() -> &'static Catalog {
    CATALOG.get_or_init(|| match toml::from_str::<Catalog>(SHARE_MESSAGES) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "bad share message catalog; using built-in English");
            let fallback = ShareMessages {
                title: "SafeCut AI".into(),
                text: "Find your perfect hairstyle before you cut.".into(),
                copied: "Link copied!".into(),
            };
            Catalog {
                ko: fallback.clone(),
                en: fallback,
            }
        }
    })
}

/// Strings for `language`.
pub fn messages(language: Language) -> &'static ShareMessages {
    let catalog = catalog();
    match language {
        Language::Ko => &catalog.ko,
        Language::En => &catalog.en,
    }
}

/// What gets handed to the share sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub url: String,
}

impl SharePayload {
    pub fn new(language: Language, url: impl Into<String>) -> Self {
        let msgs = messages(language);
        Self {
            title: msgs.title.clone(),
            text: msgs.text.clone(),
            url: url.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("share sheet failed: {0}")]
    Failed(String),
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// How the native share sheet was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareCompletion {
    Completed,
    Cancelled,
}

/// Platform share sheet.
pub trait NativeShare: Send {
    fn share(&mut self, payload: &SharePayload) -> Result<ShareCompletion, ShareError>;
}

/// System clipboard, used when no share sheet exists.
pub trait Clipboard: Send {
    fn set_text(&mut self, text: &str) -> Result<(), ShareError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareChannel {
    Native,
    Clipboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareStatus {
    Completed,
    Cancelled,
    Failed,
}

/// Result of one invite attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareOutcome {
    pub channel: ShareChannel,
    pub status: ShareStatus,
    /// Confirmation text to display, if any.
    pub notice: Option<String>,
}

/// Share `payload`, falling back to copying its URL when there is no
/// share sheet.
pub fn invite(
    native: Option<&mut (dyn NativeShare + 'static)>,
    clipboard: &mut dyn Clipboard,
    payload: &SharePayload,
    language: Language,
) -> ShareOutcome {
    if let Some(sheet) = native {
        let status = match sheet.share(payload) {
            Ok(ShareCompletion::Completed) => ShareStatus::Completed,
            Ok(ShareCompletion::Cancelled) => {
                tracing::debug!("share sheet dismissed");
                ShareStatus::Cancelled
            }
            Err(e) => {
                tracing::warn!(error = %e, "share sheet failed");
                ShareStatus::Failed
            }
        };
        return ShareOutcome {
            channel: ShareChannel::Native,
            status,
            notice: None,
        };
    }

    match clipboard.set_text(&payload.url) {
        Ok(()) => ShareOutcome {
            channel: ShareChannel::Clipboard,
            status: ShareStatus::Completed,
            notice: Some(messages(language).copied.clone()),
        },
        Err(e) => {
            tracing::warn!(error = %e, url = %payload.url, "clipboard copy failed");
            ShareOutcome {
                channel: ShareChannel::Clipboard,
                status: ShareStatus::Failed,
                notice: None,
            }
        }
    }
}
