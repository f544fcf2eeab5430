//! System clipboard via `arboard`.
//!
//! A fresh handle is opened per copy: headless sessions (SSH, CI) have no
//! clipboard, and that must surface as an error rather than a panic.

use safecut_core::{Clipboard, ShareError};

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ShareError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ShareError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| ShareError::Clipboard(e.to_string()))?;
        tracing::debug!(len = text.len(), "copied to clipboard");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_text_never_panics() {
        // The clipboard may or may not exist where tests run.
        if let Err(e) = SystemClipboard.set_text("https://example.test") {
            assert!(matches!(e, ShareError::Clipboard(_)));
        }
    }
}
