use crate::errors::{AppError, Result};

/// Opens a URL outside the app, typically a new browser tab.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// Uses the system's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserOpener;

impl UrlOpener for BrowserOpener {
    fn open(&self, url: &str) -> Result<()> {
        log::info!("Opening {} in browser", url);
        webbrowser::open(url)
            .map_err(|e| AppError::Player(format!("Failed to open {}: {}", url, e)))
    }
}
