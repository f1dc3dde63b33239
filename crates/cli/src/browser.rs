//! Browser capability for a terminal: print the URL for the user to open.

use cynapp_storefront::checkout::{BrowserError, ExternalBrowser};
use url::Url;

use crate::render;

/// Hands URLs to the user through stdout.
#[derive(Debug, Clone, Copy)]
pub struct SystemBrowser;

impl ExternalBrowser for SystemBrowser {
    fn open(&self, url: &Url) -> Result<(), BrowserError> {
        render::open_url(url);
        Ok(())
    }

    fn close(&self) {}
}
