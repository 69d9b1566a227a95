/// Opens a page in a new browser tab.
pub trait TabOpener: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Hands the URL to the system's default opener.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl TabOpener for SystemOpener {
    fn open(&self, url: &str) -> std::io::Result<()> {
        tracing::debug!(%url, "Opening page");
        open::that(url)
    }
}
