/// Configuration for the download client
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("drive-bulk-downloader/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
