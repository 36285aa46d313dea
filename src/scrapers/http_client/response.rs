//! Fetched page wrapper.

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Final URL the page was requested from.
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl Document {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 404: the page resolved but the lot is gone.
    pub fn is_absent(&self) -> bool {
        self.status == 404
    }

    /// Whether the fetch counts as resolved (no retry needed).
    pub fn is_resolved(&self) -> bool {
        self.is_success() || self.is_absent()
    }
}
