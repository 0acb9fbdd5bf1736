use crate::NormalizedUrl;

/// One unit of traversal work, consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierTask {
    pub url: NormalizedUrl,
    pub depth: u32,
    pub parent: Option<NormalizedUrl>,
    /// Discovery order, stamped by the frontier when the task is accepted.
    pub sequence: u64,
}

impl FrontierTask {
    pub fn seed(url: NormalizedUrl) -> Self {
        Self {
            url,
            depth: 0,
            parent: None,
            sequence: 0,
        }
    }

    /// Task for a link discovered on `self`, one level deeper. The depth
    /// saturates at `u32::MAX`.
    pub fn child(&self, url: NormalizedUrl) -> Self {
        Self {
            url,
            depth: self.depth.saturating_add(1),
            parent: Some(self.url.clone()),
            sequence: 0,
        }
    }
}
