use serde::{Deserialize, Serialize};

pub const COUNT_HEADER: &str = "x-pagination-count";
pub const OFFSET_HEADER: &str = "x-pagination-offset";
pub const LIMIT_HEADER: &str = "x-pagination-limit";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct PaginationMetadata {
    pub count: u64,
    pub offset: u64,
    pub limit: u32,
}

impl PaginationMetadata {
    /// True when items beyond `offset + fetched` remain on the server.
    pub fn has_more(&self, fetched: usize) -> bool {
        self.offset + (fetched as u64) < self.count
    }
}
