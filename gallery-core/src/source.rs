//! Upstream metadata source.

use async_trait::async_trait;

use crate::error::Result;
use crate::record::SourceRecord;

/// Document-query capability returning records with property bags.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Every published record, in upstream order.
    async fn list_records(&self) -> Result<Vec<SourceRecord>>;

    /// One record, `None` if it does not exist.
    async fn get_record(&self, id: &str) -> Result<Option<SourceRecord>>;
}
