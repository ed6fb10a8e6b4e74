pub mod azure;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::model::iteration::Iteration;
use crate::model::work_item::WorkItem;
use crate::patch::PatchDocument;

/// A work item linked to an iteration, as returned by the iteration
/// work-items endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkItemReference {
    pub target: WorkItemLink,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkItemLink {
    pub id: i64,
}

/// The remote work-item store. Transport, auth and retries live behind this
/// boundary; the processor only sees these five operations.
#[async_trait]
pub trait WorkItemStore: Send + Sync {
    /// References to every work item linked to the iteration.
    async fn get_iteration_work_items(&self, iteration_id: &str)
        -> Result<Vec<WorkItemReference>>;

    /// Full records, with field and relation expansion, for the given ids.
    async fn get_work_items_by_ids(&self, ids: &[i64]) -> Result<Vec<WorkItem>>;

    /// Create a new work item of `work_item_type` from a patch document.
    /// The store assigns the new id and url.
    async fn create_work_item(
        &self,
        patch: &PatchDocument,
        work_item_type: &str,
    ) -> Result<WorkItem>;

    /// Apply a patch document to an existing work item.
    async fn update_work_item(&self, patch: &PatchDocument, id: i64) -> Result<WorkItem>;

    /// The team's iterations, with their Past/Current/Future time frames.
    async fn list_iterations(&self) -> Result<Vec<Iteration>>;
}
