//! The sprint-closing decision engine. Groups the source iteration's work
//! items into parent/child clusters, classifies each cluster, and issues the
//! corresponding store mutations. One failed mutation never aborts the rest
//! of the run; everything is reported through the injected error sink.

use thiserror::Error;
use tracing::{error, info};

use crate::errlog::{ErrorRecord, ErrorSink};
use crate::model::cluster::WorkItemCluster;
use crate::model::iteration::Iteration;
use crate::model::work_item::WorkItem;
use crate::patch;
use crate::store::WorkItemStore;
use crate::title;

/// Work-item types that can anchor a cluster.
const PARENT_TYPES: &[&str] = &["User Story", "Bug", "Ticket"];
const CHILD_TYPE: &str = "Task";

#[derive(Debug, Error)]
pub enum CloseError {
    /// The grouping fetch failed; with no clusters known the run aborts.
    #[error("failed to fetch sprint work items: {0:#}")]
    Fetch(anyhow::Error),
    /// A single create/update call failed; recorded, run continues.
    #[error("work item {0}: {1:#}")]
    Mutation(i64, anyhow::Error),
    /// A cluster that needs a parent has none; its remaining work is skipped.
    #[error("cluster has no parent work item")]
    MissingParent,
}

impl CloseError {
    pub fn work_item_id(&self) -> Option<i64> {
        match self {
            CloseError::Mutation(id, _) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub clusters: usize,
    pub total_items: usize,
    pub errors_recorded: usize,
}

pub struct SprintProcessor<'a> {
    store: &'a dyn WorkItemStore,
    errors: &'a dyn ErrorSink,
    destination: Iteration,
}

impl<'a> SprintProcessor<'a> {
    pub fn new(
        store: &'a dyn WorkItemStore,
        errors: &'a dyn ErrorSink,
        destination: Iteration,
    ) -> Self {
        Self {
            store,
            errors,
            destination,
        }
    }

    /// Fetch and cluster everything the source iteration touches.
    ///
    /// Parent candidates are non-Closed items of a parent-capable type; each
    /// gets the Tasks whose relations point back at it. Tasks matching no
    /// parent are dropped, and items under a Closed parent stay invisible.
    pub async fn select_all_clusters(
        &self,
        source: &Iteration,
    ) -> Result<Vec<WorkItemCluster>, CloseError> {
        let refs = self
            .store
            .get_iteration_work_items(&source.id)
            .await
            .map_err(CloseError::Fetch)?;
        let ids: Vec<i64> = refs.iter().map(|r| r.target.id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let work_items = self
            .store
            .get_work_items_by_ids(&ids)
            .await
            .map_err(CloseError::Fetch)?;

        let mut parents = Vec::new();
        let mut tasks = Vec::new();
        for wi in work_items {
            if PARENT_TYPES.contains(&wi.work_item_type()) && wi.state() != "Closed" {
                parents.push(wi);
            } else if wi.work_item_type() == CHILD_TYPE {
                tasks.push(wi);
            }
        }

        Ok(parents
            .into_iter()
            .map(|parent| {
                let children = tasks
                    .iter()
                    .filter(|t| t.links_to(&parent.url))
                    .cloned()
                    .collect();
                WorkItemCluster::new(Some(parent), children)
            })
            .collect())
    }

    /// Close the source sprint into the destination. Only a fetch failure
    /// aborts; every mutation failure is recorded and processing continues.
    /// `on_progress` is called after each cluster with a monotone percentage
    /// that ends at 100.
    pub async fn process(
        &self,
        source: &Iteration,
        mut on_progress: impl FnMut(u8),
    ) -> Result<RunSummary, CloseError> {
        let clusters = self.select_all_clusters(source).await?;
        let total: usize = clusters.iter().map(WorkItemCluster::len).sum();
        let mut summary = RunSummary {
            clusters: clusters.len(),
            total_items: total,
            errors_recorded: 0,
        };
        info!(
            source = %source.name,
            destination = %self.destination.name,
            clusters = summary.clusters,
            items = total,
            "closing sprint"
        );
        if clusters.is_empty() {
            on_progress(100);
            return Ok(summary);
        }

        let mut completed = 0usize;
        for cluster in &clusters {
            self.process_cluster(cluster, &mut summary).await;
            completed += cluster.len();
            on_progress((completed * 100 / total) as u8);
        }
        info!(errors = summary.errors_recorded, "sprint close finished");
        Ok(summary)
    }

    /// Classify one cluster and run its mutations. The empty-children case is
    /// guarded explicitly: no children routes to carry-forward, never to
    /// resolve.
    async fn process_cluster(&self, cluster: &WorkItemCluster, summary: &mut RunSummary) {
        let outcome = if cluster.parent.is_some()
            && cluster.children.iter().all(|c| c.state() == "New")
        {
            self.carry_forward(cluster, summary).await
        } else if !cluster.children.is_empty()
            && cluster.children.iter().all(|c| c.state() == "Closed")
        {
            self.resolve_parent(cluster).await
        } else {
            self.split_cluster(cluster, summary).await
        };
        if let Err(e) = outcome {
            self.report(e, summary);
        }
    }

    fn report(&self, err: CloseError, summary: &mut RunSummary) {
        error!(%err, "sprint close step failed");
        self.errors
            .record(ErrorRecord::new(err.to_string(), err.work_item_id()));
        summary.errors_recorded += 1;
    }

    /// Nothing started yet: move the whole cluster into the destination.
    /// Sprint-numbered parents are cloned so their title history survives;
    /// everything else just changes iteration path in place.
    async fn carry_forward(
        &self,
        cluster: &WorkItemCluster,
        summary: &mut RunSummary,
    ) -> Result<(), CloseError> {
        let parent = cluster.parent.as_ref().ok_or(CloseError::MissingParent)?;
        if title::has_sprint_suffix(parent.title()) {
            let new_parent = self.copy_with_parent(parent).await?;
            for child in &cluster.children {
                if let Err(e) = self.relink_child(child, &new_parent.url).await {
                    self.report(e, summary);
                }
            }
        } else {
            for item in cluster.all_items() {
                if let Err(e) = self.move_to_destination(item).await {
                    self.report(e, summary);
                }
            }
        }
        Ok(())
    }

    /// Every child is Closed: the parent's work is done.
    async fn resolve_parent(&self, cluster: &WorkItemCluster) -> Result<(), CloseError> {
        let parent = cluster.parent.as_ref().ok_or(CloseError::MissingParent)?;
        self.transition(parent, "Resolved").await
    }

    /// Mixed child states: clone the parent into the destination, move or
    /// clone the unfinished children under it, then retire the originals.
    async fn split_cluster(
        &self,
        cluster: &WorkItemCluster,
        summary: &mut RunSummary,
    ) -> Result<(), CloseError> {
        let parent = cluster.parent.as_ref().ok_or(CloseError::MissingParent)?;
        let new_parent = self.copy_with_parent(parent).await?;
        for child in cluster.children.iter().filter(|c| c.state() != "Closed") {
            let step = if child.state() == "New" {
                // Untouched work moves as-is, no copy.
                self.relink_child(child, &new_parent.url).await
            } else {
                self.split_child(child, &new_parent.url).await
            };
            if let Err(e) = step {
                self.report(e, summary);
            }
        }
        self.close_original(parent).await
    }

    /// Copy an in-progress child under the new parent, then close the
    /// original. The original stays open when the copy fails so no work goes
    /// missing.
    async fn split_child(&self, child: &WorkItem, parent_url: &str) -> Result<(), CloseError> {
        let doc = patch::copy_with_child_relation(child, parent_url, &self.destination);
        self.store
            .create_work_item(&doc, child.work_item_type())
            .await
            .map_err(|e| CloseError::Mutation(child.id, e))?;
        self.transition(child, "Closed").await
    }

    /// Mark the original as superseded, then create its successor in the
    /// destination. Sequenced so the copy only exists once the original is
    /// flagged.
    async fn copy_with_parent(&self, parent: &WorkItem) -> Result<WorkItem, CloseError> {
        let supersede = patch::supersede_title(parent);
        self.store
            .update_work_item(&supersede, parent.id)
            .await
            .map_err(|e| CloseError::Mutation(parent.id, e))?;
        let doc = patch::copy_with_parent_relation(parent, &self.destination);
        self.store
            .create_work_item(&doc, parent.work_item_type())
            .await
            .map_err(|e| CloseError::Mutation(parent.id, e))
    }

    async fn relink_child(&self, child: &WorkItem, parent_url: &str) -> Result<(), CloseError> {
        let doc = patch::relink_child(child, parent_url, &self.destination);
        self.store
            .update_work_item(&doc, child.id)
            .await
            .map(|_| ())
            .map_err(|e| CloseError::Mutation(child.id, e))
    }

    async fn move_to_destination(&self, item: &WorkItem) -> Result<(), CloseError> {
        let doc = patch::move_to_iteration(&self.destination);
        self.store
            .update_work_item(&doc, item.id)
            .await
            .map(|_| ())
            .map_err(|e| CloseError::Mutation(item.id, e))
    }

    /// Retire the original parent after a split: Tasks close, everything else
    /// resolves.
    async fn close_original(&self, item: &WorkItem) -> Result<(), CloseError> {
        let state = if item.work_item_type() == CHILD_TYPE {
            "Closed"
        } else {
            "Resolved"
        };
        self.transition(item, state).await
    }

    async fn transition(&self, item: &WorkItem, state: &str) -> Result<(), CloseError> {
        let doc = patch::transition_state(state);
        self.store
            .update_work_item(&doc, item.id)
            .await
            .map(|_| ())
            .map_err(|e| CloseError::Mutation(item.id, e))
    }
}
