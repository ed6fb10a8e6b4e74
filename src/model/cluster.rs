use super::work_item::WorkItem;

/// A parent work item plus its direct Task children, the unit of
/// classification for one sprint-close run. A cluster without a parent can
/// still exist and must be handled without dereferencing one.
#[derive(Debug, Clone)]
pub struct WorkItemCluster {
    pub parent: Option<WorkItem>,
    pub children: Vec<WorkItem>,
}

impl WorkItemCluster {
    pub fn new(parent: Option<WorkItem>, children: Vec<WorkItem>) -> Self {
        Self { parent, children }
    }

    /// Parent first (when present), then children, matching the order the
    /// in-place carry-forward mutates them in.
    pub fn all_items(&self) -> impl Iterator<Item = &WorkItem> {
        self.parent.iter().chain(self.children.iter())
    }

    pub fn len(&self) -> usize {
        self.children.len() + usize::from(self.parent.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
