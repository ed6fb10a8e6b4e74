use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Relation type encoding "this item's parent is at `url`".
pub const HIERARCHY_REVERSE: &str = "System.LinkTypes.Hierarchy-Reverse";

pub const WORK_ITEM_TYPE_FIELD: &str = "System.WorkItemType";
pub const STATE_FIELD: &str = "System.State";
pub const TITLE_FIELD: &str = "System.Title";
pub const ITERATION_PATH_FIELD: &str = "System.IterationPath";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub rel: String,
    pub url: String,
}

/// A tracked unit of work as returned by the remote store with full field and
/// relation expansion. The store owns the canonical record; this is a
/// transient copy that can go stale across awaited calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
    pub url: String,
}

impl WorkItem {
    fn text_field(&self, name: &str) -> &str {
        self.fields
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    pub fn work_item_type(&self) -> &str {
        self.text_field(WORK_ITEM_TYPE_FIELD)
    }

    pub fn state(&self) -> &str {
        self.text_field(STATE_FIELD)
    }

    pub fn title(&self) -> &str {
        self.text_field(TITLE_FIELD)
    }

    pub fn iteration_path(&self) -> &str {
        self.text_field(ITERATION_PATH_FIELD)
    }

    /// The item's own hierarchy-parent relation, with its position in the
    /// relation sequence.
    pub fn parent_relation(&self) -> Option<(usize, &Relation)> {
        self.relations
            .iter()
            .enumerate()
            .find(|(_, r)| r.rel == HIERARCHY_REVERSE)
    }

    /// Whether any relation of this item points at `url`.
    pub fn links_to(&self, url: &str) -> bool {
        self.relations.iter().any(|r| r.url == url)
    }
}
