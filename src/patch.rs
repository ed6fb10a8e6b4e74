//! Pure translation of sprint-close mutations into the JSON patch documents
//! the work-item store expects. Nothing in here touches the network.

use serde::Serialize;
use serde_json::{json, Value};

use crate::model::iteration::Iteration;
use crate::model::work_item::{
    WorkItem, HIERARCHY_REVERSE, ITERATION_PATH_FIELD, STATE_FIELD, TITLE_FIELD,
};
use crate::title::next_title;

/// Store-managed fields that must never be copied onto a new work item:
/// identifiers, timestamps, revision counters, board/rank fields. Title,
/// state and iteration path are also listed here because the builders set
/// them explicitly.
pub const SYSTEM_FIELDS: &[&str] = &[
    "System.IterationId",
    "System.ExternalLinkCount",
    "System.HyperLinkCount",
    "System.AttachedFileCount",
    "System.NodeName",
    "System.RevisedDate",
    "System.ChangedDate",
    "System.Id",
    "System.AreaId",
    "System.AuthorizedAs",
    "System.State",
    "System.AuthorizedDate",
    "System.Watermark",
    "System.Rev",
    "System.ChangedBy",
    "System.Reason",
    "System.WorkItemType",
    "System.CreatedDate",
    "System.CreatedBy",
    "System.History",
    "System.RelatedLinkCount",
    "System.BoardColumn",
    "System.BoardColumnDone",
    "System.BoardLane",
    "System.CommentCount",
    "System.TeamProject",
    "System.AreaLevel1",
    "System.IterationLevel1",
    "System.IterationLevel2",
    "Microsoft.VSTS.Common.StateChangeDate",
    "Microsoft.VSTS.Common.ActivatedDate",
    "Microsoft.VSTS.Common.ActivatedBy",
    "System.AreaPath",
    "Microsoft.VSTS.Scheduling.CompletedWork",
    "System.IterationPath",
    "System.Title",
    "Microsoft.VSTS.Common.ClosedBy",
    "Microsoft.VSTS.Common.ClosedDate",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Add,
    Replace,
    Remove,
}

/// One operation of a JSON patch document, serialized bit-exact to the wire
/// shape the store consumes (`value` is `null` on remove).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchOperation {
    pub op: Op,
    pub path: String,
    pub value: Value,
}

pub type PatchDocument = Vec<PatchOperation>;

impl PatchOperation {
    fn add(path: String, value: Value) -> Self {
        Self { op: Op::Add, path, value }
    }

    fn replace(path: String, value: Value) -> Self {
        Self { op: Op::Replace, path, value }
    }

    fn remove(path: String) -> Self {
        Self { op: Op::Remove, path, value: Value::Null }
    }
}

fn hierarchy_link(url: &str) -> Value {
    json!({ "rel": HIERARCHY_REVERSE, "url": url })
}

fn copy_fields(item: &WorkItem, doc: &mut PatchDocument) {
    for (key, value) in &item.fields {
        if !SYSTEM_FIELDS.contains(&key.as_str()) {
            doc.push(PatchOperation::add(format!("/fields/{key}"), value.clone()));
        }
    }
}

/// Clone `item` into the destination iteration as a child of the work item at
/// `parent_url`. Fed to `createWorkItem`.
pub fn copy_with_child_relation(
    item: &WorkItem,
    parent_url: &str,
    destination: &Iteration,
) -> PatchDocument {
    let mut doc = PatchDocument::new();
    copy_fields(item, &mut doc);
    doc.push(PatchOperation::add(
        format!("/fields/{TITLE_FIELD}"),
        json!(next_title(item.title(), &destination.name)),
    ));
    doc.push(PatchOperation::add(
        format!("/fields/{ITERATION_PATH_FIELD}"),
        json!(destination.path),
    ));
    doc.push(PatchOperation::add(
        "/relations/-".into(),
        hierarchy_link(parent_url),
    ));
    doc
}

/// Clone a parent `item` into the destination iteration. The copy restarts
/// its workflow in "Active" and keeps the original's own hierarchy parent
/// (e.g. a Feature) when it has one.
pub fn copy_with_parent_relation(item: &WorkItem, destination: &Iteration) -> PatchDocument {
    let mut doc = PatchDocument::new();
    copy_fields(item, &mut doc);
    doc.push(PatchOperation::add(
        format!("/fields/{TITLE_FIELD}"),
        json!(next_title(item.title(), &destination.name)),
    ));
    doc.push(PatchOperation::add(
        format!("/fields/{ITERATION_PATH_FIELD}"),
        json!(destination.path),
    ));
    doc.push(PatchOperation::add(
        format!("/fields/{STATE_FIELD}"),
        json!("Active"),
    ));
    if let Some((_, feature)) = item.parent_relation() {
        doc.push(PatchOperation::add(
            "/relations/-".into(),
            hierarchy_link(&feature.url),
        ));
    }
    doc
}

/// Mark the original of a copied parent as superseded by its successor.
pub fn supersede_title(item: &WorkItem) -> PatchDocument {
    vec![PatchOperation::replace(
        format!("/fields/{TITLE_FIELD}"),
        json!(format!("{} ->", item.title())),
    )]
}

/// Move a child into the destination iteration and repoint its hierarchy
/// parent at `parent_url`. The hierarchy relation is located by its rel type,
/// not by position; a child without one gets the link appended.
pub fn relink_child(child: &WorkItem, parent_url: &str, destination: &Iteration) -> PatchDocument {
    // Field replacements stay ahead of relation edits; the store applies
    // operations positionally.
    let mut doc = vec![PatchOperation::replace(
        format!("/fields/{ITERATION_PATH_FIELD}"),
        json!(destination.path),
    )];
    match child.parent_relation() {
        Some((index, _)) => {
            doc.push(PatchOperation::remove(format!("/relations/{index}")));
            doc.push(PatchOperation::add(
                format!("/relations/{index}"),
                hierarchy_link(parent_url),
            ));
        }
        None => doc.push(PatchOperation::add(
            "/relations/-".into(),
            hierarchy_link(parent_url),
        )),
    }
    doc
}

/// Single state transition on an existing item.
pub fn transition_state(state: &str) -> PatchDocument {
    vec![PatchOperation::replace(
        format!("/fields/{STATE_FIELD}"),
        json!(state),
    )]
}

/// In-place carry-forward: only the iteration path changes.
pub fn move_to_iteration(destination: &Iteration) -> PatchDocument {
    vec![PatchOperation::replace(
        format!("/fields/{ITERATION_PATH_FIELD}"),
        json!(destination.path),
    )]
}
