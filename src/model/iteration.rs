use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrame {
    Past,
    Current,
    Future,
}

/// A time-boxed sprint. `path` is what work items carry in
/// `System.IterationPath`; `id` is what the iteration endpoints key on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Iteration {
    pub id: String,
    pub name: String,
    pub path: String,
    pub time_frame: TimeFrame,
}
