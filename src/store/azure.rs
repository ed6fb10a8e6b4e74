use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use super::{WorkItemReference, WorkItemStore};
use crate::config::AzureConfig;
use crate::model::iteration::{Iteration, TimeFrame};
use crate::model::work_item::WorkItem;
use crate::patch::PatchDocument;

const API_VERSION: &str = "7.0";

/// The work-items endpoint rejects requests for more than 200 ids.
const MAX_IDS_PER_REQUEST: usize = 200;

/// Azure DevOps implementation of the work-item store, authenticated with a
/// personal access token.
pub struct AzureStore {
    base_url: String,
    project: String,
    team: String,
    auth_header: String,
    client: reqwest::Client,
}

impl AzureStore {
    pub fn new(config: &AzureConfig) -> Self {
        // PAT auth is basic auth with an empty user name.
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!(":{}", config.pat));
        Self {
            base_url: format!(
                "https://dev.azure.com/{}",
                urlencoding::encode(&config.organization)
            ),
            project: urlencoding::encode(&config.project).into_owned(),
            team: urlencoding::encode(&config.team).into_owned(),
            auth_header: format!("Basic {encoded}"),
            client: reqwest::Client::new(),
        }
    }

    fn wit_url(&self, suffix: &str) -> String {
        format!(
            "{}/{}/_apis/wit/{suffix}?api-version={API_VERSION}",
            self.base_url, self.project
        )
    }

    fn team_settings_url(&self, suffix: &str) -> String {
        format!(
            "{}/{}/{}/_apis/work/teamsettings/{suffix}?api-version={API_VERSION}",
            self.base_url, self.project, self.team
        )
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IterationWorkItemsResponse {
    work_item_relations: Vec<WorkItemReference>,
}

#[derive(Deserialize)]
struct WorkItemsResponse {
    value: Vec<WorkItem>,
}

#[derive(Deserialize)]
struct IterationsResponse {
    value: Vec<WireIteration>,
}

#[derive(Deserialize)]
struct WireIteration {
    id: String,
    name: String,
    path: String,
    attributes: IterationAttributes,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IterationAttributes {
    time_frame: TimeFrame,
}

#[async_trait]
impl WorkItemStore for AzureStore {
    async fn get_iteration_work_items(
        &self,
        iteration_id: &str,
    ) -> Result<Vec<WorkItemReference>> {
        let url = self.team_settings_url(&format!("iterations/{iteration_id}/workitems"));
        let resp: IterationWorkItemsResponse = self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .send()
            .await
            .context("iteration work items request failed")?
            .error_for_status()
            .context("iteration work items request rejected")?
            .json()
            .await
            .context("failed to parse iteration work items response")?;
        Ok(resp.work_item_relations)
    }

    async fn get_work_items_by_ids(&self, ids: &[i64]) -> Result<Vec<WorkItem>> {
        let mut items = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let joined = chunk
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let url = format!("{}&ids={joined}&$expand=all", self.wit_url("workitems"));
            let resp: WorkItemsResponse = self
                .client
                .get(&url)
                .header("Authorization", &self.auth_header)
                .send()
                .await
                .context("work items request failed")?
                .error_for_status()
                .context("work items request rejected")?
                .json()
                .await
                .context("failed to parse work items response")?;
            items.extend(resp.value);
        }
        Ok(items)
    }

    async fn create_work_item(
        &self,
        patch: &PatchDocument,
        work_item_type: &str,
    ) -> Result<WorkItem> {
        let url = self.wit_url(&format!(
            "workitems/${}",
            urlencoding::encode(work_item_type)
        ));
        self.client
            .post(&url)
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json-patch+json")
            .json(patch)
            .send()
            .await
            .context("create work item request failed")?
            .error_for_status()
            .context("create work item rejected")?
            .json()
            .await
            .context("failed to parse created work item")
    }

    async fn update_work_item(&self, patch: &PatchDocument, id: i64) -> Result<WorkItem> {
        let url = self.wit_url(&format!("workitems/{id}"));
        self.client
            .patch(&url)
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json-patch+json")
            .json(patch)
            .send()
            .await
            .context("update work item request failed")?
            .error_for_status()
            .context("update work item rejected")?
            .json()
            .await
            .context("failed to parse updated work item")
    }

    async fn list_iterations(&self) -> Result<Vec<Iteration>> {
        let url = self.team_settings_url("iterations");
        let resp: IterationsResponse = self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .send()
            .await
            .context("iterations request failed")?
            .error_for_status()
            .context("iterations request rejected")?
            .json()
            .await
            .context("failed to parse iterations response")?;
        Ok(resp
            .value
            .into_iter()
            .map(|it| Iteration {
                id: it.id,
                name: it.name,
                path: it.path,
                time_frame: it.attributes.time_frame,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AzureStore {
        AzureStore::new(&AzureConfig {
            organization: "acme org".into(),
            project: "Web Shop".into(),
            team: "Checkout Team".into(),
            pat: "secret".into(),
        })
    }

    #[test]
    fn urls_encode_org_project_and_team() {
        let s = store();
        assert_eq!(
            s.team_settings_url("iterations"),
            "https://dev.azure.com/acme%20org/Web%20Shop/Checkout%20Team/_apis/work/teamsettings/iterations?api-version=7.0"
        );
        assert_eq!(
            s.wit_url("workitems/12"),
            "https://dev.azure.com/acme%20org/Web%20Shop/_apis/wit/workitems/12?api-version=7.0"
        );
    }

    #[test]
    fn iteration_wire_shape_parses() {
        let json = r#"{
            "value": [{
                "id": "a1",
                "name": "Sprint 2.2",
                "path": "Web Shop\\Sprint 2.2",
                "attributes": { "startDate": null, "finishDate": null, "timeFrame": "current" }
            }]
        }"#;
        let resp: IterationsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.value[0].attributes.time_frame, TimeFrame::Current);
    }

    #[test]
    fn iteration_work_items_wire_shape_parses() {
        let json = r#"{
            "workItemRelations": [
                { "rel": null, "source": null, "target": { "id": 42, "url": "https://dev/wi/42" } }
            ]
        }"#;
        let resp: IterationWorkItemsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.work_item_relations[0].target.id, 42);
    }
}
