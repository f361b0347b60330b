//! Azure DevOps client and work item store.
//!
//! [`AzdoClient`] wraps the handful of REST calls the action needs:
//! - reading the board's extension field names (`_apis/work/boards`)
//! - a WIQL query for active items by title, followed by a batch read
//! - JSON-patch creation and update of work items
//!
//! [`AzdoStore`] adapts the client to the engine's [`TrackedItemStore`],
//! placing new items on the configured lane and column and moving closed
//! items to the closed column.
//!
//! All calls authenticate with a personal access token as HTTP Basic
//! credentials with an empty user name.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use todoticket_engine::reconcile::{ActiveItem, StoreError, TrackedItemStore};
use todoticket_engine::todo::TodoItem;
use tracing::{debug, error};

use crate::config::AzdoConfig;

/// Timeout for Azure DevOps requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const API_VERSION: &str = "6.0";

const JSON_PATCH_MEDIA_TYPE: &str = "application/json-patch+json";

/// Board whose row field names the lane and column extension fields.
const BOARD_NAME: &str = "Stories";

const LANE_SUFFIX: &str = ".Lane";
const COLUMN_SUFFIX: &str = ".Column";

/// Largest id list the work items endpoint accepts per request.
const MAX_BATCH_IDS: usize = 200;

/// Titles per WIQL query, keeping the query text under the WIQL length limit.
const MAX_QUERY_TITLES: usize = 100;

/// Fields read for active items.
const ACTIVE_ITEM_FIELDS: &str = "System.Id,System.Title,System.State,System.BoardLane";

const CLOSED_STATE: &str = "Closed";

/// Errors that can occur when talking to Azure DevOps.
#[derive(Debug, Error)]
pub enum AzdoError {
    /// The request timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Azure DevOps could not be reached.
    #[error("azure devops unavailable: {0}")]
    Unavailable(String),

    /// Azure DevOps answered with a non-success status.
    #[error("unexpected status {status} while {operation}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// The response could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Client configuration error.
    #[error("client configuration error: {0}")]
    Configuration(String),
}

/// Reference names of the board's lane and column extension fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardFields {
    pub lane: String,
    pub column: String,
}

impl BoardFields {
    /// Derives both names from the row field reference name, which is the
    /// lane field (`WEF_<guid>_Kanban.Lane`).
    pub fn from_row_field(reference_name: &str) -> Self {
        let prefix = reference_name
            .strip_suffix(LANE_SUFFIX)
            .unwrap_or(reference_name);
        Self {
            lane: format!("{prefix}{LANE_SUFFIX}"),
            column: format!("{prefix}{COLUMN_SUFFIX}"),
        }
    }
}

/// One JSON-patch `add` operation on a work item field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchOperation {
    op: &'static str,
    path: String,
    value: String,
}

impl PatchOperation {
    pub fn add(field: &str, value: impl Into<String>) -> Self {
        Self {
            op: "add",
            path: format!("/fields/{field}"),
            value: value.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Deserialize)]
struct BoardResponse {
    fields: BoardResponseFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoardResponseFields {
    row_field: FieldReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldReference {
    reference_name: String,
}

#[derive(Debug, Serialize)]
struct WiqlRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WiqlResponse {
    #[serde(default)]
    work_items: Vec<WorkItemReference>,
}

#[derive(Debug, Deserialize)]
struct WorkItemReference {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct WorkItemList {
    #[serde(default)]
    value: Vec<WorkItemResponse>,
}

#[derive(Debug, Deserialize)]
struct WorkItemResponse {
    id: Option<i64>,
    #[serde(default)]
    fields: HashMap<String, serde_json::Value>,
}

impl WorkItemResponse {
    fn field(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    }

    fn into_active_item(self) -> ActiveItem {
        ActiveItem {
            title: self.field("System.Title").unwrap_or_default(),
            state: self.field("System.State"),
            lane: self.field("System.BoardLane"),
            id: self.id,
        }
    }
}

/// Builds the WIQL query selecting non-closed items with one of `titles`.
pub fn active_items_query(titles: &[String]) -> String {
    let quoted: Vec<String> = titles
        .iter()
        .map(|t| format!("'{}'", t.replace('\'', "''")))
        .collect();
    format!(
        "SELECT [System.Id] FROM WorkItems \
         WHERE [System.TeamProject] = @project \
         AND [System.Title] IN ({}) \
         AND [System.State] <> '{CLOSED_STATE}'",
        quoted.join(", ")
    )
}

/// Client for the Azure DevOps REST API of one project.
#[derive(Debug, Clone)]
pub struct AzdoClient {
    http_client: Client,
    base_url: String,
    organization: String,
    project: String,
    team: String,
    auth_header: String,
}

impl AzdoClient {
    /// Creates a new client for the configured organization and project.
    ///
    /// # Errors
    ///
    /// Returns [`AzdoError::Configuration`] if the HTTP client cannot be created.
    pub fn new(config: &AzdoConfig) -> Result<Self, AzdoError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AzdoError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            organization: config.organization.clone(),
            project: config.project.clone(),
            team: config.team.clone(),
            auth_header: format!("Basic {}", STANDARD.encode(format!(":{}", config.token))),
        })
    }

    fn project_url(&self) -> String {
        format!("{}/{}/{}", self.base_url, self.organization, self.project)
    }

    /// Reads the lane and column field names of the team's board.
    ///
    /// # Errors
    ///
    /// Returns an [`AzdoError`] if the request fails or the board has no row
    /// field.
    pub async fn board_fields(&self) -> Result<BoardFields, AzdoError> {
        let url = format!(
            "{}/{}/_apis/work/boards/{BOARD_NAME}",
            self.project_url(),
            self.team
        );

        debug!(url = %url, "Fetching board fields");

        let response = self
            .send("reading board", self.http_client.get(&url))
            .await?;
        let board: BoardResponse = response.json().await.map_err(|e| {
            AzdoError::InvalidResponse(format!("failed to parse board response: {e}"))
        })?;

        let fields = BoardFields::from_row_field(&board.fields.row_field.reference_name);
        debug!(lane = %fields.lane, column = %fields.column, "Board fields resolved");
        Ok(fields)
    }

    /// Active (not closed) work items whose title is one of `titles`.
    ///
    /// # Errors
    ///
    /// Returns an [`AzdoError`] if the query or the item read fails.
    pub async fn query_active(&self, titles: &[String]) -> Result<Vec<ActiveItem>, AzdoError> {
        if titles.is_empty() {
            return Ok(Vec::new());
        }

        debug!(titles = titles.len(), "Querying active work items");

        let mut ids = Vec::new();
        for chunk in titles.chunks(MAX_QUERY_TITLES) {
            ids.extend(self.query_ids(chunk).await?);
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut items = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_BATCH_IDS) {
            items.extend(self.read_items(chunk).await?);
        }

        debug!(count = items.len(), "Fetched active work items");
        Ok(items)
    }

    async fn query_ids(&self, titles: &[String]) -> Result<Vec<i64>, AzdoError> {
        let url = format!("{}/_apis/wit/wiql", self.project_url());
        let request = WiqlRequest {
            query: active_items_query(titles),
        };

        let response = self
            .send("querying work items", self.http_client.post(&url).json(&request))
            .await?;
        let result: WiqlResponse = response.json().await.map_err(|e| {
            AzdoError::InvalidResponse(format!("failed to parse query response: {e}"))
        })?;

        Ok(result.work_items.iter().map(|w| w.id).collect())
    }

    async fn read_items(&self, ids: &[i64]) -> Result<Vec<ActiveItem>, AzdoError> {
        let url = format!("{}/{}/_apis/wit/workitems", self.base_url, self.organization);
        let ids = ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let request = self
            .http_client
            .get(&url)
            .query(&[("ids", ids.as_str()), ("fields", ACTIVE_ITEM_FIELDS)]);
        let response = self.send("reading work items", request).await?;
        let list: WorkItemList = response.json().await.map_err(|e| {
            AzdoError::InvalidResponse(format!("failed to parse work items: {e}"))
        })?;

        Ok(list
            .value
            .into_iter()
            .map(WorkItemResponse::into_active_item)
            .collect())
    }

    /// Creates a work item of `work_item_type` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an [`AzdoError`] if the request fails or the response has no id.
    pub async fn create_work_item(
        &self,
        work_item_type: &str,
        operations: &[PatchOperation],
    ) -> Result<i64, AzdoError> {
        let url = format!("{}/_apis/wit/workitems/${work_item_type}", self.project_url());
        let request = self.json_patch(self.http_client.post(&url), operations)?;
        let response = self.send("creating work item", request).await?;

        let created: WorkItemResponse = response.json().await.map_err(|e| {
            AzdoError::InvalidResponse(format!("failed to parse created work item: {e}"))
        })?;
        created
            .id
            .ok_or_else(|| AzdoError::InvalidResponse("created work item has no id".to_string()))
    }

    /// Applies `operations` to work item `id`.
    ///
    /// # Errors
    ///
    /// Returns an [`AzdoError`] if the request fails.
    pub async fn update_work_item(
        &self,
        id: i64,
        operations: &[PatchOperation],
    ) -> Result<(), AzdoError> {
        let url = format!("{}/_apis/wit/workitems/{id}", self.project_url());
        let request = self.json_patch(self.http_client.patch(&url), operations)?;
        self.send("updating work item", request).await?;
        Ok(())
    }

    fn json_patch(
        &self,
        request: RequestBuilder,
        operations: &[PatchOperation],
    ) -> Result<RequestBuilder, AzdoError> {
        let body = serde_json::to_vec(operations)
            .map_err(|e| AzdoError::InvalidResponse(format!("failed to encode patch: {e}")))?;
        Ok(request.header(CONTENT_TYPE, JSON_PATCH_MEDIA_TYPE).body(body))
    }

    /// Sends an authenticated request and checks its status.
    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, AzdoError> {
        let response = request
            .query(&[("api-version", API_VERSION)])
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AzdoError::Timeout(REQUEST_TIMEOUT)
                } else if e.is_connect() {
                    AzdoError::Unavailable(format!("connection failed: {e}"))
                } else {
                    AzdoError::Unavailable(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, operation, "Azure DevOps request failed");
            return Err(AzdoError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

/// Where new and closed items go on the board.
#[derive(Debug, Clone)]
struct Placement {
    project: String,
    work_item_type: String,
    closed_column: Option<String>,
    new_column: Option<String>,
    lane: Option<String>,
}

/// [`TrackedItemStore`] backed by Azure DevOps.
///
/// Board field names are fetched on first use and only when a lane or column
/// has to be written.
#[derive(Debug)]
pub struct AzdoStore {
    client: AzdoClient,
    placement: Placement,
    author: Option<String>,
    board: OnceCell<BoardFields>,
}

impl AzdoStore {
    pub fn new(client: AzdoClient, config: &AzdoConfig, author: Option<String>) -> Self {
        Self {
            client,
            placement: Placement {
                project: config.project.clone(),
                work_item_type: config.work_item_type.clone(),
                closed_column: config.closed_column.clone(),
                new_column: config.new_column.clone(),
                lane: config.lane.clone(),
            },
            author,
            board: OnceCell::new(),
        }
    }

    async fn board(&self) -> Result<&BoardFields, AzdoError> {
        self.board
            .get_or_try_init(|| self.client.board_fields())
            .await
    }

    /// Field operations creating a work item for `item`.
    ///
    /// # Errors
    ///
    /// Returns an [`AzdoError`] if board fields are needed and cannot be read.
    pub async fn create_operations(&self, item: &TodoItem) -> Result<Vec<PatchOperation>, AzdoError> {
        let mut operations = vec![
            PatchOperation::add("System.Title", item.title()),
            PatchOperation::add(
                "Microsoft.VSTS.TCM.ReproSteps",
                item.description(self.author.as_deref()),
            ),
            PatchOperation::add("Microsoft.VSTS.Common.Priority", "1"),
            PatchOperation::add("System.Tags", item.labels().join("; ")),
            PatchOperation::add("System.TeamProject", self.placement.project.as_str()),
        ];

        if let Some(lane) = &self.placement.lane {
            let board = self.board().await?;
            operations.push(PatchOperation::add(&board.lane, lane.as_str()));
        }
        if let Some(column) = &self.placement.new_column {
            let board = self.board().await?;
            operations.push(PatchOperation::add(&board.column, column.as_str()));
        }

        Ok(operations)
    }

    /// Field operations closing a work item.
    ///
    /// # Errors
    ///
    /// Returns an [`AzdoError`] if the board column field cannot be read.
    pub async fn close_operations(&self) -> Result<Vec<PatchOperation>, AzdoError> {
        match &self.placement.closed_column {
            Some(column) => {
                let board = self.board().await?;
                Ok(vec![PatchOperation::add(&board.column, column.as_str())])
            }
            None => Ok(vec![PatchOperation::add("System.State", CLOSED_STATE)]),
        }
    }
}

#[async_trait]
impl TrackedItemStore for AzdoStore {
    async fn active_items(&self, titles: &[String]) -> Result<Vec<ActiveItem>, StoreError> {
        Ok(self.client.query_active(titles).await?)
    }

    async fn create(&self, item: &TodoItem) -> Result<i64, StoreError> {
        let operations = self.create_operations(item).await?;
        Ok(self
            .client
            .create_work_item(&self.placement.work_item_type, &operations)
            .await?)
    }

    async fn close(&self, id: i64) -> Result<(), StoreError> {
        let operations = self.close_operations().await?;
        Ok(self.client.update_work_item(id, &operations).await?)
    }
}
