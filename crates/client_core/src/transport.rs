use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{
        Board, BoardId, Organization, OrganizationId, Project, ProjectId, StatusId, Task, TaskId,
        TaskStatus,
    },
    error::ApiErrorBody,
    protocol::{
        CreateBoardRequest, CreateOrganizationRequest, CreateProjectRequest, CreateStatusRequest,
        CreateTaskRequest, Envelope, ReorderStatusesRequest, StatusOrder, TaskListQuery,
        TaskStatusChangeRequest, UpdateBoardRequest, UpdateOrganizationRequest,
        UpdateProjectRequest, UpdateStatusRequest, UpdateTaskRequest,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::ClientSettings,
    error::{ClientError, ClientResult},
    session::Session,
};

#[async_trait]
pub trait PlannerApi: Send + Sync {
    async fn list_organizations(&self) -> ClientResult<Vec<Organization>>;
    async fn create_organization(
        &self,
        request: &CreateOrganizationRequest,
    ) -> ClientResult<Organization>;
    async fn update_organization(
        &self,
        id: &OrganizationId,
        request: &UpdateOrganizationRequest,
    ) -> ClientResult<Organization>;
    async fn delete_organization(&self, id: &OrganizationId) -> ClientResult<()>;

    /// Every project visible to the caller, across all organizations.
    async fn list_projects(&self) -> ClientResult<Vec<Project>>;
    async fn create_project(&self, request: &CreateProjectRequest) -> ClientResult<Project>;
    async fn update_project(
        &self,
        id: &ProjectId,
        request: &UpdateProjectRequest,
    ) -> ClientResult<Project>;
    async fn delete_project(&self, id: &ProjectId) -> ClientResult<()>;

    async fn list_boards(&self, project: &ProjectId) -> ClientResult<Vec<Board>>;
    async fn create_board(&self, request: &CreateBoardRequest) -> ClientResult<Board>;
    async fn update_board(&self, id: &BoardId, request: &UpdateBoardRequest)
        -> ClientResult<Board>;
    async fn delete_board(&self, id: &BoardId) -> ClientResult<()>;

    async fn list_statuses(&self, board: &BoardId) -> ClientResult<Vec<TaskStatus>>;
    async fn create_status(
        &self,
        board: &BoardId,
        request: &CreateStatusRequest,
    ) -> ClientResult<TaskStatus>;
    async fn update_status(
        &self,
        board: &BoardId,
        status: &StatusId,
        request: &UpdateStatusRequest,
    ) -> ClientResult<TaskStatus>;
    async fn delete_status(&self, board: &BoardId, status: &StatusId) -> ClientResult<()>;
    async fn reorder_statuses(&self, board: &BoardId, orders: &[StatusOrder]) -> ClientResult<()>;

    async fn list_tasks(&self, board: &BoardId, query: &TaskListQuery) -> ClientResult<Vec<Task>>;
    async fn create_task(&self, request: &CreateTaskRequest) -> ClientResult<Task>;
    async fn update_task(&self, id: &TaskId, request: &UpdateTaskRequest) -> ClientResult<Task>;
    async fn delete_task(&self, id: &TaskId) -> ClientResult<()>;
    async fn change_task_status(
        &self,
        id: &TaskId,
        request: &TaskStatusChangeRequest,
    ) -> ClientResult<Task>;
}

pub struct HttpPlannerApi {
    http: Client,
    base_url: Url,
    session: Session,
}

impl HttpPlannerApi {
    pub fn new(base_url: Url, session: Session) -> Self {
        Self::with_client(Client::new(), base_url, session)
    }

    pub fn with_client(http: Client, base_url: Url, session: Session) -> Self {
        Self {
            http,
            base_url,
            session,
        }
    }

    pub fn from_settings(settings: &ClientSettings, session: Session) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self::with_client(http, settings.base_url()?, session))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| ClientError::Transport(format!("bad request path '{path}': {err}")))?;
        let Some(token) = self.session.token().await else {
            return Err(ClientError::NotSignedIn);
        };
        debug!(%method, %url, "api: issuing request");
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Single response gate: maps statuses into the error taxonomy and tears
    /// the session down on 401.
    async fn dispatch(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("api: 401 from {}, tearing down session", response.url());
            self.session.tear_down().await;
            return Err(ClientError::Unauthorized);
        }

        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&raw)
            .map(|body| body.describe(&raw))
            .unwrap_or_else(|_| raw.trim().to_string());
        warn!(status = status.as_u16(), %message, "api: request failed");
        Err(ClientError::from_status(status, message))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = self.dispatch(request).await?;
        let body: Envelope<T> = response.json().await?;
        Ok(body.into_inner())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let request = self.request(Method::GET, path).await?;
        self.fetch(request).await
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.request(method, path).await?.json(body);
        self.fetch(request).await
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        let request = self.request(Method::DELETE, path).await?;
        self.dispatch(request).await?;
        Ok(())
    }
}

#[async_trait]
impl PlannerApi for HttpPlannerApi {
    async fn list_organizations(&self) -> ClientResult<Vec<Organization>> {
        self.get("organizations").await
    }

    async fn create_organization(
        &self,
        request: &CreateOrganizationRequest,
    ) -> ClientResult<Organization> {
        self.send_json(Method::POST, "organizations", request).await
    }

    async fn update_organization(
        &self,
        id: &OrganizationId,
        request: &UpdateOrganizationRequest,
    ) -> ClientResult<Organization> {
        self.send_json(Method::PUT, &format!("organizations/{id}"), request)
            .await
    }

    async fn delete_organization(&self, id: &OrganizationId) -> ClientResult<()> {
        self.delete(&format!("organizations/{id}")).await
    }

    async fn list_projects(&self) -> ClientResult<Vec<Project>> {
        self.get("projects").await
    }

    async fn create_project(&self, request: &CreateProjectRequest) -> ClientResult<Project> {
        self.send_json(Method::POST, "projects", request).await
    }

    async fn update_project(
        &self,
        id: &ProjectId,
        request: &UpdateProjectRequest,
    ) -> ClientResult<Project> {
        self.send_json(Method::PUT, &format!("projects/{id}"), request)
            .await
    }

    async fn delete_project(&self, id: &ProjectId) -> ClientResult<()> {
        self.delete(&format!("projects/{id}")).await
    }

    async fn list_boards(&self, project: &ProjectId) -> ClientResult<Vec<Board>> {
        self.get(&format!("projects/{project}/boards")).await
    }

    async fn create_board(&self, request: &CreateBoardRequest) -> ClientResult<Board> {
        self.send_json(Method::POST, "boards", request).await
    }

    async fn update_board(
        &self,
        id: &BoardId,
        request: &UpdateBoardRequest,
    ) -> ClientResult<Board> {
        self.send_json(Method::PUT, &format!("boards/{id}"), request)
            .await
    }

    async fn delete_board(&self, id: &BoardId) -> ClientResult<()> {
        self.delete(&format!("boards/{id}")).await
    }

    async fn list_statuses(&self, board: &BoardId) -> ClientResult<Vec<TaskStatus>> {
        self.get(&format!("boards/{board}/statuses")).await
    }

    async fn create_status(
        &self,
        board: &BoardId,
        request: &CreateStatusRequest,
    ) -> ClientResult<TaskStatus> {
        self.send_json(Method::POST, &format!("boards/{board}/statuses"), request)
            .await
    }

    async fn update_status(
        &self,
        board: &BoardId,
        status: &StatusId,
        request: &UpdateStatusRequest,
    ) -> ClientResult<TaskStatus> {
        self.send_json(
            Method::PUT,
            &format!("boards/{board}/statuses/{status}"),
            request,
        )
        .await
    }

    async fn delete_status(&self, board: &BoardId, status: &StatusId) -> ClientResult<()> {
        self.delete(&format!("boards/{board}/statuses/{status}"))
            .await
    }

    async fn reorder_statuses(&self, board: &BoardId, orders: &[StatusOrder]) -> ClientResult<()> {
        let body = ReorderStatusesRequest {
            status_orders: orders.to_vec(),
        };
        let request = self
            .request(Method::PATCH, &format!("boards/{board}/statuses/reorder"))
            .await?
            .json(&body);
        self.dispatch(request).await?;
        Ok(())
    }

    async fn list_tasks(&self, board: &BoardId, query: &TaskListQuery) -> ClientResult<Vec<Task>> {
        let mut request = self
            .request(Method::GET, &format!("boards/{board}/tasks"))
            .await?;
        if !query.is_empty() {
            request = request.query(query);
        }
        self.fetch(request).await
    }

    async fn create_task(&self, request: &CreateTaskRequest) -> ClientResult<Task> {
        self.send_json(Method::POST, "tasks", request).await
    }

    async fn update_task(&self, id: &TaskId, request: &UpdateTaskRequest) -> ClientResult<Task> {
        self.send_json(Method::PUT, &format!("tasks/{id}"), request)
            .await
    }

    async fn delete_task(&self, id: &TaskId) -> ClientResult<()> {
        self.delete(&format!("tasks/{id}")).await
    }

    async fn change_task_status(
        &self,
        id: &TaskId,
        request: &TaskStatusChangeRequest,
    ) -> ClientResult<Task> {
        self.send_json(Method::PATCH, &format!("tasks/{id}/status"), request)
            .await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
