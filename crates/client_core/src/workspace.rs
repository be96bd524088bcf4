use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use shared::{
    domain::{
        Board, BoardId, BoardViewType, Organization, OrganizationId, Project, ProjectId, StatusId,
        TagId, Task, TaskId, TaskPriority, TaskStatus, UserId,
    },
    protocol::{
        CreateBoardRequest, CreateOrganizationRequest, CreateProjectRequest, CreateStatusRequest,
        CreateTaskRequest, TaskListQuery, TaskStatusChangeRequest, UpdateBoardRequest,
        UpdateOrganizationRequest, UpdateProjectRequest, UpdateStatusRequest, UpdateTaskRequest,
    },
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, ClientResult, Level},
    filter::TaskFilter,
    kanban::TaskStatusSink,
    status_board,
    transport::PlannerApi,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchLevel {
    Organizations,
    Projects,
    Boards,
    Tasks,
    Statuses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    level: FetchLevel,
    seq: u64,
}

#[derive(Debug, Default)]
struct FetchTickets {
    latest: HashMap<FetchLevel, u64>,
}

impl FetchTickets {
    fn issue(&mut self, level: FetchLevel) -> Ticket {
        let seq = self.latest.entry(level).or_insert(0);
        *seq += 1;
        Ticket { level, seq: *seq }
    }

    fn is_latest(&self, ticket: Ticket) -> bool {
        self.latest.get(&ticket.level) == Some(&ticket.seq)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadRequest {
    Organizations {
        ticket: Ticket,
    },
    Projects {
        ticket: Ticket,
        organization: OrganizationId,
    },
    Boards {
        ticket: Ticket,
        project: ProjectId,
    },
    Tasks {
        ticket: Ticket,
        board: BoardId,
    },
    Statuses {
        ticket: Ticket,
        board: BoardId,
    },
}

#[derive(Debug)]
pub enum ReloadResult {
    Organizations {
        ticket: Ticket,
        result: ClientResult<Vec<Organization>>,
    },
    Projects {
        ticket: Ticket,
        organization: OrganizationId,
        result: ClientResult<Vec<Project>>,
    },
    Boards {
        ticket: Ticket,
        project: ProjectId,
        result: ClientResult<Vec<Board>>,
    },
    Tasks {
        ticket: Ticket,
        board: BoardId,
        result: ClientResult<Vec<Task>>,
    },
    Statuses {
        ticket: Ticket,
        board: BoardId,
        result: ClientResult<Vec<TaskStatus>>,
    },
}

impl ReloadRequest {
    pub fn level(&self) -> FetchLevel {
        match self {
            Self::Organizations { ticket }
            | Self::Projects { ticket, .. }
            | Self::Boards { ticket, .. }
            | Self::Tasks { ticket, .. }
            | Self::Statuses { ticket, .. } => ticket.level,
        }
    }

    pub async fn run(self, api: Arc<dyn PlannerApi>) -> ReloadResult {
        debug!(level = ?self.level(), "workspace: fetch issued");
        match self {
            Self::Organizations { ticket } => ReloadResult::Organizations {
                ticket,
                result: api.list_organizations().await,
            },
            Self::Projects {
                ticket,
                organization,
            } => ReloadResult::Projects {
                ticket,
                result: api.list_projects().await,
                organization,
            },
            Self::Boards { ticket, project } => ReloadResult::Boards {
                ticket,
                result: api.list_boards(&project).await,
                project,
            },
            Self::Tasks { ticket, board } => ReloadResult::Tasks {
                ticket,
                result: api.list_tasks(&board, &TaskListQuery::default()).await,
                board,
            },
            Self::Statuses { ticket, board } => ReloadResult::Statuses {
                ticket,
                result: api.list_statuses(&board).await,
                board,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    Notification(Notification),
    SelectionChanged {
        organization: Option<OrganizationId>,
        project: Option<ProjectId>,
        board: Option<BoardId>,
    },
    CollectionChanged(FetchLevel),
    SignInRequired,
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceState {
    pub organizations: Vec<Organization>,
    pub projects: Vec<Project>,
    pub boards: Vec<Board>,
    pub tasks: Vec<Task>,
    pub statuses: Vec<TaskStatus>,
    pub selected_organization: Option<OrganizationId>,
    pub selected_project: Option<ProjectId>,
    pub selected_board: Option<BoardId>,
    pub filter: TaskFilter,
    projects_of: Option<OrganizationId>,
    boards_of: Option<ProjectId>,
    tasks_of: Option<BoardId>,
    statuses_of: Option<BoardId>,
}

impl WorkspaceState {
    pub fn selected_board(&self) -> Option<&Board> {
        let id = self.selected_board.as_ref()?;
        self.boards.iter().find(|board| &board.id == id)
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    pub fn status(&self, id: &StatusId) -> Option<&TaskStatus> {
        self.statuses.iter().find(|status| &status.id == id)
    }

    pub fn needs_board_choice(&self) -> bool {
        self.selected_project.is_some() && self.selected_board.is_none()
    }

    fn clear_projects(&mut self) {
        self.projects.clear();
        self.projects_of = None;
        self.selected_project = None;
        self.clear_boards();
    }

    fn clear_boards(&mut self) {
        self.boards.clear();
        self.boards_of = None;
        self.selected_board = None;
        self.clear_board_contents();
    }

    fn clear_board_contents(&mut self) {
        self.tasks.clear();
        self.tasks_of = None;
        self.statuses.clear();
        self.statuses_of = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardColumn<'a> {
    pub status: &'a TaskStatus,
    pub tasks: Vec<&'a Task>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub status: StatusId,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub assignee: Option<UserId>,
    pub tags: Vec<TagId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDraft {
    pub name: String,
    pub color: Option<String>,
    pub is_final: bool,
}

pub struct WorkspaceController {
    api: Arc<dyn PlannerApi>,
    state: WorkspaceState,
    tickets: FetchTickets,
    events: broadcast::Sender<WorkspaceEvent>,
}

impl WorkspaceController {
    pub fn new(api: Arc<dyn PlannerApi>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            api,
            state: WorkspaceState::default(),
            tickets: FetchTickets::default(),
            events,
        }
    }

    pub fn state(&self) -> &WorkspaceState {
        &self.state
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.events.subscribe()
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.state.filter = filter;
    }

    pub fn visible_tasks(&self) -> Vec<&Task> {
        self.state.filter.apply(&self.state.tasks)
    }

    pub fn columns(&self) -> Vec<BoardColumn<'_>> {
        let visible = self.visible_tasks();
        let mut statuses: Vec<&TaskStatus> = self.state.statuses.iter().collect();
        statuses.sort_by_key(|status| status.order_index);
        statuses
            .into_iter()
            .map(|status| BoardColumn {
                status,
                tasks: visible
                    .iter()
                    .copied()
                    .filter(|task| task.status_id() == &status.id)
                    .collect(),
            })
            .collect()
    }

    fn emit(&self, event: WorkspaceEvent) {
        let _ = self.events.send(event);
    }

    fn notify_success(&self, message: impl Into<String>) {
        self.emit(WorkspaceEvent::Notification(Notification {
            level: NotificationLevel::Success,
            message: message.into(),
        }));
    }

    fn report_failure(&self, action: &str, err: &ClientError) {
        warn!(action, error = %err, "workspace: action failed");
        self.emit(WorkspaceEvent::Notification(Notification {
            level: NotificationLevel::Error,
            message: err.user_message(action),
        }));
        if err.requires_reauth() {
            self.emit(WorkspaceEvent::SignInRequired);
        }
    }

    fn fail<T>(&self, action: &str, err: ClientError) -> ClientResult<T> {
        self.report_failure(action, &err);
        Err(err)
    }

    fn selection_changed(&self) {
        info!(
            organization = ?self.state.selected_organization,
            project = ?self.state.selected_project,
            board = ?self.state.selected_board,
            "workspace: selection changed"
        );
        self.emit(WorkspaceEvent::SelectionChanged {
            organization: self.state.selected_organization.clone(),
            project: self.state.selected_project.clone(),
            board: self.state.selected_board.clone(),
        });
    }

    // ---- reload plumbing ----

    /// Issues a fresh ticket for `level`, superseding any fetch still in flight for it.
    pub fn begin_reload(&mut self, level: FetchLevel) -> Option<ReloadRequest> {
        let request = match level {
            FetchLevel::Organizations => ReloadRequest::Organizations {
                ticket: self.tickets.issue(level),
            },
            FetchLevel::Projects => ReloadRequest::Projects {
                organization: self.state.selected_organization.clone()?,
                ticket: self.tickets.issue(level),
            },
            FetchLevel::Boards => ReloadRequest::Boards {
                project: self.state.selected_project.clone()?,
                ticket: self.tickets.issue(level),
            },
            FetchLevel::Tasks => ReloadRequest::Tasks {
                board: self.state.selected_board.clone()?,
                ticket: self.tickets.issue(level),
            },
            FetchLevel::Statuses => ReloadRequest::Statuses {
                board: self.state.selected_board.clone()?,
                ticket: self.tickets.issue(level),
            },
        };
        Some(request)
    }

    fn board_contents_requests(&mut self) -> Vec<ReloadRequest> {
        [FetchLevel::Tasks, FetchLevel::Statuses]
            .into_iter()
            .filter_map(|level| self.begin_reload(level))
            .collect()
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        let current = self.tickets.is_latest(ticket);
        if !current {
            debug!(level = ?ticket.level, seq = ticket.seq, "workspace: discarding stale response");
        }
        current
    }

    /// Applies a finished fetch and returns the dependent fetches it triggers.
    pub fn apply_reload(&mut self, result: ReloadResult) -> Vec<ReloadRequest> {
        match result {
            ReloadResult::Organizations { ticket, result } => {
                if !self.is_current(ticket) {
                    return Vec::new();
                }
                self.apply_organizations(result)
            }
            ReloadResult::Projects {
                ticket,
                organization,
                result,
            } => {
                if !self.is_current(ticket)
                    || self.state.selected_organization.as_ref() != Some(&organization)
                {
                    return Vec::new();
                }
                self.apply_projects(organization, result)
            }
            ReloadResult::Boards {
                ticket,
                project,
                result,
            } => {
                if !self.is_current(ticket)
                    || self.state.selected_project.as_ref() != Some(&project)
                {
                    return Vec::new();
                }
                self.apply_boards(project, result);
                Vec::new()
            }
            ReloadResult::Tasks {
                ticket,
                board,
                result,
            } => {
                if !self.is_current(ticket) || self.state.selected_board.as_ref() != Some(&board) {
                    return Vec::new();
                }
                match result {
                    Ok(tasks) => {
                        self.state.tasks = tasks;
                        self.state.tasks_of = Some(board);
                        self.emit(WorkspaceEvent::CollectionChanged(FetchLevel::Tasks));
                    }
                    Err(err) => {
                        self.report_failure("Load tasks", &err);
                        if self.state.tasks_of.as_ref() != Some(&board) {
                            self.state.tasks.clear();
                            self.state.tasks_of = None;
                        }
                    }
                }
                Vec::new()
            }
            ReloadResult::Statuses {
                ticket,
                board,
                result,
            } => {
                if !self.is_current(ticket) || self.state.selected_board.as_ref() != Some(&board) {
                    return Vec::new();
                }
                match result {
                    Ok(statuses) => {
                        self.state.statuses = statuses;
                        self.state.statuses_of = Some(board);
                        self.emit(WorkspaceEvent::CollectionChanged(FetchLevel::Statuses));
                    }
                    Err(err) => {
                        self.report_failure("Load statuses", &err);
                        if self.state.statuses_of.as_ref() != Some(&board) {
                            self.state.statuses.clear();
                            self.state.statuses_of = None;
                        }
                    }
                }
                Vec::new()
            }
        }
    }

    fn apply_organizations(
        &mut self,
        result: ClientResult<Vec<Organization>>,
    ) -> Vec<ReloadRequest> {
        let organizations = match result {
            Ok(organizations) => organizations,
            Err(err) => {
                self.report_failure("Load organizations", &err);
                return Vec::new();
            }
        };
        self.state.organizations = organizations;
        self.emit(WorkspaceEvent::CollectionChanged(FetchLevel::Organizations));

        let still_present = self.state.selected_organization.as_ref().is_some_and(|id| {
            self.state
                .organizations
                .iter()
                .any(|organization| &organization.id == id)
        });
        if still_present {
            return Vec::new();
        }
        match self.state.organizations.first().map(|org| org.id.clone()) {
            Some(first) => self.set_organization(first),
            None => {
                self.state.selected_organization = None;
                self.state.clear_projects();
                self.selection_changed();
                Vec::new()
            }
        }
    }

    fn apply_projects(
        &mut self,
        organization: OrganizationId,
        result: ClientResult<Vec<Project>>,
    ) -> Vec<ReloadRequest> {
        let projects = match result {
            Ok(projects) => projects,
            Err(err) => {
                self.report_failure("Load projects", &err);
                if self.state.projects_of.as_ref() != Some(&organization) {
                    self.state.clear_projects();
                    self.selection_changed();
                }
                return Vec::new();
            }
        };
        self.state.projects = projects
            .into_iter()
            .filter(|project| project.organization.id == organization)
            .collect();
        self.state.projects_of = Some(organization);
        self.emit(WorkspaceEvent::CollectionChanged(FetchLevel::Projects));

        let still_present = self.state.selected_project.as_ref().is_some_and(|id| {
            self.state.projects.iter().any(|project| &project.id == id)
        });
        if still_present {
            return Vec::new();
        }
        match self.state.projects.first().map(|project| project.id.clone()) {
            Some(first) => self.set_project(first),
            None => {
                self.state.selected_project = None;
                self.state.clear_boards();
                self.selection_changed();
                Vec::new()
            }
        }
    }

    fn apply_boards(&mut self, project: ProjectId, result: ClientResult<Vec<Board>>) {
        let boards = match result {
            Ok(boards) => boards,
            Err(err) => {
                self.report_failure("Load boards", &err);
                if self.state.boards_of.as_ref() != Some(&project) {
                    self.state.clear_boards();
                    self.selection_changed();
                }
                return;
            }
        };
        self.state.boards = boards;
        self.state.boards_of = Some(project);
        self.emit(WorkspaceEvent::CollectionChanged(FetchLevel::Boards));

        // Boards are never picked automatically; the user chooses or creates one.
        let selected_missing = self
            .state
            .selected_board
            .as_ref()
            .is_some_and(|id| !self.state.boards.iter().any(|board| &board.id == id));
        if selected_missing {
            self.state.selected_board = None;
            self.state.clear_board_contents();
            self.selection_changed();
        }
    }

    fn set_organization(&mut self, id: OrganizationId) -> Vec<ReloadRequest> {
        if self.state.selected_organization.as_ref() != Some(&id) {
            self.state.selected_organization = Some(id);
            self.state.clear_projects();
            self.selection_changed();
        }
        self.begin_reload(FetchLevel::Projects).into_iter().collect()
    }

    fn set_project(&mut self, id: ProjectId) -> Vec<ReloadRequest> {
        if self.state.selected_project.as_ref() != Some(&id) {
            self.state.selected_project = Some(id);
            self.state.clear_boards();
            self.selection_changed();
        }
        self.begin_reload(FetchLevel::Boards).into_iter().collect()
    }

    fn set_board(&mut self, id: BoardId) -> Vec<ReloadRequest> {
        if self.state.selected_board.as_ref() != Some(&id) {
            self.state.selected_board = Some(id);
            self.state.clear_board_contents();
            self.selection_changed();
        }
        self.board_contents_requests()
    }

    /// Runs `requests` and everything they trigger; independent fetches of a
    /// round run concurrently.
    pub async fn drive(&mut self, requests: Vec<ReloadRequest>) {
        let mut round = requests;
        while !round.is_empty() {
            let results = join_all(
                round
                    .into_iter()
                    .map(|request| request.run(Arc::clone(&self.api))),
            )
            .await;
            round = Vec::new();
            for result in results {
                round.extend(self.apply_reload(result));
            }
        }
    }

    async fn reload(&mut self, level: FetchLevel) {
        let requests: Vec<ReloadRequest> = self.begin_reload(level).into_iter().collect();
        self.drive(requests).await;
    }

    // ---- selection ----

    pub async fn load_organizations(&mut self) {
        self.reload(FetchLevel::Organizations).await;
    }

    pub async fn select_organization(&mut self, id: OrganizationId) {
        let requests = self.set_organization(id);
        self.drive(requests).await;
    }

    pub async fn select_project(&mut self, id: ProjectId) {
        let requests = self.set_project(id);
        self.drive(requests).await;
    }

    pub async fn select_board(&mut self, id: BoardId) {
        let requests = self.set_board(id);
        self.drive(requests).await;
    }

    pub async fn reload_tasks(&mut self) {
        self.reload(FetchLevel::Tasks).await;
    }

    pub async fn reload_statuses(&mut self) {
        self.reload(FetchLevel::Statuses).await;
    }

    // ---- organizations ----

    pub async fn create_organization(
        &mut self,
        request: CreateOrganizationRequest,
    ) -> ClientResult<Organization> {
        match self.api.create_organization(&request).await {
            Ok(organization) => {
                info!(organization = %organization.id, "workspace: organization created");
                self.notify_success("Organization created");
                self.load_organizations().await;
                Ok(organization)
            }
            Err(err) => self.fail("Create organization", err),
        }
    }

    pub async fn update_organization(
        &mut self,
        id: &OrganizationId,
        request: UpdateOrganizationRequest,
    ) -> ClientResult<Organization> {
        match self.api.update_organization(id, &request).await {
            Ok(organization) => {
                self.notify_success("Organization updated");
                self.load_organizations().await;
                Ok(organization)
            }
            Err(err) => self.fail("Update organization", err),
        }
    }

    pub async fn delete_organization(&mut self, id: &OrganizationId) -> ClientResult<()> {
        if let Err(err) = self.api.delete_organization(id).await {
            return self.fail("Delete organization", err);
        }
        info!(organization = %id, "workspace: organization deleted");
        self.notify_success("Organization deleted");
        if self.state.selected_organization.as_ref() == Some(id) {
            self.state.selected_organization = None;
            self.state.clear_projects();
            self.selection_changed();
        }
        self.load_organizations().await;
        Ok(())
    }

    // ---- projects ----

    /// The selected organization always owns the new project; the draft's
    /// organization is used only when none is selected.
    pub async fn create_project(
        &mut self,
        mut request: CreateProjectRequest,
    ) -> ClientResult<Project> {
        let organization = match (&self.state.selected_organization, &request.organization_id) {
            (Some(selected), _) => selected.clone(),
            (None, Some(chosen)) => chosen.clone(),
            (None, None) => {
                return self.fail(
                    "Create project",
                    ClientError::MissingSelection(Level::Organization),
                )
            }
        };
        request.organization_id = Some(organization.clone());

        let project = match self.api.create_project(&request).await {
            Ok(project) => project,
            Err(err) => return self.fail("Create project", err),
        };
        info!(project = %project.id, %organization, "workspace: project created");
        self.notify_success("Project created");

        let mut requests = self.set_organization(organization);
        requests.extend(self.set_project(project.id.clone()));
        self.drive(requests).await;
        Ok(project)
    }

    pub async fn update_project(
        &mut self,
        id: &ProjectId,
        request: UpdateProjectRequest,
    ) -> ClientResult<Project> {
        match self.api.update_project(id, &request).await {
            Ok(project) => {
                self.notify_success("Project updated");
                self.reload(FetchLevel::Projects).await;
                Ok(project)
            }
            Err(err) => self.fail("Update project", err),
        }
    }

    pub async fn delete_project(&mut self, id: &ProjectId) -> ClientResult<()> {
        if let Err(err) = self.api.delete_project(id).await {
            return self.fail("Delete project", err);
        }
        info!(project = %id, "workspace: project deleted");
        self.notify_success("Project deleted");
        if self.state.selected_project.as_ref() == Some(id) {
            self.state.selected_project = None;
            self.state.clear_boards();
            self.selection_changed();
        }
        self.reload(FetchLevel::Projects).await;
        Ok(())
    }

    // ---- boards ----

    pub async fn create_board(
        &mut self,
        name: impl Into<String>,
        view_type: Option<BoardViewType>,
    ) -> ClientResult<Board> {
        let Some(project) = self.state.selected_project.clone() else {
            return self.fail("Create board", ClientError::MissingSelection(Level::Project));
        };
        let request = CreateBoardRequest {
            name: name.into(),
            project_id: project,
            view_type,
        };
        let board = match self.api.create_board(&request).await {
            Ok(board) => board,
            Err(err) => return self.fail("Create board", err),
        };
        info!(board = %board.id, "workspace: board created");
        self.notify_success("Board created");

        let mut requests: Vec<ReloadRequest> =
            self.begin_reload(FetchLevel::Boards).into_iter().collect();
        requests.extend(self.set_board(board.id.clone()));
        self.drive(requests).await;
        Ok(board)
    }

    pub async fn update_board(
        &mut self,
        id: &BoardId,
        request: UpdateBoardRequest,
    ) -> ClientResult<Board> {
        match self.api.update_board(id, &request).await {
            Ok(board) => {
                self.notify_success("Board updated");
                self.reload(FetchLevel::Boards).await;
                Ok(board)
            }
            Err(err) => self.fail("Update board", err),
        }
    }

    pub async fn delete_board(&mut self, id: &BoardId) -> ClientResult<()> {
        if let Err(err) = self.api.delete_board(id).await {
            return self.fail("Delete board", err);
        }
        info!(board = %id, "workspace: board deleted");
        self.notify_success("Board deleted");
        if self.state.selected_board.as_ref() == Some(id) {
            self.state.selected_board = None;
            self.state.clear_board_contents();
            self.selection_changed();
        }
        self.reload(FetchLevel::Boards).await;
        Ok(())
    }

    // ---- statuses ----

    fn require_board(&self, action: &str) -> ClientResult<BoardId> {
        match self.state.selected_board.clone() {
            Some(board) => Ok(board),
            None => self.fail(action, ClientError::MissingSelection(Level::Board)),
        }
    }

    /// Clears the final flag on every other status before `id` becomes final.
    async fn send_final_plan(
        &self,
        board: &BoardId,
        statuses: &[TaskStatus],
        id: &StatusId,
        make_final: bool,
    ) -> ClientResult<()> {
        for update in status_board::final_toggle_plan(statuses, id, make_final) {
            let request = UpdateStatusRequest {
                is_final: Some(update.is_final),
                ..UpdateStatusRequest::default()
            };
            self.api
                .update_status(board, &update.status, &request)
                .await?;
        }
        Ok(())
    }

    pub async fn create_status(&mut self, draft: StatusDraft) -> ClientResult<TaskStatus> {
        let board = self.require_board("Create status")?;
        let request = CreateStatusRequest {
            name: draft.name,
            color: draft.color,
            order_index: status_board::next_order_index(&self.state.statuses),
            is_final: None,
        };
        let created = match self.api.create_status(&board, &request).await {
            Ok(status) => status,
            Err(err) => return self.fail("Create status", err),
        };
        if draft.is_final {
            let mut statuses = self.state.statuses.clone();
            statuses.push(created.clone());
            if let Err(err) = self
                .send_final_plan(&board, &statuses, &created.id, true)
                .await
            {
                self.reload_statuses().await;
                return self.fail("Mark status final", err);
            }
        }
        self.notify_success("Status created");
        self.reload_statuses().await;
        Ok(created)
    }

    pub async fn update_status(
        &mut self,
        id: &StatusId,
        mut request: UpdateStatusRequest,
    ) -> ClientResult<()> {
        let board = self.require_board("Update status")?;
        let make_final = request.is_final.take();
        let result = async {
            if let Some(make_final) = make_final {
                self.send_final_plan(&board, &self.state.statuses, id, make_final)
                    .await?;
            }
            if request != UpdateStatusRequest::default() {
                self.api.update_status(&board, id, &request).await?;
            }
            Ok::<(), ClientError>(())
        }
        .await;
        self.reload_statuses().await;
        match result {
            Ok(()) => {
                self.notify_success("Status updated");
                Ok(())
            }
            Err(err) => self.fail("Update status", err),
        }
    }

    pub async fn set_final_status(&mut self, id: &StatusId, make_final: bool) -> ClientResult<()> {
        self.update_status(
            id,
            UpdateStatusRequest {
                is_final: Some(make_final),
                ..UpdateStatusRequest::default()
            },
        )
        .await
    }

    pub async fn delete_status(&mut self, id: &StatusId) -> ClientResult<()> {
        let board = self.require_board("Delete status")?;
        if let Err(err) = self.api.delete_status(&board, id).await {
            return self.fail("Delete status", err);
        }
        self.notify_success("Status deleted");
        self.reload_statuses().await;
        Ok(())
    }

    /// Moves `moved` into `target`'s slot locally, then confirms with the
    /// bulk reorder; the previous order comes back if the write fails.
    pub async fn reorder_statuses(
        &mut self,
        moved: &StatusId,
        target: &StatusId,
    ) -> ClientResult<()> {
        let board = self.require_board("Reorder statuses")?;
        let Some(reordered) = status_board::reorder(&self.state.statuses, moved, target) else {
            return Ok(());
        };
        let orders = status_board::status_orders(&reordered);
        let previous = std::mem::replace(&mut self.state.statuses, reordered);
        self.emit(WorkspaceEvent::CollectionChanged(FetchLevel::Statuses));

        match self.api.reorder_statuses(&board, &orders).await {
            Ok(()) => {
                self.notify_success("Status order updated");
                Ok(())
            }
            Err(err) => {
                self.state.statuses = previous;
                self.emit(WorkspaceEvent::CollectionChanged(FetchLevel::Statuses));
                self.fail("Reorder statuses", err)
            }
        }
    }

    // ---- tasks ----

    pub async fn create_task(&mut self, draft: TaskDraft) -> ClientResult<Task> {
        let board = self.require_board("Create task")?;
        let request = CreateTaskRequest {
            title: draft.title,
            description: draft.description,
            board_id: board,
            status_id: draft.status,
            priority: draft.priority,
            due_date: draft.due_date,
            assignee_id: draft.assignee,
            tag_ids: draft.tags,
        };
        match self.api.create_task(&request).await {
            Ok(task) => {
                info!(task = %task.id, "workspace: task created");
                self.notify_success("Task created");
                self.reload_tasks().await;
                Ok(task)
            }
            Err(err) => self.fail("Create task", err),
        }
    }

    pub async fn update_task(
        &mut self,
        id: &TaskId,
        request: UpdateTaskRequest,
    ) -> ClientResult<Task> {
        match self.api.update_task(id, &request).await {
            Ok(task) => {
                self.notify_success("Task updated");
                self.reload_tasks().await;
                Ok(task)
            }
            Err(err) => self.fail("Update task", err),
        }
    }

    pub async fn delete_task(&mut self, id: &TaskId) -> ClientResult<()> {
        if let Err(err) = self.api.delete_task(id).await {
            return self.fail("Delete task", err);
        }
        self.notify_success("Task deleted");
        self.reload_tasks().await;
        Ok(())
    }

    /// Shows the task in its new column at once, reverts if the server
    /// refuses, and reloads the task list after a confirmed move.
    pub async fn change_task_status(
        &mut self,
        task: &TaskId,
        status: &StatusId,
    ) -> ClientResult<()> {
        let previous = self.apply_local_status(task, status);
        let request = TaskStatusChangeRequest {
            status_id: status.clone(),
            order_index: None,
        };

        match self.api.change_task_status(task, &request).await {
            Ok(_) => {
                info!(%task, %status, "workspace: task status changed");
                self.notify_success("Task status updated");
                self.reload_tasks().await;
                Ok(())
            }
            Err(err) => {
                if let Some(previous) = previous {
                    self.restore_local_status(task, previous);
                }
                self.fail("Update task status", err)
            }
        }
    }

    fn apply_local_status(&mut self, task: &TaskId, status: &StatusId) -> Option<TaskStatus> {
        let target = self.state.status(status)?.clone();
        let local = self.state.tasks.iter_mut().find(|local| &local.id == task)?;
        let previous = std::mem::replace(&mut local.status, target);
        self.emit(WorkspaceEvent::CollectionChanged(FetchLevel::Tasks));
        Some(previous)
    }

    fn restore_local_status(&mut self, task: &TaskId, previous: TaskStatus) {
        if let Some(local) = self.state.tasks.iter_mut().find(|local| &local.id == task) {
            local.status = previous;
            self.emit(WorkspaceEvent::CollectionChanged(FetchLevel::Tasks));
        }
    }
}

#[async_trait]
impl TaskStatusSink for WorkspaceController {
    async fn change_task_status(&mut self, task: &TaskId, status: &StatusId) -> ClientResult<()> {
        WorkspaceController::change_task_status(self, task, status).await
    }
}

#[cfg(test)]
#[path = "tests/workspace_tests.rs"]
mod tests;
