//! Client core for the planner workspace: REST transport, injected session,
//! the workspace selection controller and the kanban drag controller.

pub mod config;
pub mod error;
pub mod filter;
pub mod kanban;
pub mod session;
pub mod status_board;
pub mod transport;
pub mod workspace;

pub use config::{load_settings, ClientSettings};
pub use error::{ClientError, ClientResult, Level};
pub use filter::{PriorityFilter, StatusFilter, TaskFilter};
pub use kanban::{
    CardAppearance, ColumnAppearance, DragController, DropOutcome, Point, Rect, TaskStatusSink,
};
pub use session::{Session, SessionState};
pub use transport::{HttpPlannerApi, PlannerApi};
pub use workspace::{
    BoardColumn, FetchLevel, Notification, NotificationLevel, ReloadRequest, ReloadResult,
    StatusDraft, TaskDraft, WorkspaceController, WorkspaceEvent, WorkspaceState,
};

#[cfg(test)]
#[path = "tests/fake_api.rs"]
pub(crate) mod fake_api;
