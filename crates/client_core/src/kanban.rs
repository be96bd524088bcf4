use async_trait::async_trait;
use shared::domain::{StatusId, Task, TaskId, TaskStatus};
use tracing::debug;

use crate::error::ClientResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

pub fn horizontal_layout(
    statuses: &[TaskStatus],
    column_width: f32,
    column_height: f32,
    gap: f32,
) -> Vec<(StatusId, Rect)> {
    crate::status_board::sorted(statuses)
        .into_iter()
        .scan(0.0_f32, |x, status| {
            let rect = Rect::new(*x, 0.0, column_width, column_height);
            *x += column_width + gap;
            Some((status.id, rect))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveDrag {
    task: TaskId,
    origin: StatusId,
    hovering: Option<StatusId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum DragState {
    #[default]
    Idle,
    Dragging(ActiveDrag),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    StatusChange {
        task: TaskId,
        from: StatusId,
        to: StatusId,
    },
    SameColumn,
    NoTarget,
    NotDragging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAppearance {
    Normal,
    Lifted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAppearance {
    Normal,
    DropEligible,
}

/// Receives the one status change a completed drop may produce.
#[async_trait]
pub trait TaskStatusSink: Send {
    async fn change_task_status(&mut self, task: &TaskId, status: &StatusId) -> ClientResult<()>;
}

#[derive(Debug, Default)]
pub struct DragController {
    columns: Vec<(StatusId, Rect)>,
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_column_bounds(&mut self, columns: Vec<(StatusId, Rect)>) {
        self.columns = columns;
        if let DragState::Dragging(drag) = &mut self.state {
            if drag
                .hovering
                .as_ref()
                .is_some_and(|hovered| !self.columns.iter().any(|(id, _)| id == hovered))
            {
                drag.hovering = None;
            }
        }
    }

    pub fn column_at(&self, point: Point) -> Option<&StatusId> {
        self.columns
            .iter()
            .find(|(_, rect)| rect.contains(point))
            .map(|(id, _)| id)
    }

    fn bounds_of(&self, status: &StatusId) -> Option<Rect> {
        self.columns
            .iter()
            .find(|(id, _)| id == status)
            .map(|(_, rect)| *rect)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn dragged_task(&self) -> Option<&TaskId> {
        match &self.state {
            DragState::Dragging(drag) => Some(&drag.task),
            DragState::Idle => None,
        }
    }

    pub fn hovered_column(&self) -> Option<&StatusId> {
        match &self.state {
            DragState::Dragging(drag) => drag.hovering.as_ref(),
            DragState::Idle => None,
        }
    }

    pub fn begin_drag(&mut self, task: &Task) -> bool {
        if self.is_dragging() {
            return false;
        }
        debug!(task = %task.id, origin = %task.status.id, "kanban: drag started");
        self.state = DragState::Dragging(ActiveDrag {
            task: task.id.clone(),
            origin: task.status.id.clone(),
            hovering: None,
        });
        true
    }

    pub fn pointer_moved(&mut self, point: Point) {
        let hovered = self.column_at(point).cloned();
        if let DragState::Dragging(drag) = &mut self.state {
            drag.hovering = hovered;
        }
    }

    /// A leave signal for `status`; honoured only if the pointer really is
    /// outside that column.
    pub fn column_left(&mut self, status: &StatusId, point: Point) {
        let still_inside = self.bounds_of(status).is_some_and(|rect| rect.contains(point));
        if still_inside {
            return;
        }
        let hovered = self.column_at(point).cloned();
        if let DragState::Dragging(drag) = &mut self.state {
            if drag.hovering.as_ref() == Some(status) {
                drag.hovering = hovered;
            }
        }
    }

    pub fn drop_at(&mut self, point: Point) -> DropOutcome {
        let target = self.column_at(point).cloned();
        let DragState::Dragging(drag) = std::mem::take(&mut self.state) else {
            return DropOutcome::NotDragging;
        };
        match target {
            None => DropOutcome::NoTarget,
            Some(to) if to == drag.origin => DropOutcome::SameColumn,
            Some(to) => DropOutcome::StatusChange {
                task: drag.task,
                from: drag.origin,
                to,
            },
        }
    }

    pub fn cancel(&mut self) -> bool {
        let was_dragging = self.is_dragging();
        self.state = DragState::Idle;
        was_dragging
    }

    /// Drops at `point` and forwards a resulting status change to `sink`.
    /// The controller is idle again before `sink` runs.
    pub async fn complete_drop<S>(
        &mut self,
        point: Point,
        sink: &mut S,
    ) -> ClientResult<DropOutcome>
    where
        S: TaskStatusSink + ?Sized,
    {
        let outcome = self.drop_at(point);
        if let DropOutcome::StatusChange { task, to, .. } = &outcome {
            sink.change_task_status(task, to).await?;
        } else {
            debug!(?outcome, "kanban: drop produced no status change");
        }
        Ok(outcome)
    }

    pub fn card_appearance(&self, task: &TaskId) -> CardAppearance {
        match &self.state {
            DragState::Dragging(drag) if &drag.task == task => CardAppearance::Lifted,
            _ => CardAppearance::Normal,
        }
    }

    pub fn column_appearance(&self, status: &StatusId) -> ColumnAppearance {
        match &self.state {
            DragState::Dragging(drag)
                if drag.hovering.as_ref() == Some(status) && &drag.origin != status =>
            {
                ColumnAppearance::DropEligible
            }
            _ => ColumnAppearance::Normal,
        }
    }
}

#[cfg(test)]
#[path = "tests/kanban_tests.rs"]
mod tests;
