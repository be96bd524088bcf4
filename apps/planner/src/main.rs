use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    kanban::horizontal_layout, load_settings, status_board, ClientSettings, ColumnAppearance,
    DragController, DropOutcome, HttpPlannerApi, NotificationLevel, PriorityFilter, Session,
    StatusFilter, TaskFilter, WorkspaceController, WorkspaceEvent,
};
use shared::domain::{BoardId, OrganizationId, ProjectId, StatusId, TaskId, TaskPriority};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::info;
use tracing_subscriber::EnvFilter;

const COLUMN_WIDTH: f32 = 240.0;
const COLUMN_HEIGHT: f32 = 720.0;
const COLUMN_GAP: f32 = 16.0;

#[derive(Parser, Debug)]
#[command(about = "Browse and edit planner boards from the terminal")]
struct Args {
    /// Overrides the API base URL from planner.toml / environment.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Overrides the access token from planner.toml / environment.
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List organizations.
    Orgs,
    /// List projects of an organization (the first one when omitted).
    Projects {
        #[arg(long)]
        org: Option<String>,
    },
    /// List boards of a project.
    Boards {
        #[arg(long)]
        project: String,
    },
    /// Render a board as text columns.
    Board {
        #[arg(long)]
        board: String,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<TaskPriority>,
    },
    /// Drag a task card onto another status column.
    Move {
        #[arg(long)]
        board: String,
        #[arg(long)]
        task: String,
        #[arg(long)]
        status: String,
    },
    /// List the statuses of a board in column order.
    Statuses {
        #[arg(long)]
        board: String,
    },
    /// Move a status column into the slot of another one.
    ReorderStatus {
        #[arg(long)]
        board: String,
        #[arg(long)]
        status: String,
        #[arg(long)]
        before: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = args.api_url {
        settings.api_base_url = url;
    }
    if let Some(token) = args.token {
        settings.access_token = Some(token);
    }

    let mut controller = connect(&settings)?;
    let mut events = controller.subscribe_events();

    match args.command {
        Command::Orgs => {
            controller.load_organizations().await;
            surface(&mut events)?;
            for org in &controller.state().organizations {
                println!("{}\t{}\t{:?}", org.id, org.name, org.user_role);
            }
        }
        Command::Projects { org } => {
            match org {
                Some(org) => controller.select_organization(OrganizationId::new(org)).await,
                None => controller.load_organizations().await,
            }
            surface(&mut events)?;
            for project in &controller.state().projects {
                println!("{}\t{}\t{} boards", project.id, project.name, project.board_count);
            }
        }
        Command::Boards { project } => {
            controller.select_project(ProjectId::new(project)).await;
            surface(&mut events)?;
            let state = controller.state();
            if state.boards.is_empty() {
                println!("This project has no boards yet.");
            }
            for board in &state.boards {
                println!("{}\t{}\t{:?}", board.id, board.name, board.view_type);
            }
        }
        Command::Board {
            board,
            search,
            status,
            priority,
        } => {
            controller.select_board(BoardId::new(board)).await;
            surface(&mut events)?;
            controller.set_filter(TaskFilter {
                search: search.unwrap_or_default(),
                status: status
                    .map_or(StatusFilter::All, |id| StatusFilter::Only(StatusId::new(id))),
                priority: priority.map_or(PriorityFilter::All, PriorityFilter::Only),
            });
            render_board(&controller);
        }
        Command::Move {
            board,
            task,
            status,
        } => {
            controller.select_board(BoardId::new(board)).await;
            surface(&mut events)?;
            move_card(&mut controller, &TaskId::new(task), &StatusId::new(status)).await?;
            surface(&mut events)?;
            render_board(&controller);
        }
        Command::Statuses { board } => {
            controller.select_board(BoardId::new(board)).await;
            surface(&mut events)?;
            print_statuses(&controller);
        }
        Command::ReorderStatus {
            board,
            status,
            before,
        } => {
            controller.select_board(BoardId::new(board)).await;
            surface(&mut events)?;
            let result = controller
                .reorder_statuses(&StatusId::new(status), &StatusId::new(before))
                .await;
            surface(&mut events)?;
            result?;
            print_statuses(&controller);
        }
    }

    Ok(())
}

fn connect(settings: &ClientSettings) -> Result<WorkspaceController> {
    let session = Session::new(settings.access_token.clone());
    let api = HttpPlannerApi::from_settings(settings, session)
        .context("failed to build API client")?;
    info!(api_url = %settings.api_base_url, "planner: connecting");
    Ok(WorkspaceController::new(Arc::new(api)))
}

/// Prints pending notifications; fails if any of them was an error.
fn surface(events: &mut broadcast::Receiver<WorkspaceEvent>) -> Result<()> {
    let mut failures = Vec::new();
    loop {
        match events.try_recv() {
            Ok(WorkspaceEvent::Notification(note)) => match note.level {
                NotificationLevel::Success => eprintln!("ok: {}", note.message),
                NotificationLevel::Error => {
                    eprintln!("error: {}", note.message);
                    failures.push(note.message);
                }
            },
            Ok(WorkspaceEvent::SignInRequired) => {
                eprintln!("Set PLANNER_TOKEN or access_token in planner.toml, then retry.");
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        bail!(failures.join("; "))
    }
}

/// Lays the columns out, carries the card's pointer from its column centre
/// to the target column and releases it there.
async fn move_card(
    controller: &mut WorkspaceController,
    task: &TaskId,
    target: &StatusId,
) -> Result<()> {
    let Some(card) = controller.state().task(task).cloned() else {
        bail!("task {task} is not on this board");
    };
    let layout = horizontal_layout(
        &controller.state().statuses,
        COLUMN_WIDTH,
        COLUMN_HEIGHT,
        COLUMN_GAP,
    );
    let Some(target_rect) = layout
        .iter()
        .find(|(id, _)| id == target)
        .map(|(_, rect)| *rect)
    else {
        bail!("status {target} is not a column of this board");
    };
    let origin_rect = layout
        .iter()
        .find(|(id, _)| id == card.status_id())
        .map(|(_, rect)| *rect);

    let mut drag = DragController::new();
    drag.set_column_bounds(layout);
    drag.begin_drag(&card);
    if let Some(origin) = origin_rect {
        drag.pointer_moved(origin.center());
    }
    drag.pointer_moved(target_rect.center());
    if drag.column_appearance(target) == ColumnAppearance::DropEligible {
        println!("Dropping \"{}\" on {}", card.title, target);
    }

    match drag.complete_drop(target_rect.center(), controller).await? {
        DropOutcome::StatusChange { from, to, .. } => {
            println!("Moved {task}: {from} -> {to}");
        }
        DropOutcome::SameColumn => println!("{task} is already in {target}"),
        DropOutcome::NoTarget | DropOutcome::NotDragging => {}
    }
    Ok(())
}

fn render_board(controller: &WorkspaceController) {
    let columns = controller.columns();
    if columns.is_empty() {
        println!("This board has no statuses.");
        return;
    }
    for column in columns {
        let final_tag = if column.status.is_final { " [final]" } else { "" };
        println!("== {} ({}){}", column.status.name, column.tasks.len(), final_tag);
        for task in column.tasks {
            let due = task
                .due_date
                .map(|date| format!(" due {date}"))
                .unwrap_or_default();
            println!("  - {} [{}] {}{}", task.id, task.priority.as_str(), task.title, due);
        }
    }
}

fn print_statuses(controller: &WorkspaceController) {
    for status in status_board::sorted(&controller.state().statuses) {
        let final_tag = if status.is_final { "\tfinal" } else { "" };
        println!(
            "{}\t{}\t{}\t{}{}",
            status.order_index, status.id, status.name, status.color, final_tag
        );
    }
}
