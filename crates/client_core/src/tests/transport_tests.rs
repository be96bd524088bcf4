use std::{collections::HashMap, sync::Arc};

use super::*;
use crate::{
    fake_api::{organization, project},
    session::SessionState,
};
use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode as HttpStatus},
    response::IntoResponse,
    routing::{delete as delete_route, get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::TaskPriority;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct Recorded {
    hits: Arc<Mutex<Vec<String>>>,
    auth: Arc<Mutex<Vec<Option<String>>>>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl Recorded {
    async fn hit(&self, route: &str, headers: &HeaderMap) {
        self.hits.lock().await.push(route.to_string());
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        self.auth.lock().await.push(auth);
    }
}

async fn handle_organizations(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
) -> Json<Value> {
    recorded.hit("organizations", &headers).await;
    Json(json!({ "data": [organization("org1")] }))
}

async fn handle_projects(State(recorded): State<Recorded>, headers: HeaderMap) -> Json<Value> {
    recorded.hit("projects", &headers).await;
    Json(json!([project("p1", "org1"), project("p2", "org1")]))
}

async fn handle_tasks(
    State(recorded): State<Recorded>,
    Path(board): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    recorded.hit(&format!("tasks {board}"), &headers).await;
    recorded.queries.lock().await.push(query);
    Json(json!({ "data": [] }))
}

async fn handle_reorder(
    State(recorded): State<Recorded>,
    Path(board): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> HttpStatus {
    recorded.hit(&format!("reorder {board}"), &headers).await;
    recorded.bodies.lock().await.push(body);
    HttpStatus::NO_CONTENT
}

async fn handle_statuses_expired(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
) -> impl IntoResponse {
    recorded.hit("statuses", &headers).await;
    (
        HttpStatus::UNAUTHORIZED,
        Json(json!({ "message": "token expired" })),
    )
}

async fn handle_create_board_rejected(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
) -> impl IntoResponse {
    recorded.hit("create_board", &headers).await;
    (
        HttpStatus::UNPROCESSABLE_ENTITY,
        Json(ApiErrorBody {
            status: Some(422),
            ..ApiErrorBody::new("name must not be blank")
        }),
    )
}

async fn handle_delete_board_crash(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
) -> impl IntoResponse {
    recorded.hit("delete_board", &headers).await;
    (HttpStatus::INTERNAL_SERVER_ERROR, "database unavailable")
}

async fn spawn_planner_server() -> anyhow::Result<(Url, Recorded)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/api/organizations", get(handle_organizations))
        .route("/api/projects", get(handle_projects))
        .route("/api/boards", post(handle_create_board_rejected))
        .route("/api/boards/:board", delete_route(handle_delete_board_crash))
        .route("/api/boards/:board/tasks", get(handle_tasks))
        .route("/api/boards/:board/statuses", get(handle_statuses_expired))
        .route("/api/boards/:board/statuses/reorder", patch(handle_reorder))
        .with_state(recorded.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((Url::parse(&format!("http://{addr}/api/"))?, recorded))
}

async fn signed_in_api() -> (HttpPlannerApi, Recorded) {
    let (base_url, recorded) = spawn_planner_server().await.expect("spawn server");
    let api = HttpPlannerApi::new(base_url, Session::new(Some("secret-token".to_string())));
    (api, recorded)
}

#[tokio::test]
async fn wrapped_collection_is_unwrapped_and_bearer_token_sent() {
    let (api, recorded) = signed_in_api().await;

    let organizations = api.list_organizations().await.expect("organizations");

    assert_eq!(organizations, vec![organization("org1")]);
    assert_eq!(
        *recorded.auth.lock().await,
        vec![Some("Bearer secret-token".to_string())]
    );
}

#[tokio::test]
async fn bare_collection_decodes_as_is() {
    let (api, _recorded) = signed_in_api().await;

    let projects = api.list_projects().await.expect("projects");

    let ids: Vec<&str> = projects.iter().map(|project| project.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
}

#[tokio::test]
async fn task_listing_sends_only_populated_filters() {
    let (api, recorded) = signed_in_api().await;
    let board = BoardId::from("b1");

    api.list_tasks(&board, &TaskListQuery::default())
        .await
        .expect("unfiltered");
    api.list_tasks(
        &board,
        &TaskListQuery {
            search: Some("invoice".to_string()),
            status_id: None,
            priority: Some(TaskPriority::High),
        },
    )
    .await
    .expect("filtered");

    let queries = recorded.queries.lock().await;
    assert!(queries[0].is_empty());
    assert_eq!(queries[1].get("search").map(String::as_str), Some("invoice"));
    assert_eq!(queries[1].get("priority").map(String::as_str), Some("HIGH"));
    assert!(!queries[1].contains_key("statusId"));
}

#[tokio::test]
async fn reorder_patches_camel_case_status_orders() {
    let (api, recorded) = signed_in_api().await;

    api.reorder_statuses(
        &BoardId::from("b1"),
        &[
            StatusOrder {
                status_id: StatusId::from("s2"),
                order_index: 0,
            },
            StatusOrder {
                status_id: StatusId::from("s1"),
                order_index: 1,
            },
        ],
    )
    .await
    .expect("reorder");

    assert_eq!(
        recorded.bodies.lock().await[0],
        json!({
            "statusOrders": [
                { "statusId": "s2", "orderIndex": 0 },
                { "statusId": "s1", "orderIndex": 1 },
            ]
        })
    );
}

#[tokio::test]
async fn unauthorized_response_tears_down_session() {
    let (api, _recorded) = signed_in_api().await;
    let mut state = api.session().subscribe();

    let err = api
        .list_statuses(&BoardId::from("b1"))
        .await
        .expect_err("expired token");

    assert!(matches!(err, ClientError::Unauthorized));
    assert!(err.requires_reauth());
    assert_eq!(api.session().token().await, None);
    state.changed().await.expect("state update");
    assert_eq!(*state.borrow(), SessionState::SignedOut);
}

#[tokio::test]
async fn client_error_carries_server_message() {
    let (api, _recorded) = signed_in_api().await;

    let err = api
        .create_board(&CreateBoardRequest {
            name: " ".to_string(),
            project_id: ProjectId::from("p1"),
            view_type: None,
        })
        .await
        .expect_err("rejected");

    match err {
        ClientError::Validation { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "name must not be blank");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(api.session().state(), SessionState::SignedIn);
}

#[tokio::test]
async fn server_fault_keeps_raw_text() {
    let (api, _recorded) = signed_in_api().await;

    let err = api
        .delete_board(&BoardId::from("b1"))
        .await
        .expect_err("crash");

    match err {
        ClientError::Server { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database unavailable");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_token_fails_before_any_request() {
    let (base_url, recorded) = spawn_planner_server().await.expect("spawn server");
    let api = HttpPlannerApi::new(base_url, Session::signed_out());

    let err = api.list_organizations().await.expect_err("signed out");

    assert!(matches!(err, ClientError::NotSignedIn));
    assert!(recorded.hits.lock().await.is_empty());
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let base_url = Url::parse(&format!("http://{addr}/api/")).expect("url");
    let api = HttpPlannerApi::new(base_url, Session::new(Some("secret-token".to_string())));

    let err = api.list_projects().await.expect_err("nothing listening");

    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(api.session().state(), SessionState::SignedIn);
}
