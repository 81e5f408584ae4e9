use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const AUTH_HEADER: &str = "x-auth-token";
pub const DEFAULT_TOKEN: &str = "test-token";
pub const DEFAULT_PER_PAGE: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widget {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

#[derive(Deserialize)]
pub struct CreateWidget {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
}

#[derive(Deserialize)]
pub struct UpdateWidget {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub color: Option<String>,
}

fn default_color() -> String {
    "grey".to_string()
}

#[derive(Clone)]
pub struct AppState {
    token: Arc<str>,
    widgets: Arc<RwLock<Vec<Widget>>>,
}

/// `count` widgets named `widget-1..=count`, alternating red and blue.
pub fn seed(count: usize) -> Vec<Widget> {
    (1..=count)
        .map(|i| Widget {
            id: Uuid::new_v4(),
            name: format!("widget-{i}"),
            color: if i % 2 == 1 { "red" } else { "blue" }.to_string(),
        })
        .collect()
}

pub fn app() -> Router {
    app_with(DEFAULT_TOKEN, Vec::new())
}

pub fn app_with(token: &str, widgets: Vec<Widget>) -> Router {
    let state = AppState {
        token: Arc::from(token),
        widgets: Arc::new(RwLock::new(widgets)),
    };
    let api = Router::new()
        .route("/widgets", get(list_widgets).post(create_widget))
        .route("/widgets/{id}", get(get_widget).put(update_widget).delete(delete_widget))
        .route("/status", get(status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/discover", get(discover))
        .merge(api)
        .with_state(state)
}

pub async fn run(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, app).await
}

fn token_matches(state: &AppState, headers: &HeaderMap) -> bool {
    headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == &*state.token)
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !token_matches(&state, request.headers()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid token"}))).into_response();
    }
    next.run(request).await
}

/// Bad tokens get a 200 with `success: false`, like the real service.
async fn discover(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    if !token_matches(&state, &headers) {
        return Json(json!({"success": false, "message": "Invalid token"}));
    }
    Json(json!({
        "widgets": [
            {
                "uri": "/widgets",
                "method": "GET",
                "optional": ["page", "per_page", "color"],
                "description": "List widgets"
            },
            {
                "uri": "/widgets",
                "method": "POST",
                "optional": ["name", "color"],
                "description": "Create a widget"
            }
        ],
        "widget": [
            {"uri": "/widgets/{id}", "method": "GET", "optional": [], "description": "Fetch one widget"},
            {"uri": "/widgets/{id}", "method": "PUT", "optional": ["name", "color"], "description": "Update a widget"},
            {"uri": "/widgets/{id}", "method": "DELETE", "optional": [], "description": "Delete a widget"}
        ],
        "status": {
            "uri": "/status",
            "method": "GET",
            "optional": ["verbose"],
            "description": "Service health"
        }
    }))
}

fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"error": "widget not found"})))
}

fn page_headers(page: usize, pages: usize) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let mut set = |name: &'static str, value: usize| {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    };
    set("x-page", page);
    set("x-pages", pages);
    if page < pages {
        set("x-next-page", page + 1);
    }
    headers
}

async fn list_widgets(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> (HeaderMap, Json<Vec<Widget>>) {
    let widgets = state.widgets.read().await;
    let matching: Vec<&Widget> = widgets
        .iter()
        .filter(|w| query.color.as_ref().map_or(true, |c| &w.color == c))
        .collect();

    let per_page = query.per_page.filter(|&n| n > 0).unwrap_or(DEFAULT_PER_PAGE);
    let pages = matching.len().div_ceil(per_page).max(1);
    let page = query.page.filter(|&p| p > 0).unwrap_or(1);

    let items = matching
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .cloned()
        .collect();
    (page_headers(page, pages), Json(items))
}

async fn create_widget(
    State(state): State<AppState>,
    Json(input): Json<CreateWidget>,
) -> (StatusCode, Json<Widget>) {
    let widget = Widget {
        id: Uuid::new_v4(),
        name: input.name,
        color: input.color,
    };
    state.widgets.write().await.push(widget.clone());
    (StatusCode::CREATED, Json(widget))
}

async fn get_widget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Widget>, (StatusCode, Json<Value>)> {
    let widgets = state.widgets.read().await;
    widgets.iter().find(|w| w.id == id).cloned().map(Json).ok_or_else(not_found)
}

async fn update_widget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateWidget>,
) -> Result<Json<Widget>, (StatusCode, Json<Value>)> {
    let mut widgets = state.widgets.write().await;
    let widget = widgets.iter_mut().find(|w| w.id == id).ok_or_else(not_found)?;
    if let Some(name) = input.name {
        widget.name = name;
    }
    if let Some(color) = input.color {
        widget.color = color;
    }
    Ok(Json(widget.clone()))
}

async fn delete_widget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let mut widgets = state.widgets.write().await;
    let index = widgets.iter().position(|w| w.id == id).ok_or_else(not_found)?;
    widgets.remove(index);
    Ok(StatusCode::NO_CONTENT)
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let count = state.widgets.read().await.len();
    Json(json!({"status": "ok", "widgets": count}))
}
