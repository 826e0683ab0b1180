//! `/`, `/status` and `/control`.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Json, Response};
use tracing::warn;

use crate::command::Command;
use crate::error::CommandError;
use crate::robot::Robot;

const INDEX_HTML: &str = include_str!("index.html");

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// `GET /status`: `{"framesize":N,"quality":N}`.
pub async fn status(State(robot): State<Arc<Robot>>) -> Response {
    let status = robot.camera().status();
    ([(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")], Json(status)).into_response()
}

/// `GET /control?var=..&val=..`
pub async fn control(State(robot): State<Arc<Robot>>, RawQuery(query): RawQuery) -> Response {
    match handle_command(&robot, query.as_deref()) {
        Ok(()) => ([(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")], ()).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Parse and apply one command. Shape errors leave everything untouched.
pub fn handle_command(robot: &Robot, query: Option<&str>) -> Result<(), CommandError> {
    let cmd = Command::from_query(query)?;
    robot.execute(cmd)
}

impl IntoResponse for CommandError {
    fn into_response(self) -> Response {
        warn!("control rejected: {}", self);
        self.status().into_response()
    }
}
