//! Server-sent progress stream

use axum::{
    extract::{Path, State},
    http::{header, HeaderName},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::{self, Stream, StreamExt};
use std::time::Duration;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use crate::server::error::{ApiError, ApiResult};
use crate::server::jobs::JobStatus;
use crate::server::state::AppState;

/// GET /progress/:job_id - Stream `{progress, message, timestamp}` events
///
/// Sends the current status immediately, then every change, and closes after
/// the terminal event. Unknown ids get 404 rather than an idle stream.
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let id = Uuid::parse_str(&job_id).map_err(|_| ApiError::JobNotFound)?;
    let receiver = state.registry().subscribe(&id).ok_or(ApiError::JobNotFound)?;
    tracing::debug!("Progress stream opened for job {}", id);

    let events = until_terminal(WatchStream::new(receiver))
        .map(|status| Event::default().json_data(&status));

    let sse = Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    );

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    )
        .into_response())
}

/// Yield statuses up to and including the first terminal one.
fn until_terminal<S>(statuses: S) -> impl Stream<Item = JobStatus>
where
    S: Stream<Item = JobStatus> + Unpin,
{
    stream::unfold((statuses, false), |(mut statuses, done)| async move {
        if done {
            return None;
        }
        let status = statuses.next().await?;
        let done = status.is_terminal();
        Some((status, (statuses, done)))
    })
}
