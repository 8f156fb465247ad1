//! Live event stream

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events
///
/// Streams fan-out completions, error records and channel post changes.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    refdir_common::sse::create_event_sse_stream("refdir-notify", &state.event_bus)
}
