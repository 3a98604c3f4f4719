//! Server-sent streams of per-collection change events.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};

use crate::broker::Action;

use super::super::{auth, state::AppState};

/// Buffered events per subscriber before a slow client starts missing them.
const SUBSCRIBER_BUFFER: usize = 10;

/// Stream the collection's change events as SSE frames (`event:` carries the
/// action, `data:` the resource as JSON). Every event is re-checked against
/// the read permission for its id, except deletions, which are emitted
/// unfiltered since the row no longer exists. The subscription is released
/// once the client disconnects.
pub async fn stream(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let user = auth::resolve_user(&state, &headers);
    let (_id, receiver) = state.broker().subscribe(&collection, SUBSCRIBER_BUFFER);

    let stream = ReceiverStream::new(receiver).filter_map(move |event| {
        let allowed = event.action == Action::Deleted
            || state
                .store()
                .authorize(&collection, Some(&event.id), "read", user.as_ref())
                .is_ok();
        if !allowed {
            return None;
        }
        let data = serde_json::to_string(&event.data).ok()?;
        Some(Ok(SseEvent::default()
            .event(event.action.as_str())
            .data(data)))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
