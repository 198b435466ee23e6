use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use marquee_catalog::format_amount;
use marquee_core::{ResourceCategory, ResourceSummary, SeatTier, TimeWindow};

use crate::error::AppError;
use crate::metrics::StreamClientGuard;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListResourcesQuery {
    pub category: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceView {
    pub id: String,
    pub name: String,
    pub location: String,
    pub category: ResourceCategory,
    pub showtime_id: Option<Uuid>,
    pub tier: SeatTier,
    pub available: bool,
    pub price: Option<String>,
    pub price_cents: Option<i64>,
}

impl From<ResourceSummary> for ResourceView {
    fn from(summary: ResourceSummary) -> Self {
        Self {
            price: summary.quoted_price_cents.map(format_amount),
            price_cents: summary.quoted_price_cents,
            id: summary.id,
            name: summary.name,
            location: summary.location,
            category: summary.category,
            showtime_id: summary.showtime_id,
            tier: summary.tier,
            available: summary.available,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/resources", get(list_resources))
        .route("/v1/resources/{id}/stream", get(stream_resource_events))
}

/// GET /v1/resources?category=&start_time=&end_time=
async fn list_resources(
    State(state): State<AppState>,
    Query(query): Query<ListResourcesQuery>,
) -> Result<Json<Vec<ResourceView>>, AppError> {
    let category = match query.category.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            ResourceCategory::parse(raw)
                .ok_or_else(|| AppError::ValidationError(format!("Unknown category: {}", raw)))?,
        ),
    };
    let window = TimeWindow::new(query.start_time, query.end_time).map_err(|e| state.refuse(e))?;

    let summaries = state.manager.list_resources(category, &window).await?;
    Ok(Json(summaries.into_iter().map(ResourceView::from).collect()))
}

/// GET /v1/resources/{id}/stream
///
/// Server-sent `hold` events for one resource. A client that falls behind
/// skips the missed events and should re-read the listing.
async fn stream_resource_events(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    state.manager.get_resource(&resource_id).await.map_err(|e| state.refuse(e))?;

    let guard = StreamClientGuard::new(&state.metrics.stream_clients);
    let rx = state.manager.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        // Keeps the gauge raised until the client goes away.
        let _held = &guard;
        match result {
            Ok(event) if event.resource_id == resource_id => {
                Some(Event::default().event("hold").json_data(&event))
            }
            // Other resources, or lagged receivers.
            _ => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
