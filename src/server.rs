use crate::config::AppConfig;
use crate::render::ChoroplethMap;
use crate::tooltip::{Position, TooltipController, TooltipView};
use crate::types::{JoinedRegion, RegionAttributes, RegionId};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use geo::algorithm::contains::Contains;
use geo::bounding_rect::BoundingRect;
use geo::Point;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, info};

// Wrapper for RTree indexing
pub struct AreaIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Region hit-testing in screen space.
pub struct RegionIndex {
    tree: RTree<AreaIndex>,
}

impl RegionIndex {
    pub fn build(regions: &[JoinedRegion]) -> Self {
        let items = regions
            .iter()
            .enumerate()
            .filter_map(|(index, region)| {
                let rect = region.geometry.bounding_rect()?;
                Some(AreaIndex {
                    index,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Index of the region containing `(x, y)`.
    pub fn hit(&self, regions: &[JoinedRegion], x: f64, y: f64) -> Option<usize> {
        let point = Point::new(x, y);
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([x, y]))
            .map(|candidate| candidate.index)
            .find(|&i| regions.get(i).is_some_and(|r| r.geometry.contains(&point)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Enter(usize),
    Move(usize),
    Leave,
}

/// Turns successive hit-test results into enter / move / leave events.
#[derive(Debug, Default)]
pub struct PointerTracker {
    hovered: Option<usize>,
}

impl PointerTracker {
    pub fn track(&mut self, hit: Option<usize>) -> Vec<PointerEvent> {
        let events = match (self.hovered, hit) {
            (None, None) => vec![],
            (None, Some(i)) => vec![PointerEvent::Enter(i)],
            (Some(prev), Some(i)) if prev == i => vec![PointerEvent::Move(i)],
            (Some(_), Some(i)) => vec![PointerEvent::Leave, PointerEvent::Enter(i)],
            (Some(_), None) => vec![PointerEvent::Leave],
        };
        self.hovered = hit;
        events
    }
}

/// The single hover session: one pointer, one tooltip.
///
/// Samples carry a sequence number from the page; requests can reach the lock
/// out of order, so anything not newer than the last applied sample is dropped.
#[derive(Debug, Default)]
pub struct HoverSession {
    tracker: PointerTracker,
    tooltip: TooltipController,
    last_seq: u64,
}

impl HoverSession {
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn apply(&mut self, regions: &[JoinedRegion], seq: u64, hit: Option<usize>, cursor: Position) -> TooltipView {
        if seq <= self.last_seq {
            debug!(seq, last_seq = self.last_seq, "Dropping stale pointer sample");
            return self.tooltip.view();
        }
        self.last_seq = seq;

        for event in self.tracker.track(hit) {
            debug!(?event, "Pointer event");
            match event {
                PointerEvent::Enter(i) => {
                    self.tooltip.pointer_enter(&regions[i], cursor);
                }
                PointerEvent::Move(i) => {
                    self.tooltip.pointer_move(&regions[i], cursor);
                }
                PointerEvent::Leave => {
                    self.tooltip.pointer_leave();
                }
            }
        }
        self.tooltip.view()
    }
}

pub struct AppState {
    pub map: ChoroplethMap,
    pub index: RegionIndex,
    pub page: String,
    pub svg: String,
    pub hover: Mutex<HoverSession>,
}

impl AppState {
    pub fn new(map: ChoroplethMap) -> Self {
        info!("Building spatial index for {} regions...", map.regions.len());
        let index = RegionIndex::build(&map.regions);
        Self {
            page: map.page(),
            svg: map.svg(),
            index,
            map,
            hover: Mutex::new(HoverSession::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Move,
    Leave,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PointerSample {
    /// Increases with every sample the page sends, starting at 1.
    pub seq: u64,
    pub kind: PointerKind,
    pub page_x: f64,
    pub page_y: f64,
    pub map_x: f64,
    pub map_y: f64,
}

/// Tooltip view tagged with the newest sample it reflects.
#[derive(Debug, Serialize)]
pub struct PointerReply {
    pub seq: u64,
    #[serde(flatten)]
    pub view: TooltipView,
}

#[derive(Deserialize)]
pub struct QueryParams {
    x: f64,
    y: f64,
}

#[derive(Serialize)]
pub struct QueryResponse {
    id: Option<RegionId>,
    attributes: Option<RegionAttributes>,
}

pub fn router(state: Arc<AppState>, static_dir: &std::path::Path) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/map.svg", get(svg_handler))
        .route("/api/regions", get(regions_handler))
        .route("/api/query", get(query_handler))
        .route("/api/pointer", post(pointer_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, map: ChoroplethMap) -> Result<()> {
    let state = Arc::new(AppState::new(map));

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting server on http://{}", addr);

    let app = router(state, &config.output.dir);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn page_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.page.clone())
}

async fn svg_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/svg+xml")], state.svg.clone())
}

async fn regions_handler(State(state): State<Arc<AppState>>) -> Json<geojson::FeatureCollection> {
    Json(state.map.geojson())
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<QueryResponse>> {
    let regions = &state.map.regions;
    Json(state.index.hit(regions, params.x, params.y).map(|i| QueryResponse {
        id: regions[i].id.clone(),
        attributes: regions[i].attributes.clone(),
    }))
}

async fn pointer_handler(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<PointerSample>,
) -> Json<PointerReply> {
    let regions = &state.map.regions;
    let hit = match sample.kind {
        PointerKind::Move => state.index.hit(regions, sample.map_x, sample.map_y),
        PointerKind::Leave => None,
    };
    let cursor = Position::new(sample.page_x, sample.page_y);
    let mut hover = state.hover.lock().await;
    let view = hover.apply(regions, sample.seq, hit, cursor);
    Json(PointerReply {
        seq: hover.last_seq(),
        view,
    })
}
