//! HTTP API for the symposium site and its admin panel

use crate::registration::auth::SignedIn;
use crate::registration::csv_export::{export_filename, registrations_csv};
use crate::registration::image_storage::UploadedImage;
use crate::registration::{
    AdminAllowList, AdminAuth, AuthUser, BucketStore, ChangeFeed, ContactForm, ContactMessage,
    Coordinator, DashboardStats, DocumentStore, EventCategory, EventDirectory, EventDraft,
    EventFilter, EventInfo, EventPatch, FirebaseAuth, ImageStorage, MemoryStore, MessageFilter,
    MessageInbox, Registration, RegistrationConfig, RegistrationError, RegistrationForm,
    StorageBackend, Subscription,
};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, FromRequest, FromRequestParts, Multipart, Path, Query, Request, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post, put},
    Extension, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

// Room for the multipart framing around a maximum-size file
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub events: EventDirectory,
    pub inbox: MessageInbox,
    pub auth: Arc<AdminAuth>,
    pub images: Arc<ImageStorage>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, auth: AdminAuth, images: ImageStorage) -> Self {
        let feed = ChangeFeed::new();
        Self {
            events: EventDirectory::new(store.clone(), feed.clone()),
            inbox: MessageInbox::new(store, feed),
            auth: Arc::new(auth),
            images: Arc::new(images),
        }
    }

    pub fn from_config(config: &RegistrationConfig) -> Result<Self, RegistrationError> {
        let store: Arc<dyn DocumentStore> = match config.storage {
            StorageBackend::Memory => {
                warn!("Using in-memory storage, documents are lost on restart");
                Arc::new(MemoryStore::new())
            }
            StorageBackend::Bucket => Arc::new(BucketStore::new(config)?),
        };

        let auth = AdminAuth::new(
            Arc::new(FirebaseAuth::new(config.identity.clone())),
            AdminAllowList::parse(&config.admin_emails),
        );

        Ok(Self::new(store, auth, ImageStorage::new(config.media.clone())))
    }
}

// Body and query extractors whose rejections keep the `{ "error": ... }` shape
#[derive(FromRequest)]
#[from_request(via(Json), rejection(RegistrationError))]
struct AppJson<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(RegistrationError))]
struct AppQuery<T>(T);

// Request/Response types
#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default)]
    pub filter: MessageFilter,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct EventListResponse {
    pub events: Vec<EventInfo>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorsResponse {
    pub event_id: String,
    pub title: String,
    pub coordinators: Vec<Coordinator>,
    pub staff_coordinators: Vec<Coordinator>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub stats: DashboardStats,
    pub unread_messages: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedEventResponse {
    pub id: String,
    pub registrations_removed: usize,
}

#[derive(Debug, Serialize)]
pub struct RegistrationListResponse {
    pub event: EventInfo,
    pub registrations: Vec<Registration>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListResponse {
    pub messages: Vec<ContactMessage>,
    pub count: usize,
    pub unread_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(flatten)]
    pub message: ContactMessage,
    pub subject_label: String,
}

// Configure routes
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.images.max_upload_bytes() + MULTIPART_OVERHEAD;

    let admin = Router::new()
        .route("/api/auth/me", get(current_admin))
        .route("/api/admin/dashboard", get(dashboard))
        .route("/api/admin/events", get(admin_events).post(create_event))
        .route(
            "/api/admin/events/:event_id",
            put(update_event).delete(delete_event),
        )
        .route(
            "/api/admin/events/:event_id/registrations",
            get(list_registrations),
        )
        .route(
            "/api/admin/events/:event_id/registrations/stream",
            get(stream_registrations),
        )
        .route(
            "/api/admin/events/:event_id/registrations/export.csv",
            get(export_registrations),
        )
        .route("/api/admin/messages", get(list_messages))
        .route("/api/admin/messages/stream", get(stream_messages))
        .route(
            "/api/admin/messages/:message_id",
            get(open_message).delete(delete_message),
        )
        .route(
            "/api/admin/messages/:message_id/read",
            post(mark_message_read),
        )
        .route(
            "/api/upload",
            post(upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/", get(health_check))
        .route("/api/events", get(list_events))
        .route("/api/events/stream", get(stream_events))
        .route("/api/events/:event_id", get(get_event))
        .route("/api/events/:event_id/coordinators", get(event_coordinators))
        .route("/api/events/:event_id/registrations", post(register_for_event))
        .route("/api/messages", post(send_message))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

// Admin gate: resolves the bearer token and hands the admin to the handler
async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, RegistrationError> {
    let token = bearer_token(request.headers());
    let admin = state.auth.authorize(token.as_deref()).await?;
    request.extensions_mut().insert(admin);
    Ok(next.run(request).await)
}

/// `all` and an empty value both mean no category filter.
fn parse_category(category: Option<&str>) -> Result<Option<EventCategory>, RegistrationError> {
    match category.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(other) => other
            .parse()
            .map(Some)
            .map_err(RegistrationError::ValidationError),
    }
}

// Each snapshot goes out as one named SSE event carrying the full list
fn live<T>(
    name: &'static str,
    subscription: Subscription<T>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>>
where
    T: Serialize + Clone + Default + Send + Sync + 'static,
{
    let stream = subscription
        .into_stream()
        .map(move |snapshot| Event::default().event(name).json_data(snapshot));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn require_event(state: &AppState, event_id: &str) -> Result<EventInfo, RegistrationError> {
    state
        .events
        .get_event(event_id)
        .await?
        .ok_or_else(|| RegistrationError::EventNotFound(event_id.to_string()))
}

// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(StatusResponse {
        status: "ok".to_string(),
        service: "symposium-registration".to_string(),
    })
}

// Public event listing with category tab and search box
async fn list_events(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<EventQuery>,
) -> Result<Json<EventListResponse>, RegistrationError> {
    let filter = event_filter(query)?;
    let events = state.events.list_events(&filter).await?;
    let count = events.len();
    Ok(Json(EventListResponse { events, count }))
}

fn event_filter(query: EventQuery) -> Result<EventFilter, RegistrationError> {
    Ok(EventFilter {
        category: parse_category(query.category.as_deref())?,
        search: query.search.filter(|s| !s.trim().is_empty()),
        ..EventFilter::default()
    })
}

async fn stream_events(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<EventQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, RegistrationError> {
    let category = parse_category(query.category.as_deref())?;
    Ok(live("events", state.events.subscribe_events(category).await))
}

async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<EventInfo>, RegistrationError> {
    Ok(Json(require_event(&state, &event_id).await?))
}

async fn event_coordinators(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<CoordinatorsResponse>, RegistrationError> {
    let event = require_event(&state, &event_id).await?;
    Ok(Json(CoordinatorsResponse {
        event_id: event.id,
        title: event.title,
        coordinators: event.coordinators,
        staff_coordinators: event.staff_coordinators,
    }))
}

async fn register_for_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    AppJson(form): AppJson<RegistrationForm>,
) -> Result<(StatusCode, Json<CreatedResponse>), RegistrationError> {
    let id = state.events.register_for_event(&event_id, form).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id,
            message: "Registration successful! We look forward to seeing you.".to_string(),
        }),
    ))
}

// Contact form
async fn send_message(
    State(state): State<AppState>,
    AppJson(form): AppJson<ContactForm>,
) -> Result<(StatusCode, Json<CreatedResponse>), RegistrationError> {
    let id = state.inbox.create_message(form).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id,
            message: "Message sent successfully! We'll get back to you soon.".to_string(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<SignedIn>, RegistrationError> {
    Ok(Json(state.auth.sign_in(&payload.email, &payload.password).await?))
}

// Tokens are the identity provider's, so the client simply forgets its own
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = bearer_token(&headers) {
        if let Err(e) = state.auth.sign_out(&token).await {
            warn!("Sign-out lookup failed: {}", e);
        }
    }
    StatusCode::NO_CONTENT
}

async fn current_admin(Extension(admin): Extension<AuthUser>) -> Json<AuthUser> {
    Json(admin)
}

async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, RegistrationError> {
    let (stats, unread_messages) =
        tokio::try_join!(state.events.dashboard_stats(), state.inbox.unread_count())?;
    Ok(Json(DashboardResponse {
        stats,
        unread_messages,
    }))
}

// Admin event table: same filters as the public page, search also covers venues
async fn admin_events(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<EventQuery>,
) -> Result<Json<EventListResponse>, RegistrationError> {
    let filter = event_filter(query)?.including_venue();
    let events = state.events.list_events(&filter).await?;
    let count = events.len();
    Ok(Json(EventListResponse { events, count }))
}

async fn create_event(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    AppJson(draft): AppJson<EventDraft>,
) -> Result<(StatusCode, Json<CreatedResponse>), RegistrationError> {
    let id = state.events.create_event(draft).await?;
    info!("Event {} created by {}", id, admin.email.as_deref().unwrap_or(&admin.uid));
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id,
            message: "Event created successfully".to_string(),
        }),
    ))
}

async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    AppJson(patch): AppJson<EventPatch>,
) -> Result<Json<EventInfo>, RegistrationError> {
    Ok(Json(state.events.update_event(&event_id, patch).await?))
}

async fn delete_event(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> Result<Json<DeletedEventResponse>, RegistrationError> {
    let registrations_removed = state.events.delete_event(&event_id).await?;
    info!(
        "Event {} deleted by {} ({} registrations removed)",
        event_id,
        admin.email.as_deref().unwrap_or(&admin.uid),
        registrations_removed
    );
    Ok(Json(DeletedEventResponse {
        id: event_id,
        registrations_removed,
    }))
}

async fn list_registrations(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<RegistrationListResponse>, RegistrationError> {
    let event = require_event(&state, &event_id).await?;
    let registrations = state.events.list_registrations(&event_id).await?;
    let count = registrations.len();
    Ok(Json(RegistrationListResponse {
        event,
        registrations,
        count,
    }))
}

async fn stream_registrations(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, RegistrationError> {
    require_event(&state, &event_id).await?;
    let subscription = state.events.subscribe_registrations(&event_id).await?;
    Ok(live("registrations", subscription))
}

async fn export_registrations(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, RegistrationError> {
    let event = require_event(&state, &event_id).await?;
    let registrations = state.events.list_registrations(&event_id).await?;
    let csv = registrations_csv(&registrations);

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        export_filename(Some(&event.title))
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"registrations.csv\""));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

async fn list_messages(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<MessageQuery>,
) -> Result<Json<MessageListResponse>, RegistrationError> {
    let (messages, unread_count) = tokio::try_join!(
        state.inbox.list_messages(query.filter),
        state.inbox.unread_count()
    )?;
    let count = messages.len();
    Ok(Json(MessageListResponse {
        messages,
        count,
        unread_count,
    }))
}

async fn stream_messages(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<MessageQuery>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    live("messages", state.inbox.subscribe_messages(query.filter).await)
}

// Opening a message marks it read
async fn open_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<Json<MessageView>, RegistrationError> {
    let message = state.inbox.open_message(&message_id).await?;
    Ok(Json(MessageView {
        subject_label: message.subject_label().to_string(),
        message,
    }))
}

async fn mark_message_read(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<StatusCode, RegistrationError> {
    state.inbox.mark_message_read(&message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<StatusCode, RegistrationError> {
    state.inbox.delete_message(&message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn multipart_rejection(images: &ImageStorage, e: MultipartError) -> RegistrationError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        images.too_large()
    } else {
        RegistrationError::UploadRejected(e.body_text())
    }
}

// Coordinator photo upload, forwarded to the media host
async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadedImage>, RegistrationError> {
    let mut multipart = multipart
        .map_err(|_| RegistrationError::UploadRejected("No file provided".to_string()))?;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_rejection(&state.images, e))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_rejection(&state.images, e))?;
        file = Some((filename, content_type, data));
    }

    let (filename, content_type, data) = file
        .filter(|(_, _, data)| !data.is_empty())
        .ok_or_else(|| RegistrationError::UploadRejected("No file provided".to_string()))?;

    let uploaded = state
        .images
        .upload_image(&filename, content_type.as_deref(), data.to_vec())
        .await?;
    Ok(Json(uploaded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_and_blank_mean_every_category() {
        assert_eq!(parse_category(None).unwrap(), None);
        assert_eq!(parse_category(Some("all")).unwrap(), None);
        assert_eq!(parse_category(Some(" ")).unwrap(), None);
        assert_eq!(
            parse_category(Some("non-technical")).unwrap(),
            Some(EventCategory::NonTechnical)
        );
        assert!(parse_category(Some("sports")).is_err());
    }

    #[test]
    fn bearer_token_requires_the_scheme() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc "));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc"));
    }
}
