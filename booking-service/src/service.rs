use axum::{
    Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use booking_flow::{
    Booking, BookingStore, ContactDirectory, ContactType, Contract, ContractLibrary, CoverLetter,
    CoverLetterLibrary, DraftId, FormData, InMemoryBookingStore, InMemoryCatalog,
    InMemoryContactDirectory, InMemorySessionStorage, PostgresBookingStore, PostgresSessionStorage,
    Property, PropertyDirectory, STEPS, SessionStorage, StepKind, StoreError, WizardAction,
    WizardBuilder, WizardError, WizardRunner, connect_pool,
    steps::{INSPECTION_TYPES, PAYMENT_METHODS, PAYMENT_SPLITS},
};
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    models::{
        DateTimeRequest, PatchFormRequest, PropertyQuery, SearchQuery, SessionView,
        StartWizardRequest, StepView, StepsResponse, TransitionResponse,
    },
};

const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl From<WizardError> for ApiError {
    fn from(e: WizardError) -> Self {
        match e {
            WizardError::SessionNotFound(_) => ApiError::NotFound(e.to_string()),
            WizardError::InvalidTransition { .. } | WizardError::Busy(_) => {
                ApiError::Conflict(e.to_string())
            }
            WizardError::StepOutOfRange(_) | WizardError::Form(_) => {
                ApiError::BadRequest(e.to_string())
            }
            WizardError::Storage(store) => store.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ApiError::NotFound(e.to_string()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(message) => {
                error!(error = %message, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Clone)]
pub struct AppState {
    pub runner: WizardRunner,
    pub bookings: Arc<dyn BookingStore>,
    pub contacts: Arc<dyn ContactDirectory>,
    pub properties: Arc<dyn PropertyDirectory>,
    pub contracts: Arc<dyn ContractLibrary>,
    pub cover_letters: Arc<dyn CoverLetterLibrary>,
}

impl AppState {
    /// Wire a state from explicit storage backends. Reference directories
    /// start from the in-memory sample catalogs.
    pub fn new(
        config: &ServiceConfig,
        bookings: Arc<dyn BookingStore>,
        sessions: Arc<dyn SessionStorage>,
    ) -> Self {
        let controller = WizardBuilder::new(bookings.clone())
            .jump_policy(config.jump_policy)
            .build();
        Self {
            runner: WizardRunner::new(Arc::new(controller), sessions),
            bookings,
            contacts: Arc::new(InMemoryContactDirectory::with_sample_contacts()),
            properties: Arc::new(InMemoryCatalog::<Property>::with_sample_properties()),
            contracts: Arc::new(InMemoryCatalog::<Contract>::with_sample_contracts()),
            cover_letters: Arc::new(InMemoryCatalog::<CoverLetter>::with_sample_cover_letters()),
        }
    }

    pub fn in_memory(config: &ServiceConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryBookingStore::new()),
            Arc::new(InMemorySessionStorage::new()),
        )
    }
}

pub async fn create_app(config: &ServiceConfig) -> Router {
    let app_state = create_app_state(config).await;
    build_router(app_state)
}

async fn create_app_state(config: &ServiceConfig) -> AppState {
    let Some(database_url) = config.database_url.as_deref() else {
        info!("Using in-memory storage (set DATABASE_URL to use PostgreSQL)");
        return AppState::in_memory(config);
    };

    info!("Using PostgreSQL storage");
    match connect_postgres(database_url).await {
        Ok((bookings, sessions)) => AppState::new(config, bookings, sessions),
        Err(e) => {
            error!(
                "Failed to connect to PostgreSQL: {}. Falling back to in-memory storage.",
                e
            );
            AppState::in_memory(config)
        }
    }
}

async fn connect_postgres(
    database_url: &str,
) -> Result<(Arc<dyn BookingStore>, Arc<dyn SessionStorage>), StoreError> {
    let pool = connect_pool(database_url).await?;
    let bookings = PostgresBookingStore::from_pool(pool.clone()).await?;
    let sessions = PostgresSessionStorage::from_pool(pool).await?;
    Ok((Arc::new(bookings), Arc::new(sessions)))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/steps", get(list_steps))
        .route("/wizard", post(start_wizard))
        .route("/wizard/{id}", get(get_wizard).delete(close_wizard))
        .route("/wizard/{id}/form", put(replace_form).patch(patch_form))
        .route("/wizard/{id}/date-time", put(set_date_time))
        .route("/wizard/{id}/client/{contact_id}", post(select_client))
        .route("/wizard/{id}/property/{property_id}", post(select_property))
        .route("/wizard/{id}/contract/{contract_id}", post(select_contract))
        .route("/wizard/{id}/cover-letter/{letter_id}", post(select_cover_letter))
        .route("/wizard/{id}/next", post(next_step))
        .route("/wizard/{id}/previous", post(previous_step))
        .route("/wizard/{id}/jump/{step}", post(jump_to_step))
        .route("/wizard/{id}/finish", post(finish_wizard))
        .route("/contacts/clients", get(search_clients))
        .route("/properties", get(list_properties))
        .route("/contracts", get(list_contracts))
        .route("/cover-letters", get(list_cover_letters))
        .route("/bookings", get(list_bookings))
        .route("/bookings/{id}", get(get_booking))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&correlation_id).ok();

    if let Some(value) = header.clone() {
        request.headers_mut().insert(CORRELATION_HEADER, value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_steps() -> Json<StepsResponse> {
    Json(StepsResponse {
        steps: StepKind::ALL.into_iter().map(StepView::from).collect(),
        inspection_types: &INSPECTION_TYPES,
        payment_methods: &PAYMENT_METHODS,
        payment_splits: &PAYMENT_SPLITS,
    })
}

async fn start_wizard(
    State(state): State<AppState>,
    Json(request): Json<StartWizardRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let session = state.runner.start(request.form).await?;
    info!(session_id = %session.id, steps = STEPS.len(), "Started booking wizard");
    Ok((StatusCode::CREATED, Json(session.into())))
}

async fn get_wizard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionView> {
    let session = state.runner.snapshot(&session_id).await?;
    Ok(Json(session.into()))
}

async fn replace_form(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(form): Json<FormData>,
) -> ApiResult<SessionView> {
    let session = state
        .runner
        .edit(&session_id, |state| {
            state.replace(form);
            Ok(())
        })
        .await?;
    Ok(Json(session.into()))
}

async fn patch_form(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<PatchFormRequest>,
) -> ApiResult<SessionView> {
    info!(session_id = %session_id, section = %request.section, "Patching form section");
    let session = state
        .runner
        .edit(&session_id, |form| {
            form.merge_section(request.section, request.fields)
        })
        .await?;
    Ok(Json(session.into()))
}

async fn set_date_time(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<DateTimeRequest>,
) -> ApiResult<Value> {
    let mut accepted = false;
    let session = state
        .runner
        .edit(&session_id, |form| {
            accepted = form.set_date_time(&request.value);
            Ok(())
        })
        .await?;
    Ok(Json(json!({
        "accepted": accepted,
        "session": SessionView::from(session)
    })))
}

async fn select_client(
    State(state): State<AppState>,
    Path((session_id, contact_id)): Path<(String, String)>,
) -> ApiResult<SessionView> {
    let contact = state
        .contacts
        .get(&contact_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Contact not found: {contact_id}")))?;
    if contact.contact_type != ContactType::Client {
        return Err(ApiError::BadRequest(format!(
            "Contact {contact_id} is not a client"
        )));
    }

    let session = state
        .runner
        .edit(&session_id, |form| {
            form.select_client(&contact);
            Ok(())
        })
        .await?;
    info!(session_id = %session_id, client_id = %contact.id, "Client selected");
    Ok(Json(session.into()))
}

async fn select_property(
    State(state): State<AppState>,
    Path((session_id, property_id)): Path<(String, String)>,
) -> ApiResult<SessionView> {
    let property = state
        .properties
        .get(&property_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Property not found: {property_id}")))?;

    let session = state
        .runner
        .edit(&session_id, |form| {
            form.select_property(&property);
            Ok(())
        })
        .await?;
    info!(session_id = %session_id, property_id = %property.id, "Property selected");
    Ok(Json(session.into()))
}

async fn select_contract(
    State(state): State<AppState>,
    Path((session_id, contract_id)): Path<(String, String)>,
) -> ApiResult<SessionView> {
    let contract = state
        .contracts
        .get(&contract_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Contract not found: {contract_id}")))?;

    let session = state
        .runner
        .edit(&session_id, |form| {
            form.select_contract(&contract);
            Ok(())
        })
        .await?;
    Ok(Json(session.into()))
}

async fn select_cover_letter(
    State(state): State<AppState>,
    Path((session_id, letter_id)): Path<(String, String)>,
) -> ApiResult<SessionView> {
    let letter = state
        .cover_letters
        .get(&letter_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Cover letter not found: {letter_id}")))?;

    let session = state
        .runner
        .edit(&session_id, |form| {
            form.select_cover_letter(&letter);
            Ok(())
        })
        .await?;
    Ok(Json(session.into()))
}

async fn apply_action(
    state: &AppState,
    session_id: &str,
    action: WizardAction,
) -> ApiResult<TransitionResponse> {
    info!(session_id = %session_id, action = ?action, "Applying wizard action");
    let result = state.runner.run(session_id, action).await?;
    Ok(Json(result.into()))
}

async fn next_step(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<TransitionResponse> {
    apply_action(&state, &session_id, WizardAction::Next).await
}

async fn previous_step(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<TransitionResponse> {
    apply_action(&state, &session_id, WizardAction::Previous).await
}

async fn jump_to_step(
    State(state): State<AppState>,
    Path((session_id, step)): Path<(String, usize)>,
) -> ApiResult<TransitionResponse> {
    apply_action(&state, &session_id, WizardAction::JumpTo(step)).await
}

async fn finish_wizard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<TransitionResponse> {
    apply_action(&state, &session_id, WizardAction::Finish).await
}

async fn close_wizard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<TransitionResponse> {
    apply_action(&state, &session_id, WizardAction::Close).await
}

async fn search_clients(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<booking_flow::Contact>> {
    Ok(Json(state.contacts.clients(&query.q).await?))
}

async fn list_properties(
    State(state): State<AppState>,
    Query(query): Query<PropertyQuery>,
) -> ApiResult<Vec<Property>> {
    let properties = match query.contact_id.as_deref() {
        Some(contact_id) => state.properties.list_by_contact(contact_id, &query.q).await?,
        None => {
            let mut properties = state.properties.list().await?;
            properties.retain(|p| p.matches(&query.q));
            properties
        }
    };
    Ok(Json(properties))
}

async fn list_contracts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<Contract>> {
    Ok(Json(state.contracts.search(&query.q).await?))
}

async fn list_cover_letters(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<CoverLetter>> {
    Ok(Json(state.cover_letters.search(&query.q).await?))
}

async fn list_bookings(State(state): State<AppState>) -> ApiResult<Vec<Booking>> {
    Ok(Json(state.bookings.list().await?))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> ApiResult<Booking> {
    state
        .bookings
        .get(&DraftId::from(booking_id.clone()))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Booking not found: {booking_id}")))
}
