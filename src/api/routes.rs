//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, FromRequest, FromRequestParts, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::{self, parse_date, Entry, EntryChanges, Kind, Money};
use crate::error::{AppError, AppResult};
use crate::store::{sum_entries, LedgerStore};

use super::middleware::RequestUser;

// =========================================================================
// Extractors
// =========================================================================

/// JSON body whose rejection is reported as an [`AppError`]
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path parameters whose rejection is reported as an [`AppError`]
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Query string whose rejection is reported as an [`AppError`]
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEntryRequest {
    pub amount: String,
    pub kind: String,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateEntryRequest {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntryResponse {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: Money,
    pub kind: Kind,
    pub commission: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
}

impl From<Entry> for EntryResponse {
    fn from(entry: Entry) -> Self {
        Self {
            id: entry.id,
            date: entry.occurred_at,
            amount: entry.amount,
            kind: entry.kind,
            commission: entry.commission,
            owner_id: entry.owner,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntriesListResponse {
    pub entries: Vec<EntryResponse>,
    pub total_amount: Money,
    pub total_commission: Money,
}

#[derive(Debug, Deserialize)]
pub struct TotalsQuery {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TotalsResponse {
    pub year: i32,
    pub month: u32,
    pub sale: Money,
    pub presentation: Money,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<SqlitePool> {
    Router::new()
        .route("/entries", get(list_entries).post(add_entry))
        .route(
            "/entries/:id",
            get(get_entry).patch(update_entry).delete(delete_entry),
        )
        .route("/totals", get(get_totals))
}

fn owner_of(request_user: Option<Extension<RequestUser>>) -> Option<Uuid> {
    request_user.map(|Extension(user)| user.user_id)
}

// =========================================================================
// POST /entries
// =========================================================================

/// Record a sale or presentation
async fn add_entry(
    State(pool): State<SqlitePool>,
    request_user: Option<Extension<RequestUser>>,
    AppJson(request): AppJson<CreateEntryRequest>,
) -> AppResult<(StatusCode, Json<EntryResponse>)> {
    let owner = owner_of(request_user);

    let occurred_at = request
        .date
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_date)
        .transpose()?;

    let mut entry = domain::create_entry(&request.amount, &request.kind, occurred_at)?;
    if let Some(owner) = owner {
        entry = entry.with_owner(owner);
    }

    let store = LedgerStore::new(pool);
    let id = store.insert(&entry).await?;
    let stored = store.get(id, owner).await?;

    Ok((StatusCode::CREATED, Json(stored.into())))
}

// =========================================================================
// GET /entries
// =========================================================================

/// List entries, newest first, with grand totals
async fn list_entries(
    State(pool): State<SqlitePool>,
    request_user: Option<Extension<RequestUser>>,
) -> AppResult<Json<EntriesListResponse>> {
    let entries = LedgerStore::new(pool).list_all(owner_of(request_user)).await?;
    let totals = sum_entries(&entries);

    Ok(Json(EntriesListResponse {
        entries: entries.into_iter().map(EntryResponse::from).collect(),
        total_amount: totals.amount,
        total_commission: totals.commission,
    }))
}

// =========================================================================
// GET /entries/:id
// =========================================================================

async fn get_entry(
    State(pool): State<SqlitePool>,
    request_user: Option<Extension<RequestUser>>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<EntryResponse>> {
    let entry = LedgerStore::new(pool).get(id, owner_of(request_user)).await?;
    Ok(Json(entry.into()))
}

// =========================================================================
// PATCH /entries/:id
// =========================================================================

/// Update any subset of date, amount and kind
async fn update_entry(
    State(pool): State<SqlitePool>,
    request_user: Option<Extension<RequestUser>>,
    AppPath(id): AppPath<i64>,
    AppJson(request): AppJson<UpdateEntryRequest>,
) -> AppResult<Json<EntryResponse>> {
    let changes = EntryChanges::parse(
        request.date.as_deref(),
        request.amount.as_deref(),
        request.kind.as_deref(),
    )?;

    let entry = LedgerStore::new(pool)
        .update(id, &changes, owner_of(request_user))
        .await?;

    Ok(Json(entry.into()))
}

// =========================================================================
// DELETE /entries/:id
// =========================================================================

async fn delete_entry(
    State(pool): State<SqlitePool>,
    request_user: Option<Extension<RequestUser>>,
    AppPath(id): AppPath<i64>,
) -> AppResult<StatusCode> {
    LedgerStore::new(pool)
        .delete(id, owner_of(request_user))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// GET /totals
// =========================================================================

/// Monthly amount totals per kind; defaults to the current month
async fn get_totals(
    State(pool): State<SqlitePool>,
    request_user: Option<Extension<RequestUser>>,
    AppQuery(query): AppQuery<TotalsQuery>,
) -> AppResult<Json<TotalsResponse>> {
    let today = Utc::now().date_naive();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month());

    let totals = LedgerStore::new(pool)
        .totals(year, month, owner_of(request_user))
        .await?;

    Ok(Json(TotalsResponse {
        year,
        month,
        sale: totals.sale,
        presentation: totals.presentation,
    }))
}
