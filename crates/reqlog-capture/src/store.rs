//! Persistent store of captured requests
//!
//! Ids come from the database's auto-increment, which keeps them unique and
//! strictly increasing under concurrent appends without any in-process
//! locking. The collection is bounded only by [`RequestStore::cleanup`].

use reqlog_db::entities::request::{self, Column, Entity as Request};
use sea_orm::sea_query::{Alias, Expr, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, NotSet,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::diagnostic::DIAGNOSTIC_TARGET;
use crate::record::{NewRecord, RequestRecord};

/// Default page size of [`RecordQuery`]
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Largest row count or offset the backends can bind (signed 64-bit)
pub const MAX_ROW_BOUND: u64 = i64::MAX as u64;

/// Errors surfaced by store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(#[from] DbErr),
}

/// Column a query can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Id,
    #[serde(alias = "request_pattern")]
    MatchedPattern,
    RequestUrl,
    RequestArgs,
    ResponseCode,
    ResponseMessage,
    ResponseHeaders,
    ResponseBody,
    #[default]
    #[serde(alias = "date_time")]
    CapturedAt,
}

impl SortColumn {
    fn column(self) -> Column {
        match self {
            SortColumn::Id => Column::Id,
            SortColumn::MatchedPattern => Column::MatchedPattern,
            SortColumn::RequestUrl => Column::RequestUrl,
            SortColumn::RequestArgs => Column::RequestArgs,
            SortColumn::ResponseCode => Column::ResponseCode,
            SortColumn::ResponseMessage => Column::ResponseMessage,
            SortColumn::ResponseHeaders => Column::ResponseHeaders,
            SortColumn::ResponseBody => Column::ResponseBody,
            SortColumn::CapturedAt => Column::CapturedAt,
        }
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(SortColumn::Id),
            "matched_pattern" | "request_pattern" | "pattern" => Ok(SortColumn::MatchedPattern),
            "request_url" | "url" => Ok(SortColumn::RequestUrl),
            "request_args" => Ok(SortColumn::RequestArgs),
            "response_code" | "code" => Ok(SortColumn::ResponseCode),
            "response_message" | "message" => Ok(SortColumn::ResponseMessage),
            "response_headers" => Ok(SortColumn::ResponseHeaders),
            "response_body" => Ok(SortColumn::ResponseBody),
            "captured_at" | "date_time" => Ok(SortColumn::CapturedAt),
            other => Err(format!("Unknown sort column: {}", other)),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[serde(alias = "ASC")]
    Asc,
    #[default]
    #[serde(alias = "DESC")]
    Desc,
}

impl From<SortOrder> for Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("Unknown sort order: {}", other)),
        }
    }
}

/// Search, ordering and pagination of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Substring matched against pattern, URL, message and code
    pub search: Option<String>,
    pub order_by: SortColumn,
    pub order: SortOrder,
    pub limit: u64,
    pub offset: u64,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            search: None,
            order_by: SortColumn::CapturedAt,
            order: SortOrder::Desc,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl RecordQuery {
    /// Query for a 1-based page number
    pub fn page(page: u64, per_page: u64) -> Self {
        let per_page = per_page.clamp(1, MAX_ROW_BOUND);
        Self {
            limit: per_page,
            offset: page
                .saturating_sub(1)
                .saturating_mul(per_page)
                .min(MAX_ROW_BOUND),
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.is_empty() { None } else { Some(search) };
        self
    }

    pub fn sorted_by(mut self, column: SortColumn, order: SortOrder) -> Self {
        self.order_by = column;
        self.order = order;
        self
    }
}

/// Result of a retention cleanup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupReport {
    /// No more than `max_records` records exist
    NothingToDo,
    /// Records with `id <= cutoff_id` were removed
    Pruned { cutoff_id: i64, deleted: u64 },
    /// Storage was unavailable; nothing was removed
    Aborted { reason: String },
}

/// Outcome of deleting several records one by one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteReport {
    pub deleted: Vec<i64>,
    pub not_found: Vec<i64>,
    pub failed: Vec<BulkDeleteFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteFailure {
    pub id: i64,
    pub error: String,
}

/// Database-backed request store
#[derive(Clone)]
pub struct RequestStore {
    db: Arc<DatabaseConnection>,
}

impl RequestStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Connect to `database_url` and run migrations
    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        let db = reqlog_db::connect(database_url).await?;
        reqlog_db::migrate(&db).await?;
        Ok(Self::new(db))
    }

    /// Persist a record and return its id
    pub async fn append(&self, record: NewRecord) -> Result<i64, StoreError> {
        let model = request::ActiveModel {
            id: NotSet,
            matched_pattern: Set(record.matched_pattern),
            request_url: Set(record.request_url),
            request_args: Set(record.request_args),
            response_code: Set(record.response_code),
            response_message: Set(record.response_message),
            response_headers: Set(record.response_headers),
            response_body: Set(record.response_body),
            captured_at: Set(record.captured_at),
        };

        let inserted = model.insert(self.db.as_ref()).await?;
        debug!(id = inserted.id, pattern = %inserted.matched_pattern, "Request stored");

        Ok(inserted.id)
    }

    /// Fetch a single record
    pub async fn get(&self, id: i64) -> Result<Option<RequestRecord>, StoreError> {
        let model = Request::find_by_id(id).one(self.db.as_ref()).await?;
        Ok(model.map(RequestRecord::from))
    }

    /// List records matching the query
    pub async fn query(&self, query: &RecordQuery) -> Result<Vec<RequestRecord>, StoreError> {
        let order: Order = query.order.into();

        let mut select = Request::find()
            .filter(search_condition(query.search.as_deref()))
            .order_by(query.order_by.column(), order.clone());

        // Ties (same second, same code...) keep insertion order
        if query.order_by != SortColumn::Id {
            select = select.order_by(Column::Id, order);
        }

        let models = select
            .offset(query.offset.min(MAX_ROW_BOUND))
            .limit(query.limit.min(MAX_ROW_BOUND))
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(RequestRecord::from).collect())
    }

    /// Count records matching the search term
    pub async fn count(&self, search: Option<&str>) -> Result<u64, StoreError> {
        let total = Request::find()
            .filter(search_condition(search))
            .count(self.db.as_ref())
            .await?;

        Ok(total)
    }

    /// Delete one record; returns whether it existed
    pub async fn delete_by_id(&self, id: i64) -> Result<bool, StoreError> {
        let result = Request::delete_by_id(id).exec(self.db.as_ref()).await?;
        debug!(id = id, deleted = result.rows_affected, "Delete request");

        Ok(result.rows_affected > 0)
    }

    /// Delete several records one at a time
    ///
    /// Not atomic: a failure on one id does not undo or stop the others.
    pub async fn delete_many(&self, ids: &[i64]) -> BulkDeleteReport {
        let mut report = BulkDeleteReport::default();

        for &id in ids {
            match self.delete_by_id(id).await {
                Ok(true) => report.deleted.push(id),
                Ok(false) => report.not_found.push(id),
                Err(e) => {
                    warn!(target: DIAGNOSTIC_TARGET, id = id, error = %e, "Failed to delete request");
                    report.failed.push(BulkDeleteFailure {
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Keep only the `max_records` newest records by id
    ///
    /// Never fails: storage problems are reported on the diagnostic log and
    /// in the returned report. Running it twice in a row removes nothing the
    /// second time.
    pub async fn cleanup(&self, max_records: u64) -> CleanupReport {
        // More rows than that can never exist
        if max_records > MAX_ROW_BOUND {
            debug!(max_records = max_records, "Nothing to clean up");
            return CleanupReport::NothingToDo;
        }

        match reqlog_db::requests_table_exists(self.db.as_ref()).await {
            Ok(true) => {}
            Ok(false) => {
                let reason = "the requests table doesn't exist".to_string();
                warn!(target: DIAGNOSTIC_TARGET, "Records cleanup failed: {}", reason);
                return CleanupReport::Aborted { reason };
            }
            Err(e) => return aborted(e),
        }

        let cutoff = Request::find()
            .select_only()
            .column(Column::Id)
            .order_by_desc(Column::Id)
            .offset(max_records)
            .limit(1)
            .into_tuple::<i64>()
            .one(self.db.as_ref())
            .await;

        let cutoff_id = match cutoff {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!(max_records = max_records, "Nothing to clean up");
                return CleanupReport::NothingToDo;
            }
            Err(e) => return aborted(e),
        };

        match Request::delete_many()
            .filter(Column::Id.lte(cutoff_id))
            .exec(self.db.as_ref())
            .await
        {
            Ok(result) => {
                info!(
                    cutoff_id = cutoff_id,
                    deleted = result.rows_affected,
                    max_records = max_records,
                    "Old requests cleaned up"
                );
                CleanupReport::Pruned {
                    cutoff_id,
                    deleted: result.rows_affected,
                }
            }
            Err(e) => aborted(e),
        }
    }
}

fn aborted(e: DbErr) -> CleanupReport {
    warn!(target: DIAGNOSTIC_TARGET, error = %e, "Records cleanup failed");
    CleanupReport::Aborted {
        reason: e.to_string(),
    }
}

/// OR of substring matches over pattern, URL, message and code
///
/// LIKE wildcards in the term are escaped so they match literally.
fn search_condition(search: Option<&str>) -> Condition {
    let Some(term) = search.filter(|s| !s.is_empty()) else {
        return Condition::all();
    };

    let pattern = LikeExpr::new(format!("%{}%", escape_like(term))).escape(LIKE_ESCAPE);

    Condition::any()
        .add(Column::MatchedPattern.like(pattern.clone()))
        .add(Column::RequestUrl.like(pattern.clone()))
        .add(Column::ResponseMessage.like(pattern.clone()))
        .add(Expr::expr(Expr::col(Column::ResponseCode).cast_as(Alias::new("TEXT"))).like(pattern))
}

const LIKE_ESCAPE: char = '!';

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, LIKE_ESCAPE | '%' | '_') {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}
