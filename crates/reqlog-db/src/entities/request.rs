//! Request entity: one captured outbound request/response pair

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "requests")]
pub struct Model {
    /// Assigned by the database on insert, never reused
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Pattern that caused the request to be captured
    pub matched_pattern: String,

    #[sea_orm(column_type = "Text")]
    pub request_url: String,

    /// JSON-encoded request arguments
    #[sea_orm(column_type = "Text")]
    pub request_args: String,

    pub response_code: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub response_message: Option<String>,

    /// JSON-encoded response headers: {name: value | [values]}
    #[sea_orm(column_type = "Text", nullable)]
    pub response_headers: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub response_body: Option<String>,

    /// Capture time, second precision
    pub captured_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
