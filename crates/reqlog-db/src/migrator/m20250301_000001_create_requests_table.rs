//! Migration to create the requests table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Request::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Request::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Request::MatchedPattern)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Request::RequestUrl).text().not_null())
                    .col(ColumnDef::new(Request::RequestArgs).text().not_null())
                    .col(ColumnDef::new(Request::ResponseCode).integer())
                    .col(ColumnDef::new(Request::ResponseMessage).text())
                    .col(ColumnDef::new(Request::ResponseHeaders).text())
                    .col(ColumnDef::new(Request::ResponseBody).text())
                    .col(
                        ColumnDef::new(Request::CapturedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Default list ordering is captured_at DESC
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_requests_captured_at")
                    .table(Request::Table)
                    .col(Request::CapturedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_requests_matched_pattern")
                    .table(Request::Table)
                    .col(Request::MatchedPattern)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Request::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Request {
    #[sea_orm(iden = "requests")]
    Table,
    Id,
    MatchedPattern,
    RequestUrl,
    RequestArgs,
    ResponseCode,
    ResponseMessage,
    ResponseHeaders,
    ResponseBody,
    CapturedAt,
}
