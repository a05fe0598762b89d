use sea_orm_migration::{prelude::*, schema::*};

use crate::m20261001_000002_create_threads::Threads;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Staged bulk actions; rows are never deleted and serve as the audit trail
        manager
            .create_table(
                Table::create()
                    .table(PendingActions::Table)
                    .if_not_exists()
                    .col(pk_uuid(PendingActions::Id))
                    .col(uuid(PendingActions::WorkspaceId))
                    .col(uuid(PendingActions::OwnerUserId))
                    .col(uuid_null(PendingActions::ThreadId))
                    .col(string_len(PendingActions::ActionType, 32))
                    .col(string_len(PendingActions::SourceType, 16))
                    .col(json_binary(PendingActions::Payload))
                    .col(json_binary(PendingActions::Summary))
                    .col(
                        ColumnDef::new(PendingActions::ConfirmToken)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(string_len_null(PendingActions::Decision, 32))
                    .col(
                        ColumnDef::new(PendingActions::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(json_binary_null(PendingActions::Result))
                    .col(string_len_null(PendingActions::RequestId, 128))
                    .col(string_len_null(PendingActions::ExecuteRequestId, 128))
                    .col(timestamp_with_time_zone(PendingActions::ExpiresAt))
                    .col(timestamp_with_time_zone_null(PendingActions::DecidedAt))
                    .col(timestamp_with_time_zone_null(PendingActions::ExecutedAt))
                    .col(
                        timestamp_with_time_zone(PendingActions::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(PendingActions::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pending_actions_thread")
                            .from(PendingActions::Table, PendingActions::ThreadId)
                            .to(Threads::Table, Threads::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pending_actions_tenant")
                    .table(PendingActions::Table)
                    .col(PendingActions::WorkspaceId)
                    .col(PendingActions::OwnerUserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pending_actions_status")
                    .table(PendingActions::Table)
                    .col(PendingActions::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER pending_actions_touch_updated_at
                    BEFORE UPDATE ON pending_actions
                    FOR EACH ROW
                    EXECUTE FUNCTION util.touch_updated_at()
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                "DROP TRIGGER IF EXISTS pending_actions_touch_updated_at ON pending_actions",
            )
            .await?;
        manager
            .drop_table(Table::drop().table(PendingActions::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum PendingActions {
    Table,
    Id,
    WorkspaceId,
    OwnerUserId,
    ThreadId,
    ActionType,
    SourceType,
    Payload,
    Summary,
    ConfirmToken,
    Decision,
    Status,
    Result,
    RequestId,
    ExecuteRequestId,
    ExpiresAt,
    DecidedAt,
    ExecutedAt,
    CreatedAt,
    UpdatedAt,
}
