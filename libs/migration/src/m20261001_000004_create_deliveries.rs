use sea_orm_migration::{prelude::*, schema::*};

use crate::m20261001_000001_create_directory::Users;
use crate::m20261001_000002_create_threads::{ThreadInvites, Threads};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BroadcastDeliveries::Table)
                    .if_not_exists()
                    .col(pk_uuid(BroadcastDeliveries::Id))
                    .col(uuid(BroadcastDeliveries::ThreadId))
                    .col(string_len(BroadcastDeliveries::Email, 320))
                    .col(
                        ColumnDef::new(BroadcastDeliveries::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(text_null(BroadcastDeliveries::ProviderId))
                    .col(timestamp_with_time_zone_null(BroadcastDeliveries::SentAt))
                    .col(
                        timestamp_with_time_zone(BroadcastDeliveries::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_broadcast_deliveries_thread")
                            .from(BroadcastDeliveries::Table, BroadcastDeliveries::ThreadId)
                            .to(Threads::Table, Threads::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ThreadMessageDeliveries::Table)
                    .if_not_exists()
                    .col(pk_uuid(ThreadMessageDeliveries::Id))
                    .col(uuid(ThreadMessageDeliveries::ThreadId))
                    .col(uuid(ThreadMessageDeliveries::MessageId))
                    .col(string_len(ThreadMessageDeliveries::Email, 320))
                    .col(
                        ColumnDef::new(ThreadMessageDeliveries::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(text_null(ThreadMessageDeliveries::ProviderId))
                    .col(timestamp_with_time_zone_null(ThreadMessageDeliveries::SentAt))
                    .col(
                        timestamp_with_time_zone(ThreadMessageDeliveries::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_thread_message_deliveries_thread")
                            .from(ThreadMessageDeliveries::Table, ThreadMessageDeliveries::ThreadId)
                            .to(Threads::Table, Threads::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(pk_uuid(Notifications::Id))
                    .col(uuid(Notifications::UserId))
                    .col(uuid(Notifications::WorkspaceId))
                    .col(string_len(Notifications::Kind, 64))
                    .col(uuid_null(Notifications::ThreadId))
                    .col(uuid_null(Notifications::InviteId))
                    .col(json_binary(Notifications::Payload))
                    .col(timestamp_with_time_zone_null(Notifications::ReadAt))
                    .col(
                        timestamp_with_time_zone(Notifications::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_user")
                            .from(Notifications::Table, Notifications::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_invite")
                            .from(Notifications::Table, Notifications::InviteId)
                            .to(ThreadInvites::Table, ThreadInvites::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_user_unread")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::ReadAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ThreadMessageDeliveries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BroadcastDeliveries::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum BroadcastDeliveries {
    Table,
    Id,
    ThreadId,
    Email,
    Status,
    ProviderId,
    SentAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ThreadMessageDeliveries {
    Table,
    Id,
    ThreadId,
    MessageId,
    Email,
    Status,
    ProviderId,
    SentAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
    UserId,
    WorkspaceId,
    Kind,
    ThreadId,
    InviteId,
    Payload,
    ReadAt,
    CreatedAt,
}
