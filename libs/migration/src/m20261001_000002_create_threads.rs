use sea_orm_migration::{prelude::*, schema::*};

use crate::m20261001_000001_create_directory::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Threads::Table)
                    .if_not_exists()
                    .col(pk_uuid(Threads::Id))
                    .col(uuid(Threads::WorkspaceId))
                    .col(uuid(Threads::OwnerUserId))
                    .col(string_len(Threads::Title, 255))
                    .col(
                        ColumnDef::new(Threads::Status)
                            .string_len(32)
                            .not_null()
                            .default("open"),
                    )
                    .col(
                        timestamp_with_time_zone(Threads::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Threads::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_threads_tenant")
                    .table(Threads::Table)
                    .col(Threads::WorkspaceId)
                    .col(Threads::OwnerUserId)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER threads_touch_updated_at
                    BEFORE UPDATE ON threads
                    FOR EACH ROW
                    EXECUTE FUNCTION util.touch_updated_at()
                "#,
            )
            .await?;

        // Invite rows double as delivery records for invite emails
        manager
            .create_table(
                Table::create()
                    .table(ThreadInvites::Table)
                    .if_not_exists()
                    .col(pk_uuid(ThreadInvites::Id))
                    .col(uuid(ThreadInvites::ThreadId))
                    .col(string_len(ThreadInvites::Email, 320))
                    .col(string_len(ThreadInvites::EmailNormalized, 320))
                    .col(uuid_null(ThreadInvites::UserId))
                    .col(
                        ColumnDef::new(ThreadInvites::Token)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ThreadInvites::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(text_null(ThreadInvites::ProviderId))
                    .col(timestamp_with_time_zone_null(ThreadInvites::SentAt))
                    .col(
                        timestamp_with_time_zone(ThreadInvites::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_thread_invites_thread")
                            .from(ThreadInvites::Table, ThreadInvites::ThreadId)
                            .to(Threads::Table, Threads::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_thread_invites_user")
                            .from(ThreadInvites::Table, ThreadInvites::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_thread_invites_thread_email")
                    .table(ThreadInvites::Table)
                    .col(ThreadInvites::ThreadId)
                    .col(ThreadInvites::EmailNormalized)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ThreadSlots::Table)
                    .if_not_exists()
                    .col(pk_uuid(ThreadSlots::Id))
                    .col(uuid(ThreadSlots::ThreadId))
                    .col(timestamp_with_time_zone(ThreadSlots::StartAt))
                    .col(timestamp_with_time_zone(ThreadSlots::EndAt))
                    .col(
                        timestamp_with_time_zone(ThreadSlots::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_thread_slots_thread")
                            .from(ThreadSlots::Table, ThreadSlots::ThreadId)
                            .to(Threads::Table, Threads::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_thread_slots_thread_range")
                    .table(ThreadSlots::Table)
                    .col(ThreadSlots::ThreadId)
                    .col(ThreadSlots::StartAt)
                    .col(ThreadSlots::EndAt)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ThreadSlots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ThreadInvites::Table).to_owned())
            .await?;
        manager
            .get_connection()
            .execute_unprepared("DROP TRIGGER IF EXISTS threads_touch_updated_at ON threads")
            .await?;
        manager
            .drop_table(Table::drop().table(Threads::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Threads {
    Table,
    Id,
    WorkspaceId,
    OwnerUserId,
    Title,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum ThreadInvites {
    Table,
    Id,
    ThreadId,
    Email,
    EmailNormalized,
    UserId,
    Token,
    Status,
    ProviderId,
    SentAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ThreadSlots {
    Table,
    Id,
    ThreadId,
    StartAt,
    EndAt,
    CreatedAt,
}
