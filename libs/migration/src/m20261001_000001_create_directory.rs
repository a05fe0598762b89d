use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Platform users; invitees matching one of these get an in-app notification
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_uuid(Users::Id))
                    .col(
                        ColumnDef::new(Users::Email)
                            .string_len(320)
                            .not_null()
                            .unique_key(),
                    )
                    .col(string_len(Users::DisplayName, 255))
                    .col(
                        timestamp_with_time_zone(Users::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_lower ON users (lower(email))",
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ContactLists::Table)
                    .if_not_exists()
                    .col(pk_uuid(ContactLists::Id))
                    .col(uuid(ContactLists::WorkspaceId))
                    .col(uuid(ContactLists::OwnerUserId))
                    .col(string_len(ContactLists::Name, 255))
                    .col(
                        timestamp_with_time_zone(ContactLists::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_contact_lists_tenant")
                    .table(ContactLists::Table)
                    .col(ContactLists::WorkspaceId)
                    .col(ContactLists::OwnerUserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ContactListMembers::Table)
                    .if_not_exists()
                    .col(pk_uuid(ContactListMembers::Id))
                    .col(uuid(ContactListMembers::ListId))
                    .col(string_len_null(ContactListMembers::Name, 255))
                    .col(string_len_null(ContactListMembers::Email, 320))
                    .col(
                        timestamp_with_time_zone(ContactListMembers::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contact_list_members_list")
                            .from(ContactListMembers::Table, ContactListMembers::ListId)
                            .to(ContactLists::Table, ContactLists::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_contact_list_members_list_id")
                    .table(ContactListMembers::Table)
                    .col(ContactListMembers::ListId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContactListMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ContactLists::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Email,
    DisplayName,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ContactLists {
    Table,
    Id,
    WorkspaceId,
    OwnerUserId,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ContactListMembers {
    Table,
    Id,
    ListId,
    Name,
    Email,
    CreatedAt,
}
