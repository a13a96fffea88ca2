//! Create block edge table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BlockEdge::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BlockEdge::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BlockEdge::BlockerId).string_len(32).not_null())
                    .col(ColumnDef::new(BlockEdge::BlockedId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(BlockEdge::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(BlockEdge::BlockerId).ne(Expr::col(BlockEdge::BlockedId)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_block_edge_blocker")
                            .from(BlockEdge::Table, BlockEdge::BlockerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_block_edge_blocked")
                            .from(BlockEdge::Table, BlockEdge::BlockedId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (blocker_id, blocked_id) - prevent duplicate blocks
        manager
            .create_index(
                Index::create()
                    .name("idx_block_edge_blocker_blocked")
                    .table(BlockEdge::Table)
                    .col(BlockEdge::BlockerId)
                    .col(BlockEdge::BlockedId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: blocked_id (for the inverse "is blocked by" query)
        manager
            .create_index(
                Index::create()
                    .name("idx_block_edge_blocked_id")
                    .table(BlockEdge::Table)
                    .col(BlockEdge::BlockedId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BlockEdge::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum BlockEdge {
    Table,
    Id,
    BlockerId,
    BlockedId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
