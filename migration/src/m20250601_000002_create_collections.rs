use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [Collection::Favorites, Collection::Watchlist] {
            manager
                .create_table(
                    Table::create()
                        .table(table)
                        .if_not_exists()
                        .col(pk_auto(Entry::Id))
                        .col(string(Entry::UserId))
                        .col(string(Entry::MovieId))
                        .col(text(Entry::MovieData))
                        .col(big_integer(Entry::CreatedAt))
                        .to_owned(),
                )
                .await?;

            // One entry per (user, movie); inserts rely on this to report duplicates.
            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{}_user_movie_unique", Iden::to_string(&table)))
                        .table(table)
                        .col(Entry::UserId)
                        .col(Entry::MovieId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{}_created_at", Iden::to_string(&table)))
                        .table(table)
                        .col(Entry::CreatedAt)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Collection::Watchlist).to_owned()).await?;
        manager.drop_table(Table::drop().table(Collection::Favorites).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden, Clone, Copy)]
enum Collection {
    Favorites,
    Watchlist,
}

#[derive(DeriveIden)]
enum Entry {
    Id,
    UserId,
    MovieId,
    MovieData,
    CreatedAt,
}
