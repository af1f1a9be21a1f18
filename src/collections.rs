use std::collections::HashMap;

use futures::future::join_all;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use tracing::{debug, warn};

use crate::{
    db::now_sec,
    entities::with_table,
    error::{AppError, AppResult},
    models::{Collection, Movie, MovieState},
};

/// Favorites and watchlist entries keyed by (user, movie).
#[derive(Clone)]
pub struct CollectionStore {
    db: DatabaseConnection,
}

impl CollectionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Saves a snapshot of `movie`. The unique index on (user_id, movie_id)
    /// decides duplicates.
    pub async fn add(&self, collection: Collection, user_id: &str, movie: &Movie) -> AppResult<()> {
        if movie.id.trim().is_empty() {
            return Err(AppError::Invalid("movie id is required".to_string()));
        }
        let movie_data = serde_json::to_string(movie)?;
        let now = now_sec();

        let result = with_table!(collection, table => {
            let model = table::ActiveModel {
                id: Default::default(),
                user_id: Set(user_id.to_string()),
                movie_id: Set(movie.id.clone()),
                movie_data: Set(movie_data),
                created_at: Set(now),
            };
            table::Entity::insert(model).exec(&self.db).await.map(|_| ())
        });

        match result {
            Ok(()) => {
                debug!(%collection, user_id = %user_id, movie_id = %movie.id, "added");
                Ok(())
            },
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(%collection, user_id = %user_id, movie_id = %movie.id, "already saved");
                Err(AppError::AlreadyExists(collection))
            },
            Err(err) => Err(err.into()),
        }
    }

    /// Deleting a movie that is not saved is not an error.
    pub async fn remove(
        &self,
        collection: Collection,
        user_id: &str,
        movie_id: &str,
    ) -> AppResult<()> {
        let deleted = with_table!(collection, table => {
            table::Entity::delete_many()
                .filter(table::Column::UserId.eq(user_id))
                .filter(table::Column::MovieId.eq(movie_id))
                .exec(&self.db)
                .await?
                .rows_affected
        });

        debug!(%collection, user_id = %user_id, movie_id = %movie_id, deleted, "removed");
        Ok(())
    }

    /// Newest first.
    pub async fn list(&self, collection: Collection, user_id: &str) -> AppResult<Vec<Movie>> {
        let rows: Vec<(String, String)> = with_table!(collection, table => {
            table::Entity::find()
                .filter(table::Column::UserId.eq(user_id))
                .order_by_desc(table::Column::CreatedAt)
                .order_by_desc(table::Column::Id)
                .all(&self.db)
                .await?
                .into_iter()
                .map(|row| (row.movie_id, row.movie_data))
                .collect()
        });

        let movies = rows
            .into_iter()
            .filter_map(|(movie_id, data)| match serde_json::from_str(&data) {
                Ok(movie) => Some(movie),
                Err(err) => {
                    warn!(%collection, movie_id = %movie_id, error = %err, "skipping unreadable snapshot");
                    None
                },
            })
            .collect();

        Ok(movies)
    }

    pub async fn exists(
        &self,
        collection: Collection,
        user_id: &str,
        movie_id: &str,
    ) -> AppResult<bool> {
        let count = with_table!(collection, table => {
            table::Entity::find()
                .filter(table::Column::UserId.eq(user_id))
                .filter(table::Column::MovieId.eq(movie_id))
                .count(&self.db)
                .await?
        });
        Ok(count > 0)
    }

    pub async fn count(&self, collection: Collection, user_id: &str) -> AppResult<u64> {
        let count = with_table!(collection, table => {
            table::Entity::find()
                .filter(table::Column::UserId.eq(user_id))
                .count(&self.db)
                .await?
        });
        Ok(count)
    }

    /// Checks both collections for every movie concurrently. A failed check
    /// reads as "not saved" so one bad lookup does not hide the page.
    pub async fn membership(
        &self,
        user_id: &str,
        movie_ids: &[String],
    ) -> HashMap<String, MovieState> {
        let checks = movie_ids.iter().map(|movie_id| async move {
            let (favorite, watchlist) = futures::join!(
                self.exists(Collection::Favorites, user_id, movie_id),
                self.exists(Collection::Watchlist, user_id, movie_id),
            );
            let state = MovieState {
                favorite: checked(favorite, movie_id),
                watchlist: checked(watchlist, movie_id),
            };
            (movie_id.clone(), state)
        });

        join_all(checks).await.into_iter().collect()
    }
}

fn checked(result: AppResult<bool>, movie_id: &str) -> bool {
    result.unwrap_or_else(|err| {
        warn!(movie_id = %movie_id, error = %err, "membership check failed");
        false
    })
}

#[cfg(test)]
mod tests {
    use sea_orm::{ConnectionTrait, Statement};

    use super::*;
    use crate::{catalog, db};

    async fn store() -> CollectionStore {
        CollectionStore::new(db::connect_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn add_then_list_returns_snapshot() {
        let store = store().await;
        let movie = catalog::movies().remove(1);

        store.add(Collection::Favorites, "u1", &movie).await.unwrap();

        let favorites = store.list(Collection::Favorites, "u1").await.unwrap();
        assert_eq!(favorites, vec![movie.clone()]);

        store.remove(Collection::Favorites, "u1", &movie.id).await.unwrap();
        assert!(store.list(Collection::Favorites, "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_add_is_rejected() {
        let store = store().await;
        let movie = catalog::movies().remove(0);

        store.add(Collection::Watchlist, "u1", &movie).await.unwrap();
        let err = store.add(Collection::Watchlist, "u1", &movie).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(Collection::Watchlist)));

        assert_eq!(store.count(Collection::Watchlist, "u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_duplicate_adds_keep_one_row() {
        let store = store().await;
        let movie = catalog::movies().remove(0);

        let (a, b) = futures::join!(
            store.add(Collection::Favorites, "u1", &movie),
            store.add(Collection::Favorites, "u1", &movie),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(store.count(Collection::Favorites, "u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn removing_missing_movie_is_a_no_op() {
        let store = store().await;
        let movie = catalog::movies().remove(2);
        store.add(Collection::Favorites, "u1", &movie).await.unwrap();

        store.remove(Collection::Favorites, "u1", "does-not-exist").await.unwrap();
        store.remove(Collection::Favorites, "u2", &movie.id).await.unwrap();

        assert_eq!(store.list(Collection::Favorites, "u1").await.unwrap(), vec![movie]);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = store().await;
        let movies = catalog::movies();
        for movie in &movies {
            store.add(Collection::Favorites, "u1", movie).await.unwrap();
        }

        let listed = store.list(Collection::Favorites, "u1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["5", "4", "3", "2", "1"]);
    }

    #[tokio::test]
    async fn collections_and_users_are_separate() {
        let store = store().await;
        let movie = catalog::movies().remove(3);
        store.add(Collection::Favorites, "u1", &movie).await.unwrap();

        assert!(store.exists(Collection::Favorites, "u1", &movie.id).await.unwrap());
        assert!(!store.exists(Collection::Watchlist, "u1", &movie.id).await.unwrap());
        assert!(!store.exists(Collection::Favorites, "u2", &movie.id).await.unwrap());

        // same movie may still go to the other list and to other users
        store.add(Collection::Watchlist, "u1", &movie).await.unwrap();
        store.add(Collection::Favorites, "u2", &movie).await.unwrap();
    }

    #[tokio::test]
    async fn unreadable_snapshots_are_skipped() {
        let store = store().await;
        let movie = catalog::movies().remove(0);
        store.add(Collection::Favorites, "u1", &movie).await.unwrap();
        store
            .db
            .execute(Statement::from_string(
                store.db.get_database_backend(),
                "INSERT INTO favorites (user_id, movie_id, movie_data, created_at) \
                 VALUES ('u1', 'broken', 'not json', 0)"
                    .to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(store.list(Collection::Favorites, "u1").await.unwrap(), vec![movie]);
    }

    #[tokio::test]
    async fn membership_reports_both_lists() {
        let store = store().await;
        let movies = catalog::movies();
        store.add(Collection::Favorites, "u1", &movies[0]).await.unwrap();
        store.add(Collection::Watchlist, "u1", &movies[0]).await.unwrap();
        store.add(Collection::Watchlist, "u1", &movies[1]).await.unwrap();

        let ids: Vec<String> = movies.iter().map(|m| m.id.clone()).collect();
        let states = store.membership("u1", &ids).await;

        assert_eq!(states.len(), 5);
        assert_eq!(states["1"], MovieState { favorite: true, watchlist: true });
        assert_eq!(states["2"], MovieState { favorite: false, watchlist: true });
        assert_eq!(states["3"], MovieState::default());
    }

    #[tokio::test]
    async fn membership_failures_read_as_not_saved() {
        let store = store().await;
        store
            .db
            .execute(Statement::from_string(
                store.db.get_database_backend(),
                "DROP TABLE watchlist".to_string(),
            ))
            .await
            .unwrap();

        let states = store.membership("u1", &["1".to_string()]).await;
        assert_eq!(states["1"], MovieState::default());
    }
}
