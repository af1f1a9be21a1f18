use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::Serialize;

use crate::{
    auth::AdminUser,
    db::now_sec,
    entities::{user, with_table},
    error::AppResult,
    models::{Collection, UserProfile},
};

const RECENT_SECS: i64 = 7 * 86_400;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub total_users: u64,
    pub confirmed_users: u64,
    /// Accounts created within the last week.
    pub recent_users: u64,
    pub total_favorites: u64,
    pub total_watchlist: u64,
    /// Entries saved to either list within the last week.
    pub recent_activity: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserActivity {
    pub user_id: String,
    pub email: Option<String>,
    pub movie_count: u64,
    pub latest_activity: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct AdminDashboard {
    pub overview: Overview,
    pub favorites: Vec<UserActivity>,
    pub watchlist: Vec<UserActivity>,
    pub users: Vec<UserProfile>,
}

#[derive(Debug, FromQueryResult)]
struct ActivityRow {
    user_id: String,
    movie_count: i64,
    latest_activity: i64,
}

pub async fn dashboard(db: &DatabaseConnection, admin: &AdminUser) -> AppResult<AdminDashboard> {
    let users = users(db, admin).await?;
    let emails: HashMap<&str, &str> =
        users.iter().map(|u| (u.id.as_str(), u.email.as_str())).collect();

    let mut favorites = activity(db, admin, Collection::Favorites).await?;
    let mut watchlist = activity(db, admin, Collection::Watchlist).await?;
    for entry in favorites.iter_mut().chain(watchlist.iter_mut()) {
        entry.email = emails.get(entry.user_id.as_str()).map(|e| e.to_string());
    }

    Ok(AdminDashboard { overview: overview(db, admin).await?, favorites, watchlist, users })
}

pub async fn overview(db: &DatabaseConnection, _admin: &AdminUser) -> AppResult<Overview> {
    overview_at(db, now_sec()).await
}

/// "Recent" means `created_at >= now - 7 days` for accounts and entries alike.
async fn overview_at(db: &DatabaseConnection, now: i64) -> AppResult<Overview> {
    let week_ago = now - RECENT_SECS;

    let total_users = user::Entity::find().count(db).await?;
    let confirmed_users = user::Entity::find()
        .filter(user::Column::EmailConfirmedAt.is_not_null())
        .count(db)
        .await?;
    let recent_users =
        user::Entity::find().filter(user::Column::CreatedAt.gte(week_ago)).count(db).await?;

    let mut totals = HashMap::new();
    let mut recent_activity = 0;
    for collection in Collection::ALL {
        let (total, recent) = with_table!(collection, table => {
            let total = table::Entity::find().count(db).await?;
            let recent = table::Entity::find()
                .filter(table::Column::CreatedAt.gte(week_ago))
                .count(db)
                .await?;
            (total, recent)
        });
        totals.insert(collection, total);
        recent_activity += recent;
    }

    Ok(Overview {
        total_users,
        confirmed_users,
        recent_users,
        total_favorites: totals.get(&Collection::Favorites).copied().unwrap_or_default(),
        total_watchlist: totals.get(&Collection::Watchlist).copied().unwrap_or_default(),
        recent_activity,
    })
}

/// Per-user entry counts and latest save time, busiest users first.
pub async fn activity(
    db: &DatabaseConnection,
    _admin: &AdminUser,
    collection: Collection,
) -> AppResult<Vec<UserActivity>> {
    let rows: Vec<ActivityRow> = with_table!(collection, table => {
        table::Entity::find()
            .select_only()
            .column(table::Column::UserId)
            .column_as(table::Column::Id.count(), "movie_count")
            .column_as(table::Column::CreatedAt.max(), "latest_activity")
            .group_by(table::Column::UserId)
            .into_model::<ActivityRow>()
            .all(db)
            .await?
    });

    let mut out: Vec<UserActivity> = rows
        .into_iter()
        .map(|row| UserActivity {
            user_id: row.user_id,
            email: None,
            movie_count: row.movie_count.max(0) as u64,
            latest_activity: row.latest_activity,
        })
        .collect();
    out.sort_by(|a, b| b.movie_count.cmp(&a.movie_count).then_with(|| a.user_id.cmp(&b.user_id)));
    Ok(out)
}

/// Newest accounts first.
pub async fn users(db: &DatabaseConnection, _admin: &AdminUser) -> AppResult<Vec<UserProfile>> {
    let users =
        user::Entity::find().order_by_desc(user::Column::CreatedAt).all(db).await?;
    Ok(users.into_iter().map(UserProfile::from).collect())
}
