pub mod favorite;
pub mod session;
pub mod user;
pub mod watchlist;

/// Runs `$body` with `$table` bound to the entity module backing `$collection`.
macro_rules! with_table {
    ($collection:expr, $table:ident => $body:expr) => {
        match $collection {
            crate::models::Collection::Favorites => {
                use crate::entities::favorite as $table;
                $body
            },
            crate::models::Collection::Watchlist => {
                use crate::entities::watchlist as $table;
                $body
            },
        }
    };
}

pub(crate) use with_table;
