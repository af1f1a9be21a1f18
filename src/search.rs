use std::cmp::Ordering;

use tracing::debug;

use crate::{
    error::AppResult,
    models::{Movie, Page, SearchFilters, SortBy},
    tmdb::TmdbClient,
};

/// Filters and sorts the catalog, falling back to a remote title search when
/// nothing local matches a text query. Remote results are returned as-is.
pub async fn search(
    tmdb: &TmdbClient,
    catalog: &[Movie],
    filters: &SearchFilters,
) -> AppResult<Vec<Movie>> {
    let mut results = filter(catalog, filters);
    sort(&mut results, filters.sort_by);

    debug!(matched = results.len(), total = catalog.len(), "filtered catalog");

    if results.is_empty() && !filters.query.is_empty() {
        debug!(query = %filters.query, "no local matches, searching remote");
        results = tmdb.search_movies(&filters.query).await?;
    }

    Ok(results)
}

pub fn filter(catalog: &[Movie], filters: &SearchFilters) -> Vec<Movie> {
    catalog.iter().filter(|m| matches(m, filters)).cloned().collect()
}

pub fn matches(movie: &Movie, filters: &SearchFilters) -> bool {
    matches_query(movie, &filters.query)
        && filters.genre.as_deref().is_none_or(|g| movie.genre.to_lowercase().contains(g))
        && filters.year.as_deref().is_none_or(|y| matches_year(movie, y))
        && (filters.rating.0..=filters.rating.1).contains(&movie.rating)
        && (filters.duration.0..=filters.duration.1).contains(&movie.duration_or_default())
        && matches_exact(movie.country.as_deref(), filters.country.as_deref())
        && matches_exact(movie.language.as_deref(), filters.language.as_deref())
}

fn matches_query(movie: &Movie, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    let contains = |field: &str| field.to_lowercase().contains(&query);
    contains(&movie.title)
        || movie.translated_title.as_deref().is_some_and(contains)
        || contains(&movie.director)
        || contains(&movie.actors)
}

/// `"2020-2022"` matches on the leading `"2020"` only.
fn matches_year(movie: &Movie, year: &str) -> bool {
    let prefix = year.split('-').next().unwrap_or_default();
    movie.year.is_some_and(|y| y.to_string().starts_with(prefix))
}

fn matches_exact(value: Option<&str>, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => value.is_some_and(|v| v.eq_ignore_ascii_case(wanted)),
    }
}

/// Stable sort; popularity keeps the input order.
pub fn sort(movies: &mut [Movie], sort_by: SortBy) {
    match sort_by {
        SortBy::Popularity => {},
        SortBy::Rating => movies.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
        SortBy::Year => movies.sort_by(|a, b| b.year.cmp(&a.year)),
        SortBy::Title => movies.sort_by(|a, b| compare_titles(&a.title, &b.title)),
        SortBy::Duration => {
            movies.sort_by_key(|m| std::cmp::Reverse(m.duration_or_default()))
        },
    }
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(page_size);
    let page = page.clamp(1, total_pages.max(1));
    let start = (page - 1) * page_size;
    let items = items.iter().skip(start).take(page_size).cloned().collect();
    Page { items, page, total_pages, total }
}
