use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

/// Movie snapshot. Stored whole as JSON when saved to a collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_title: Option<String>,
    #[serde(default)]
    pub year: Option<i16>,
    pub director: String,
    pub genre: String,
    pub actors: String,
    pub plot: String,
    pub poster: String,
    pub rating: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Minutes assumed for movies without a known duration.
pub const DEFAULT_DURATION: u32 = 120;

impl Movie {
    pub fn duration_or_default(&self) -> u32 {
        self.duration.unwrap_or(DEFAULT_DURATION)
    }

    pub fn year_label(&self) -> String {
        self.year.map(|y| y.to_string()).unwrap_or_else(|| "N/A".to_string())
    }

    pub fn primary_genre(&self) -> &str {
        self.genre.split(',').next().unwrap_or_default().trim()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Favorites,
    Watchlist,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Favorites, Collection::Watchlist];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Favorites => "favorites",
            Collection::Watchlist => "watchlist",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Collection::Favorites => "Favorites",
            Collection::Watchlist => "Watchlist",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Popularity,
    Rating,
    Year,
    Title,
    Duration,
}

impl SortBy {
    pub const ALL: [SortBy; 5] =
        [SortBy::Popularity, SortBy::Rating, SortBy::Year, SortBy::Title, SortBy::Duration];

    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::Popularity => "popularity",
            SortBy::Rating => "rating",
            SortBy::Year => "year",
            SortBy::Title => "title",
            SortBy::Duration => "duration",
        }
    }
}

impl FromStr for SortBy {
    type Err = std::convert::Infallible;

    /// Unknown keys fall back to popularity, which keeps input order.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "rating" => SortBy::Rating,
            "year" => SortBy::Year,
            "title" => SortBy::Title,
            "duration" => SortBy::Duration,
            _ => SortBy::Popularity,
        })
    }
}

pub const RATING_BOUNDS: (f32, f32) = (0.0, 10.0);
pub const DURATION_BOUNDS: (u32, u32) = (0, 300);

/// Search criteria. `None` on a text field means "all".
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchFilters {
    pub query: String,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub rating: (f32, f32),
    pub duration: (u32, u32),
    pub country: Option<String>,
    pub language: Option<String>,
    pub sort_by: SortBy,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            query: String::new(),
            genre: None,
            year: None,
            rating: RATING_BOUNDS,
            duration: DURATION_BOUNDS,
            country: None,
            language: None,
            sort_by: SortBy::Popularity,
        }
    }
}

impl SearchFilters {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Raw search parameters as they arrive in a query string.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub query: String,
    pub genre: Option<String>,
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub rating_min: Option<f32>,
    #[serde(default, deserialize_with = "lenient")]
    pub rating_max: Option<f32>,
    #[serde(default, deserialize_with = "lenient")]
    pub duration_min: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub duration_max: Option<u32>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub sort_by: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub page: Option<usize>,
}

/// Cleared or malformed number inputs read as unset.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|v| v.trim().parse().ok()))
}

impl SearchForm {
    pub fn filters(&self) -> SearchFilters {
        let finite = |v: Option<f32>| v.filter(|v| v.is_finite());
        let rating = ordered(
            finite(self.rating_min)
                .unwrap_or(RATING_BOUNDS.0)
                .clamp(RATING_BOUNDS.0, RATING_BOUNDS.1),
            finite(self.rating_max)
                .unwrap_or(RATING_BOUNDS.1)
                .clamp(RATING_BOUNDS.0, RATING_BOUNDS.1),
        );
        let duration = ordered(
            self.duration_min
                .unwrap_or(DURATION_BOUNDS.0)
                .clamp(DURATION_BOUNDS.0, DURATION_BOUNDS.1),
            self.duration_max
                .unwrap_or(DURATION_BOUNDS.1)
                .clamp(DURATION_BOUNDS.0, DURATION_BOUNDS.1),
        );

        SearchFilters {
            query: self.query.trim().to_string(),
            genre: choice(self.genre.as_deref()),
            year: choice(self.year.as_deref()),
            rating,
            duration,
            country: choice(self.country.as_deref()),
            language: choice(self.language.as_deref()),
            sort_by: self.sort_by.as_deref().unwrap_or_default().parse().unwrap_or_default(),
        }
    }

    pub fn page(&self) -> usize {
        self.page.unwrap_or(1)
    }
}

fn choice(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    (!value.is_empty() && !value.eq_ignore_ascii_case("all")).then(|| value.to_lowercase())
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a > b { (b, a) } else { (a, b) }
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
}

/// Whether a movie is already saved by the current user.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MovieState {
    pub favorite: bool,
    pub watchlist: bool,
}

impl MovieState {
    pub fn contains(self, collection: Collection) -> bool {
        match collection {
            Collection::Favorites => self.favorite,
            Collection::Watchlist => self.watchlist,
        }
    }
}

/// Public view of an account.
#[derive(Clone, Debug, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub created_at: i64,
    pub email_confirmed_at: Option<i64>,
    pub last_sign_in_at: Option<i64>,
}

impl From<crate::entities::user::Model> for UserProfile {
    fn from(user: crate::entities::user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            is_admin: user.is_admin,
            created_at: user.created_at,
            email_confirmed_at: user.email_confirmed_at,
            last_sign_in_at: user.last_sign_in_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_and_blank_choices_are_inactive() {
        let form = SearchForm {
            genre: Some("all".to_string()),
            year: Some("  ".to_string()),
            country: Some("US".to_string()),
            ..Default::default()
        };
        let filters = form.filters();
        assert_eq!(filters.genre, None);
        assert_eq!(filters.year, None);
        assert_eq!(filters.country.as_deref(), Some("us"));
    }

    #[test]
    fn ranges_are_clamped_and_ordered() {
        let form = SearchForm {
            rating_min: Some(12.0),
            rating_max: Some(-1.0),
            duration_min: Some(400),
            ..Default::default()
        };
        let filters = form.filters();
        assert_eq!(filters.rating, (0.0, 10.0));
        assert_eq!(filters.duration, (300, 300));
    }

    #[test]
    fn unknown_sort_key_means_popularity() {
        let form = SearchForm { sort_by: Some("shuffle".to_string()), ..Default::default() };
        assert_eq!(form.filters().sort_by, SortBy::Popularity);
        let form = SearchForm { sort_by: Some("Rating".to_string()), ..Default::default() };
        assert_eq!(form.filters().sort_by, SortBy::Rating);
    }

    #[test]
    fn cleared_and_garbage_numbers_fall_back_to_bounds() {
        let uri: axum::http::Uri =
            "/?query=&rating_min=&rating_max=NaN&duration_min=abc&duration_max=200&page="
                .parse()
                .unwrap();
        let axum::extract::Query(form) = axum::extract::Query::<SearchForm>::try_from_uri(&uri).unwrap();
        assert_eq!(form.rating_min, None);
        assert_eq!(form.duration_min, None);
        assert_eq!(form.page(), 1);

        let filters = form.filters();
        assert_eq!(filters.rating, RATING_BOUNDS);
        assert_eq!(filters.duration, (0, 200));
    }

    #[test]
    fn empty_form_is_default_filters() {
        assert!(SearchForm::default().filters().is_default());
    }

    #[test]
    fn snapshot_json_uses_camel_case() {
        let movie = Movie {
            id: "1".to_string(),
            title: "Heat".to_string(),
            translated_title: Some("Zhara".to_string()),
            year: Some(1995),
            director: "Michael Mann".to_string(),
            genre: "Crime, Drama".to_string(),
            actors: "Al Pacino".to_string(),
            plot: "A heist.".to_string(),
            poster: String::new(),
            rating: 8.3,
            duration: None,
            country: None,
            language: None,
        };
        let json = serde_json::to_value(&movie).unwrap();
        assert_eq!(json["translatedTitle"], "Zhara");
        assert!(json.get("duration").is_none());
        assert_eq!(movie.primary_genre(), "Crime");
        assert_eq!(movie.duration_or_default(), 120);
    }
}
