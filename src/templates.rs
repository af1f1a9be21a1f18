use std::collections::HashMap;

use maud::{DOCTYPE, Markup, html};

use crate::{
    entities::user,
    flash::{Flash, FlashKind},
    models::{Collection, Movie, MovieState, Page, SearchForm, SortBy, UserProfile},
    stats::{AdminDashboard, UserActivity},
};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

const GENRES: [(&str, &str); 9] = [
    ("all", "All genres"),
    ("action", "Action"),
    ("comedy", "Comedy"),
    ("drama", "Drama"),
    ("horror", "Horror"),
    ("romance", "Romance"),
    ("sci-fi", "Sci-Fi"),
    ("thriller", "Thriller"),
    ("animation", "Animation"),
];

const YEARS: [(&str, &str); 8] = [
    ("all", "All years"),
    ("2024", "2024"),
    ("2023", "2023"),
    ("2020-2022", "2020-2022"),
    ("2010-2019", "2010-2019"),
    ("2000-2009", "2000-2009"),
    ("1990-1999", "1990-1999"),
    ("1980-1989", "1980-1989"),
];

const COUNTRIES: [(&str, &str); 9] = [
    ("all", "All countries"),
    ("us", "United States"),
    ("uk", "United Kingdom"),
    ("fr", "France"),
    ("de", "Germany"),
    ("jp", "Japan"),
    ("kr", "South Korea"),
    ("in", "India"),
    ("ru", "Russia"),
];

const LANGUAGES: [(&str, &str); 9] = [
    ("all", "All languages"),
    ("en", "English"),
    ("uz", "Uzbek"),
    ("ru", "Russian"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
];

/// Everything the search page shows.
pub struct IndexView<'a> {
    pub user: Option<&'a user::Model>,
    pub flash: Option<Flash>,
    pub form: &'a SearchForm,
    pub filtered: bool,
    pub page: &'a Page<Movie>,
    pub states: &'a HashMap<String, MovieState>,
    pub trending: &'a [Movie],
    pub recommended: &'a [Movie],
    /// Path and query of the current page, used as the return target of forms.
    pub back: &'a str,
}

pub fn index_page(view: &IndexView<'_>) -> String {
    let signed_in = view.user.is_some();

    page(
        "Movie search",
        view.user,
        view.flash.as_ref(),
        html! {
            @if !view.trending.is_empty() {
                (strip("Trending now", view.trending))
            }
            @if signed_in && !view.recommended.is_empty() {
                (strip("Recommended for you", view.recommended))
            }

            (search_form(view.form))

            div class="mt-8 flex items-center justify-between" {
                p class="text-slate-300" {
                    (view.page.total) " movies found"
                    @if view.filtered { " (filtered)" }
                }
            }

            @if view.page.items.is_empty() {
                div class="mt-10 text-center" {
                    p class="text-xl text-slate-300" { "No movies found" }
                    p class="mt-2 text-slate-400" { "Try other keywords or loosen the filters." }
                }
            } @else {
                div class="mt-6 grid gap-6 sm:grid-cols-2 lg:grid-cols-3 xl:grid-cols-4" {
                    @for movie in &view.page.items {
                        (movie_card(
                            movie,
                            view.states.get(&movie.id).copied().unwrap_or_default(),
                            signed_in,
                            view.back,
                        ))
                    }
                }
                (pagination(view.form, view.page))
            }
        },
    )
}

pub fn auth_page(flash: Option<&Flash>) -> String {
    page(
        "Sign in",
        None,
        flash,
        html! {
            div class="mx-auto mt-6 grid max-w-3xl gap-6 md:grid-cols-2" {
                form class="space-y-4 rounded-lg bg-slate-800 p-6" method="post" action="/auth/sign-in" {
                    h2 class="text-xl font-semibold" { "Sign in" }
                    (text_input("email", "Email", "email"))
                    (text_input("password", "Password", "password"))
                    button class=(BUTTON) type="submit" { "Sign in" }
                }
                form class="space-y-4 rounded-lg bg-slate-800 p-6" method="post" action="/auth/sign-up" {
                    h2 class="text-xl font-semibold" { "Create account" }
                    (text_input("display_name", "Name", "text"))
                    (text_input("email", "Email", "email"))
                    (text_input("password", "Password", "password"))
                    button class=(BUTTON) type="submit" { "Sign up" }
                }
            }
        },
    )
}

pub fn dashboard_page(
    user: &user::Model,
    flash: Option<&Flash>,
    (favorite_count, watchlist_count): (u64, u64),
    favorites: &[Movie],
    watchlist: &[Movie],
) -> String {
    page(
        "My movies",
        Some(user),
        flash,
        html! {
            h1 class="text-3xl font-bold" { "Hello, " (user.display_name) }
            p class="mt-1 text-slate-400" { (user.email) }

            div class="mt-6 grid gap-4 sm:grid-cols-2" {
                (stat_tile("Favorites", favorite_count))
                (stat_tile("Watchlist", watchlist_count))
            }

            @for (collection, movies) in [(Collection::Favorites, favorites), (Collection::Watchlist, watchlist)] {
                section class="mt-10" {
                    h2 class="text-2xl font-semibold" { (collection.label()) }
                    @if movies.is_empty() {
                        p class="mt-3 text-slate-400" { "Nothing saved yet." }
                    } @else {
                        div class="mt-4 space-y-3" {
                            @for movie in movies {
                                (saved_row(collection, movie))
                            }
                        }
                    }
                }
            }
        },
    )
}

pub fn admin_page(admin: &user::Model, flash: Option<&Flash>, dash: &AdminDashboard) -> String {
    let o = &dash.overview;
    page(
        "Admin",
        Some(admin),
        flash,
        html! {
            h1 class="text-3xl font-bold" { "Admin" }

            div class="mt-6 grid gap-4 sm:grid-cols-3" {
                (stat_tile("Users", o.total_users))
                (stat_tile("Confirmed users", o.confirmed_users))
                (stat_tile("New users (7 days)", o.recent_users))
                (stat_tile("Favorites", o.total_favorites))
                (stat_tile("Watchlist", o.total_watchlist))
                (stat_tile("Saves (7 days)", o.recent_activity))
            }

            section class="mt-10" {
                h2 class="text-2xl font-semibold" { "Users" }
                table class="mt-4 w-full text-left text-sm" {
                    thead class="text-slate-400" {
                        tr {
                            th class="py-2" { "Email" }
                            th { "Name" }
                            th { "Joined" }
                            th { "Confirmed" }
                            th { "Last sign-in" }
                            th {}
                        }
                    }
                    tbody {
                        @for u in &dash.users {
                            (user_row(u))
                        }
                    }
                }
            }

            (activity_table("Favorites activity", &dash.favorites))
            (activity_table("Watchlist activity", &dash.watchlist))
        },
    )
}

pub fn error_page(message: String) -> String {
    page(
        "Error",
        None,
        None,
        html! {
            div class="mx-auto mt-12 max-w-xl rounded-lg bg-slate-800 p-8" {
                h1 class="text-2xl font-bold" { "Error" }
                p class="mt-4 text-slate-300" { (message) }
                a class="mt-6 inline-block text-blue-400 hover:text-blue-300" href="/" { "Back" }
            }
        },
    )
}

const BUTTON: &str = "w-full rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700";
const INPUT: &str = "mt-1 w-full rounded-md border border-slate-600 bg-slate-700 px-3 py-2";

fn page(title: &str, user: Option<&user::Model>, flash: Option<&Flash>, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                script src=(TAILWIND_CDN) {}
            }
            body class="min-h-screen bg-slate-900 text-white" {
                (nav(user))
                main class="mx-auto max-w-6xl px-6 py-8" {
                    @if let Some(flash) = flash {
                        (flash_banner(flash))
                    }
                    (body)
                }
            }
        }
    }
    .into_string()
}

fn nav(user: Option<&user::Model>) -> Markup {
    html! {
        nav class="border-b border-slate-700 bg-slate-800" {
            div class="mx-auto flex max-w-6xl items-center justify-between px-6 py-4" {
                a class="text-xl font-bold" href="/" { "cinelist" }
                div class="flex items-center gap-4 text-sm" {
                    @if let Some(user) = user {
                        a class="hover:text-blue-300" href="/me" { "My movies" }
                        @if user.is_admin {
                            a class="hover:text-blue-300" href="/admin" { "Admin" }
                        }
                        form method="post" action="/auth/sign-out" {
                            button class="text-slate-400 hover:text-white" type="submit" { "Sign out" }
                        }
                    } @else {
                        a class="hover:text-blue-300" href="/auth" { "Sign in" }
                    }
                }
            }
        }
    }
}

fn flash_banner(flash: &Flash) -> Markup {
    let class = match flash.kind {
        FlashKind::Notice => "mb-6 rounded-lg border border-green-600 bg-green-900/30 p-4 text-green-200",
        FlashKind::Error => "mb-6 rounded-lg border border-red-600 bg-red-900/30 p-4 text-red-200",
    };
    html! { div class=(class) role="status" { (flash.message) } }
}

fn strip(title: &str, movies: &[Movie]) -> Markup {
    html! {
        section class="mb-8" {
            h2 class="mb-3 text-lg font-semibold" { (title) }
            div class="flex gap-4 overflow-x-auto" {
                @for movie in movies {
                    div class="min-w-[200px] overflow-hidden rounded-lg bg-slate-800" {
                        img class="h-48 w-full object-cover" src=(movie.poster) alt=(movie.title);
                        div class="p-3" {
                            h3 class="text-sm font-semibold" { (movie.title) }
                            p class="text-xs text-slate-400" {
                                (movie.year_label()) " · " (movie.primary_genre()) " · ★ " (movie.rating)
                            }
                        }
                    }
                }
            }
        }
    }
}

fn search_form(form: &SearchForm) -> Markup {
    let filters = form.filters();
    let current = |value: Option<&String>| value.cloned().unwrap_or_else(|| "all".to_string());

    html! {
        form class="grid gap-4 rounded-lg bg-slate-800 p-6 md:grid-cols-4" method="get" action="/" {
            div class="md:col-span-4" {
                input class=(INPUT) type="search" name="query" value=(filters.query)
                    placeholder="Title, director or actor";
            }
            (select("genre", "Genre", &GENRES, &current(filters.genre.as_ref())))
            (select("year", "Year", &YEARS, &current(filters.year.as_ref())))
            (select("country", "Country", &COUNTRIES, &current(filters.country.as_ref())))
            (select("language", "Language", &LANGUAGES, &current(filters.language.as_ref())))
            div {
                label class="block text-sm text-slate-300" { "Rating" }
                div class="flex gap-2" {
                    input class=(INPUT) type="number" step="0.1" min="0" max="10" name="rating_min" value=(filters.rating.0);
                    input class=(INPUT) type="number" step="0.1" min="0" max="10" name="rating_max" value=(filters.rating.1);
                }
            }
            div {
                label class="block text-sm text-slate-300" { "Duration (min)" }
                div class="flex gap-2" {
                    input class=(INPUT) type="number" min="0" max="300" name="duration_min" value=(filters.duration.0);
                    input class=(INPUT) type="number" min="0" max="300" name="duration_max" value=(filters.duration.1);
                }
            }
            div {
                label class="block text-sm text-slate-300" for="sort_by" { "Sort by" }
                select class=(INPUT) name="sort_by" id="sort_by" {
                    @for sort in SortBy::ALL {
                        option value=(sort.as_str()) selected[sort == filters.sort_by] { (sort.as_str()) }
                    }
                }
            }
            div class="flex items-end gap-2" {
                button class=(BUTTON) type="submit" { "Search" }
                a class="rounded-md border border-slate-600 px-4 py-2 text-slate-300" href="/" { "Clear" }
            }
        }
    }
}

fn select(name: &str, label: &str, options: &[(&str, &str)], current: &str) -> Markup {
    html! {
        div {
            label class="block text-sm text-slate-300" for=(name) { (label) }
            select class=(INPUT) name=(name) id=(name) {
                @for (value, text) in options {
                    option value=(value) selected[*value == current] { (text) }
                }
            }
        }
    }
}

fn text_input(name: &str, label: &str, kind: &str) -> Markup {
    html! {
        div {
            label class="block text-sm text-slate-300" for=(name) { (label) }
            input class=(INPUT) type=(kind) name=(name) id=(name) required[kind != "text"];
        }
    }
}

fn movie_card(movie: &Movie, state: MovieState, signed_in: bool, back: &str) -> Markup {
    html! {
        div class="flex flex-col overflow-hidden rounded-lg bg-slate-800" {
            img class="h-72 w-full object-cover" src=(movie.poster) alt=(movie.title);
            div class="flex flex-1 flex-col p-4" {
                h3 class="text-lg font-semibold" { (movie.title) }
                @if let Some(translated) = &movie.translated_title {
                    @if *translated != movie.title {
                        p class="text-sm text-slate-400" { (translated) }
                    }
                }
                p class="mt-1 text-sm text-slate-400" {
                    (movie.year_label()) " · " (movie.genre)
                    @if let Some(duration) = movie.duration { " · " (duration) " min" }
                }
                p class="mt-1 text-sm" { "★ " (movie.rating) " · " (movie.director) }
                p class="mt-2 flex-1 text-sm text-slate-300" { (movie.plot) }
                @if signed_in {
                    div class="mt-4 grid grid-cols-2 gap-2" {
                        @for collection in Collection::ALL {
                            (collection_button(collection, movie, state.contains(collection), back))
                        }
                    }
                } @else {
                    a class="mt-4 text-sm text-blue-400 hover:text-blue-300" href="/auth" { "Sign in to save" }
                }
            }
        }
    }
}

fn collection_button(collection: Collection, movie: &Movie, saved: bool, back: &str) -> Markup {
    let label = match (collection, saved) {
        (Collection::Favorites, false) => "♡ Favorite",
        (Collection::Favorites, true) => "♥ Favorited",
        (Collection::Watchlist, false) => "+ Watchlist",
        (Collection::Watchlist, true) => "✓ Watchlist",
    };
    let class = if saved {
        "w-full rounded-md bg-blue-600 px-2 py-1 text-sm"
    } else {
        "w-full rounded-md border border-slate-600 px-2 py-1 text-sm"
    };

    html! {
        @if saved {
            form method="post" action=(remove_action(collection, &movie.id)) {
                input type="hidden" name="back" value=(back);
                button class=(class) type="submit" { (label) }
            }
        } @else {
            form method="post" action=(format!("/collections/{collection}/add")) {
                input type="hidden" name="movie" value=(serde_json::to_string(movie).unwrap_or_default());
                input type="hidden" name="back" value=(back);
                button class=(class) type="submit" { (label) }
            }
        }
    }
}

fn remove_action(collection: Collection, movie_id: &str) -> String {
    format!("/collections/{collection}/{}/remove", urlencoding::encode(movie_id))
}

fn saved_row(collection: Collection, movie: &Movie) -> Markup {
    html! {
        div class="flex overflow-hidden rounded-lg bg-slate-800" {
            img class="h-28 w-20 object-cover" src=(movie.poster) alt=(movie.title);
            div class="flex flex-1 items-start justify-between gap-4 p-4" {
                div {
                    h3 class="font-semibold" { (movie.title) }
                    p class="text-sm text-slate-400" {
                        (movie.year_label()) " · " (movie.primary_genre()) " · ★ " (movie.rating)
                    }
                }
                form method="post" action=(remove_action(collection, &movie.id)) {
                    input type="hidden" name="back" value="/me";
                    button class="text-sm text-red-400 hover:text-red-300" type="submit" { "Remove" }
                }
            }
        }
    }
}

fn pagination(form: &SearchForm, page: &Page<Movie>) -> Markup {
    if page.total_pages <= 1 {
        return html! {};
    }
    html! {
        div class="mt-8 flex justify-center gap-2" {
            @if page.page > 1 {
                a class="rounded-md border border-slate-600 px-3 py-1" href=(page_link(form, page.page - 1)) { "Previous" }
            }
            @for n in 1..=page.total_pages {
                @if n == page.page {
                    span class="rounded-md bg-blue-600 px-3 py-1" { (n) }
                } @else {
                    a class="rounded-md border border-slate-600 px-3 py-1" href=(page_link(form, n)) { (n) }
                }
            }
            @if page.page < page.total_pages {
                a class="rounded-md border border-slate-600 px-3 py-1" href=(page_link(form, page.page + 1)) { "Next" }
            }
        }
    }
}

/// Link to another page of the same search.
pub fn page_link(form: &SearchForm, page: usize) -> String {
    let filters = form.filters();
    let mut params: Vec<(&str, String)> = Vec::new();
    if !filters.query.is_empty() {
        params.push(("query", filters.query.clone()));
    }
    for (key, value) in [
        ("genre", &filters.genre),
        ("year", &filters.year),
        ("country", &filters.country),
        ("language", &filters.language),
    ] {
        if let Some(value) = value {
            params.push((key, value.clone()));
        }
    }
    if !filters.is_default() {
        params.push(("rating_min", filters.rating.0.to_string()));
        params.push(("rating_max", filters.rating.1.to_string()));
        params.push(("duration_min", filters.duration.0.to_string()));
        params.push(("duration_max", filters.duration.1.to_string()));
        params.push(("sort_by", filters.sort_by.as_str().to_string()));
    }
    params.push(("page", page.to_string()));

    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("/?{query}")
}

fn stat_tile(label: &str, value: u64) -> Markup {
    html! {
        div class="rounded-lg bg-slate-800 p-4" {
            p class="text-sm text-slate-400" { (label) }
            p class="text-2xl font-bold" { (value) }
        }
    }
}

fn user_row(u: &UserProfile) -> Markup {
    html! {
        tr class="border-t border-slate-700" {
            td class="py-2" {
                (u.email)
                @if u.is_admin { span class="ml-2 rounded bg-blue-700 px-1 text-xs" { "admin" } }
            }
            td { (u.display_name) }
            td { (format_time(Some(u.created_at))) }
            td { (format_time(u.email_confirmed_at)) }
            td { (format_time(u.last_sign_in_at)) }
            td {
                @if u.email_confirmed_at.is_none() {
                    form method="post" action=(format!("/admin/users/{}/confirm", urlencoding::encode(&u.id))) {
                        button class="text-sm text-blue-400 hover:text-blue-300" type="submit" { "Confirm" }
                    }
                }
            }
        }
    }
}

fn activity_table(title: &str, rows: &[UserActivity]) -> Markup {
    html! {
        section class="mt-10" {
            h2 class="text-2xl font-semibold" { (title) }
            @if rows.is_empty() {
                p class="mt-3 text-slate-400" { "No activity yet." }
            } @else {
                table class="mt-4 w-full text-left text-sm" {
                    thead class="text-slate-400" {
                        tr { th class="py-2" { "User" } th { "Movies" } th { "Latest" } }
                    }
                    tbody {
                        @for row in rows {
                            tr class="border-t border-slate-700" {
                                td class="py-2" {
                                    @if let Some(email) = &row.email { (email) } @else { (short_id(&row.user_id)) }
                                }
                                td { (row.movie_count) }
                                td { (format_time(Some(row.latest_activity))) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn short_id(id: &str) -> String {
    match id.char_indices().nth(8) {
        Some((idx, _)) => format!("{}...", &id[..idx]),
        None => id.to_string(),
    }
}

fn format_time(secs: Option<i64>) -> String {
    let Some(secs) = secs else {
        return "Never".to_string();
    };
    jiff::Timestamp::from_second(secs)
        .map(|ts| ts.strftime("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| "-".to_string())
}
