use std::{collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{Form, OriginalUri, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::{
    AppState,
    auth::{AdminUser, SESSION_COOKIE},
    catalog,
    error::{ApiResult, AppError, AppResult},
    extract::CurrentUser,
    flash::{self, Flash, FlashKind},
    models::{Collection, Movie, Page, SearchForm, SignInRequest, SignUpRequest, UserProfile},
    search, stats,
    templates::{self, IndexView},
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/auth", get(auth_page))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-out", post(sign_out))
        .route("/me", get(dashboard))
        .route("/collections/{collection}/add", post(add_movie))
        .route("/collections/{collection}/{movie_id}/remove", post(remove_movie))
        .route("/admin", get(admin))
        .route("/admin/users/{id}/confirm", post(confirm_user))
        .route("/api/search", get(api_search))
        .route("/api/me", get(api_me))
        .route("/api/auth/sign-in", post(api_sign_in))
        .route("/api/auth/sign-up", post(api_sign_up))
        .route("/api/auth/sign-out", post(api_sign_out))
        .route("/api/collections/{collection}", get(api_list).post(api_add))
        .route(
            "/api/collections/{collection}/{movie_id}",
            get(api_exists).delete(api_remove),
        )
        .route("/api/admin/stats", get(api_stats))
        .route("/health", get(health))
        .with_state(state)
}

// HTML

async fn run_search(state: &AppState, form: &SearchForm) -> AppResult<Page<Movie>> {
    let filters = form.filters();
    let results = search::search(&state.tmdb, &state.catalog, &filters).await?;
    Ok(search::paginate(&results, form.page(), state.config.page_size))
}

async fn index(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
    OriginalUri(uri): OriginalUri,
    jar: CookieJar,
    Query(form): Query<SearchForm>,
) -> (CookieJar, Html<String>) {
    let (jar, mut notice) = flash::take(jar);
    let user = user.map(|CurrentUser(u)| u);

    let page = match run_search(&state, &form).await {
        Ok(page) => page,
        Err(err) => {
            warn!(error = %err, "search failed");
            notice = Some(Flash { kind: FlashKind::Error, message: err.user_message() });
            Page { items: Vec::new(), page: 1, total_pages: 1, total: 0 }
        },
    };

    let states = match &user {
        Some(user) => {
            let ids: Vec<String> = page.items.iter().map(|m| m.id.clone()).collect();
            state.collections.membership(&user.id, &ids).await
        },
        None => HashMap::new(),
    };

    let trending = catalog::trending();
    let recommended = catalog::recommended();
    let back = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    let html = templates::index_page(&IndexView {
        user: user.as_ref(),
        flash: notice,
        form: &form,
        filtered: !form.filters().is_default(),
        page: &page,
        states: &states,
        trending: &trending,
        recommended: &recommended,
        back,
    });
    (jar, Html(html))
}

async fn auth_page(user: Option<CurrentUser>, jar: CookieJar) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    let (jar, notice) = flash::take(jar);
    (jar, Html(templates::auth_page(notice.as_ref()))).into_response()
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(req): Form<SignInRequest>,
) -> (CookieJar, Redirect) {
    match state.auth.sign_in(req).await {
        Ok(signed_in) => {
            let jar = jar.add(session_cookie(&state, signed_in.token));
            (flash::notice(jar, "Signed in."), Redirect::to("/"))
        },
        Err(err) => (flash_failure(jar, err), Redirect::to("/auth")),
    }
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(req): Form<SignUpRequest>,
) -> (CookieJar, Redirect) {
    match state.auth.sign_up(req).await {
        Ok((_, Some(token))) => {
            let jar = jar.add(session_cookie(&state, token));
            (flash::notice(jar, "Account created. Welcome!"), Redirect::to("/"))
        },
        Ok((_, None)) => (
            flash::notice(jar, "Account created. You can sign in once your email is confirmed."),
            Redirect::to("/auth"),
        ),
        Err(err) => (flash_failure(jar, err), Redirect::to("/auth")),
    }
}

async fn sign_out(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = end_session(&state, jar).await;
    (flash::notice(jar, "Signed out."), Redirect::to("/"))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
    jar: CookieJar,
) -> AppResult<Response> {
    let Some(CurrentUser(user)) = user else {
        return Ok(Redirect::to("/auth").into_response());
    };
    let (jar, notice) = flash::take(jar);

    let favorites = state.collections.list(Collection::Favorites, &user.id).await?;
    let watchlist = state.collections.list(Collection::Watchlist, &user.id).await?;
    let counts = (
        state.collections.count(Collection::Favorites, &user.id).await?,
        state.collections.count(Collection::Watchlist, &user.id).await?,
    );

    let html = templates::dashboard_page(&user, notice.as_ref(), counts, &favorites, &watchlist);
    Ok((jar, Html(html)).into_response())
}

#[derive(Debug, Deserialize)]
struct AddForm {
    movie: String,
    back: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BackForm {
    back: Option<String>,
}

async fn add_movie(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
    jar: CookieJar,
    Path(collection): Path<Collection>,
    Form(form): Form<AddForm>,
) -> (CookieJar, Redirect) {
    let Some(CurrentUser(user)) = user else {
        return (flash_failure(jar, AppError::Unauthorized), Redirect::to("/auth"));
    };
    let back = Redirect::to(safe_back(form.back.as_deref()));

    let result = match serde_json::from_str::<Movie>(&form.movie) {
        Ok(movie) => state.collections.add(collection, &user.id, &movie).await,
        Err(err) => Err(AppError::Invalid(format!("unreadable movie: {err}"))),
    };

    match result {
        Ok(()) => (flash::notice(jar, format!("Added to {}.", collection.label())), back),
        Err(err) => (flash_failure(jar, err), back),
    }
}

async fn remove_movie(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
    jar: CookieJar,
    Path((collection, movie_id)): Path<(Collection, String)>,
    Form(form): Form<BackForm>,
) -> (CookieJar, Redirect) {
    let Some(CurrentUser(user)) = user else {
        return (flash_failure(jar, AppError::Unauthorized), Redirect::to("/auth"));
    };
    let back = Redirect::to(safe_back(form.back.as_deref()));

    match state.collections.remove(collection, &user.id, &movie_id).await {
        Ok(()) => (flash::notice(jar, format!("Removed from {}.", collection.label())), back),
        Err(err) => (flash_failure(jar, err), back),
    }
}

async fn admin(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
    jar: CookieJar,
) -> AppResult<Response> {
    let Some(CurrentUser(user)) = user else {
        return Ok(Redirect::to("/auth").into_response());
    };
    let admin = AdminUser::check(user)?;
    let (jar, notice) = flash::take(jar);

    let dash = stats::dashboard(&state.db, &admin).await?;
    let html = templates::admin_page(admin.user(), notice.as_ref(), &dash);
    Ok((jar, Html(html)).into_response())
}

async fn confirm_user(
    State(state): State<Arc<AppState>>,
    user: Option<CurrentUser>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> AppResult<(CookieJar, Redirect)> {
    let Some(CurrentUser(user)) = user else {
        return Ok((jar, Redirect::to("/auth")));
    };
    let admin = AdminUser::check(user)?;

    let jar = match state.auth.confirm_email(&admin, &id).await {
        Ok(()) => flash::notice(jar, "Email confirmed."),
        Err(err) => flash_failure(jar, err),
    };
    Ok((jar, Redirect::to("/admin")))
}

// JSON

async fn api_search(
    State(state): State<Arc<AppState>>,
    Query(form): Query<SearchForm>,
) -> ApiResult<Json<Page<Movie>>> {
    Ok(Json(run_search(&state, &form).await?))
}

async fn api_me(CurrentUser(user): CurrentUser) -> Json<UserProfile> {
    Json(user.into())
}

async fn api_sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SignInRequest>,
) -> ApiResult<(CookieJar, Json<UserProfile>)> {
    let signed_in = state.auth.sign_in(req).await?;
    let jar = jar.add(session_cookie(&state, signed_in.token));
    Ok((jar, Json(signed_in.user.into())))
}

#[derive(Serialize)]
struct SignUpResponse {
    user: UserProfile,
    signed_in: bool,
}

async fn api_sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SignUpRequest>,
) -> ApiResult<(StatusCode, CookieJar, Json<SignUpResponse>)> {
    let (user, token) = state.auth.sign_up(req).await?;
    let signed_in = token.is_some();
    let jar = match token {
        Some(token) => jar.add(session_cookie(&state, token)),
        None => jar,
    };
    Ok((StatusCode::CREATED, jar, Json(SignUpResponse { user: user.into(), signed_in })))
}

async fn api_sign_out(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, StatusCode) {
    (end_session(&state, jar).await, StatusCode::NO_CONTENT)
}

async fn api_list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(collection): Path<Collection>,
) -> ApiResult<Json<Vec<Movie>>> {
    Ok(Json(state.collections.list(collection, &user.id).await?))
}

async fn api_add(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(collection): Path<Collection>,
    Json(movie): Json<Movie>,
) -> ApiResult<(StatusCode, Json<Movie>)> {
    state.collections.add(collection, &user.id, &movie).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

async fn api_exists(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((collection, movie_id)): Path<(Collection, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let exists = state.collections.exists(collection, &user.id, &movie_id).await?;
    Ok(Json(json!({ "exists": exists })))
}

async fn api_remove(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((collection, movie_id)): Path<(Collection, String)>,
) -> ApiResult<StatusCode> {
    state.collections.remove(collection, &user.id, &movie_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn api_stats(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
) -> ApiResult<Json<stats::AdminDashboard>> {
    Ok(Json(stats::dashboard(&state.db, &admin).await?))
}

async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    state.db.ping().await.map_err(AppError::from)?;
    Ok(Json(json!({ "status": "ok" })))
}

// helpers

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(time::Duration::seconds(state.auth.session_ttl_secs()))
        .build()
}

async fn end_session(state: &AppState, jar: CookieJar) -> CookieJar {
    if let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        if let Err(err) = state.auth.sign_out(&token).await {
            err.log();
        }
    }
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

fn flash_failure(jar: CookieJar, err: AppError) -> CookieJar {
    err.log();
    flash::error(jar, err.user_message())
}

/// Only same-site paths are followed after a form post.
fn safe_back(back: Option<&str>) -> &str {
    match back {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\") => {
            path
        },
        _ => "/",
    }
}
