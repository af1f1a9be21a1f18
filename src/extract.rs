//! Session-cookie extractors.
//!
//! Plain extractors reject with JSON errors for the `/api` routes; HTML
//! handlers take `Option<CurrentUser>` and redirect on their own.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    auth::{AdminUser, SESSION_COOKIE},
    entities::user,
    error::{ApiError, AppError},
};

#[derive(Clone, Debug)]
pub struct CurrentUser(pub user::Model);

async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<user::Model>, AppError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
        return Ok(None);
    };
    state.auth.current_user(&token).await
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(AppError::Unauthorized.into()),
        }
    }
}

impl OptionalFromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(resolve(parts, state).await?.map(CurrentUser))
    }
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) =
            <CurrentUser as FromRequestParts<Arc<AppState>>>::from_request_parts(parts, state)
                .await?;
        Ok(AdminUser::check(user)?)
    }
}
