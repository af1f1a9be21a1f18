//! Accounts, password checks and cookie sessions.
//!
//! Admin rights live in `users.is_admin`, synced from `ADMIN_EMAILS`; routes
//! that need them take an [`AdminUser`], which can only be built from a user
//! row carrying the flag.

use std::{num::NonZeroU32, sync::Arc};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
    sea_query::Expr,
};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::{
    config::Config,
    db::now_sec,
    entities::{session, user},
    error::{AppError, AppResult, AuthError},
    models::{SignInRequest, SignUpRequest},
};

pub const SESSION_COOKIE: &str = "session";

const SIGN_IN_ATTEMPTS_PER_MINUTE: u32 = 5;

/// Tracked sign-in emails past which idle limiter entries are dropped inline.
const SIGN_IN_KEYS_PRUNE_AT: usize = 10_000;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
    config: Arc<Config>,
    sign_in_limiter: Arc<KeyedLimiter>,
    /// Hash checked against when the email is unknown, so both paths cost one verify.
    dummy_hash: Arc<OnceCell<String>>,
}

/// A signed-in user together with the session token to hand back.
#[derive(Debug)]
pub struct SignedIn {
    pub user: user::Model,
    pub token: String,
}

impl AuthService {
    pub fn new(db: DatabaseConnection, config: Arc<Config>) -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(SIGN_IN_ATTEMPTS_PER_MINUTE).unwrap_or(NonZeroU32::MIN),
        );
        Self::with_sign_in_quota(db, config, quota)
    }

    fn with_sign_in_quota(db: DatabaseConnection, config: Arc<Config>, quota: Quota) -> Self {
        Self {
            db,
            config,
            sign_in_limiter: Arc::new(RateLimiter::keyed(quota)),
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    #[cfg(test)]
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Applies `ADMIN_EMAILS` to existing accounts, granting and revoking.
    pub async fn sync_admins(&self) -> AppResult<()> {
        let admins = &self.config.admin_emails;

        let granted = user::Entity::update_many()
            .col_expr(user::Column::IsAdmin, Expr::value(true))
            .filter(user::Column::Email.is_in(admins.iter().cloned()))
            .exec(&self.db)
            .await?
            .rows_affected;

        let revoked = user::Entity::update_many()
            .col_expr(user::Column::IsAdmin, Expr::value(false))
            .filter(user::Column::Email.is_not_in(admins.iter().cloned()))
            .filter(user::Column::IsAdmin.eq(true))
            .exec(&self.db)
            .await?
            .rows_affected;

        info!(granted, revoked, "admin accounts synced");
        Ok(())
    }

    /// Creates an account. Returns a session only when the email counts as
    /// confirmed right away.
    pub async fn sign_up(&self, req: SignUpRequest) -> AppResult<(user::Model, Option<String>)> {
        let email = normalize_email(&req.email)?;
        validate_password(&req.password, self.config.min_password_length)?;

        let display_name = match req.display_name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.to_string(),
        };

        let password_hash = hash_password(req.password).await?;
        let now = now_sec();

        let model = user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            email: Set(email.clone()),
            display_name: Set(display_name),
            password_hash: Set(password_hash),
            is_admin: Set(self.config.is_admin_email(&email)),
            created_at: Set(now),
            email_confirmed_at: Set(self.config.auto_confirm_email.then_some(now)),
            last_sign_in_at: Set(None),
        };

        let user = match model.insert(&self.db).await {
            Ok(user) => user,
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(AuthError::AlreadyRegistered.into());
            },
            Err(err) => return Err(err.into()),
        };

        info!(user_id = %user.id, admin = user.is_admin, "user signed up");

        if user.email_confirmed_at.is_none() {
            return Ok((user, None));
        }

        let signed_in = self.start_session(user).await?;
        Ok((signed_in.user, Some(signed_in.token)))
    }

    pub async fn sign_in(&self, req: SignInRequest) -> AppResult<SignedIn> {
        let email = req.email.trim().to_lowercase();

        if self.sign_in_limiter.len() >= SIGN_IN_KEYS_PRUNE_AT {
            self.prune_sign_in_attempts();
        }
        if self.sign_in_limiter.check_key(&email).is_err() {
            debug!(email = %email, "sign-in rate limited");
            return Err(AuthError::TooManyRequests.into());
        }

        let Some(user) =
            user::Entity::find().filter(user::Column::Email.eq(email)).one(&self.db).await?
        else {
            let dummy = self
                .dummy_hash
                .get_or_try_init(|| hash_password("not-a-real-password".to_string()))
                .await?;
            verify_password(req.password, dummy.clone()).await?;
            return Err(AuthError::InvalidCredentials.into());
        };

        if !verify_password(req.password, user.password_hash.clone()).await? {
            debug!(user_id = %user.id, "wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        if user.email_confirmed_at.is_none() {
            return Err(AuthError::EmailNotConfirmed.into());
        }

        self.start_session(user).await
    }

    /// Idempotent.
    pub async fn sign_out(&self, token: &str) -> AppResult<()> {
        session::Entity::delete_by_id(token.to_string()).exec(&self.db).await?;
        Ok(())
    }

    /// Resolves a session token; expired sessions are removed.
    pub async fn current_user(&self, token: &str) -> AppResult<Option<user::Model>> {
        let Some(session) = session::Entity::find_by_id(token.to_string()).one(&self.db).await?
        else {
            return Ok(None);
        };

        if session.expires_at <= now_sec() {
            debug!(user_id = %session.user_id, "session expired");
            self.sign_out(token).await?;
            return Ok(None);
        }

        Ok(user::Entity::find_by_id(session.user_id).one(&self.db).await?)
    }

    pub async fn confirm_email(&self, _admin: &AdminUser, user_id: &str) -> AppResult<()> {
        let Some(user) = user::Entity::find_by_id(user_id.to_string()).one(&self.db).await? else {
            return Err(AppError::NotFound);
        };
        if user.email_confirmed_at.is_some() {
            return Ok(());
        }

        let mut active: user::ActiveModel = user.into();
        active.email_confirmed_at = Set(Some(now_sec()));
        active.update(&self.db).await?;
        info!(user_id = %user_id, "email confirmed by admin");
        Ok(())
    }

    /// Forgets limiter state for emails whose quota has fully refilled.
    pub fn prune_sign_in_attempts(&self) {
        let before = self.sign_in_limiter.len();
        self.sign_in_limiter.retain_recent();
        self.sign_in_limiter.shrink_to_fit();
        debug!(before, after = self.sign_in_limiter.len(), "sign-in limiter pruned");
    }

    /// Deletes sessions past their expiry, including ones never presented again.
    pub async fn purge_expired_sessions(&self) -> AppResult<u64> {
        let purged = session::Entity::delete_many()
            .filter(session::Column::ExpiresAt.lte(now_sec()))
            .exec(&self.db)
            .await?
            .rows_affected;
        if purged > 0 {
            info!(purged, "expired sessions removed");
        }
        Ok(purged)
    }

    pub fn session_ttl_secs(&self) -> i64 {
        self.config.session_ttl_days * 86_400
    }

    async fn start_session(&self, user: user::Model) -> AppResult<SignedIn> {
        let now = now_sec();
        let token = new_token();

        session::ActiveModel {
            token: Set(token.clone()),
            user_id: Set(user.id.clone()),
            created_at: Set(now),
            expires_at: Set(now + self.session_ttl_secs()),
        }
        .insert(&self.db)
        .await?;

        let mut active: user::ActiveModel = user.into();
        active.last_sign_in_at = Set(Some(now));
        let user = active.update(&self.db).await?;

        info!(user_id = %user.id, "session started");
        Ok(SignedIn { user, token })
    }
}

/// Capability for the admin-only operations.
#[derive(Clone, Debug)]
pub struct AdminUser {
    user: user::Model,
}

impl AdminUser {
    pub fn check(user: user::Model) -> AppResult<Self> {
        if user.is_admin { Ok(Self { user }) } else { Err(AppError::Forbidden) }
    }

    pub fn user(&self) -> &user::Model {
        &self.user
    }
}

fn new_token() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        },
        None => false,
    };
    if valid { Ok(email) } else { Err(AuthError::InvalidEmail.into()) }
}

fn validate_password(password: &str, min_length: usize) -> AppResult<()> {
    if password.chars().count() < min_length {
        return Err(AuthError::WeakPassword(min_length).into());
    }
    Ok(())
}

async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(anyhow::Error::new)?
    .map_err(Into::into)
}

async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash)?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    })
    .await
    .map_err(anyhow::Error::new)?
    .map_err(Into::into)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db;

    pub(crate) async fn service_with(config: Config) -> AuthService {
        AuthService::new(db::connect_in_memory().await.unwrap(), Arc::new(config))
    }

    pub(crate) async fn service() -> AuthService {
        service_with(Config::for_tests()).await
    }

    pub(crate) fn sign_up_req(email: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.to_string(),
            password: "secret-pass".to_string(),
            display_name: String::new(),
        }
    }

    fn sign_in_req(email: &str, password: &str) -> SignInRequest {
        SignInRequest { email: email.to_string(), password: password.to_string() }
    }

    #[tokio::test]
    async fn sign_up_creates_session() {
        let auth = service().await;
        let (user, token) = auth.sign_up(sign_up_req(" Viewer@Example.com ")).await.unwrap();

        assert_eq!(user.email, "viewer@example.com");
        assert_eq!(user.display_name, "viewer");
        assert!(!user.is_admin);
        assert!(user.password_hash.starts_with("$argon2id$"));

        let token = token.expect("confirmed accounts get a session");
        let current = auth.current_user(&token).await.unwrap().unwrap();
        assert_eq!(current.id, user.id);
        assert!(current.last_sign_in_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let auth = service().await;
        auth.sign_up(sign_up_req("a@example.com")).await.unwrap();
        let err = auth.sign_up(sign_up_req("A@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::AlreadyRegistered)));
    }

    #[tokio::test]
    async fn sign_up_validates_input() {
        let auth = service().await;

        let err = auth.sign_up(sign_up_req("not-an-email")).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidEmail)));

        let req = SignUpRequest { password: "12345".to_string(), ..sign_up_req("b@example.com") };
        let err = auth.sign_up(req).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::WeakPassword(6))));
    }

    #[tokio::test]
    async fn sign_in_checks_password() {
        let auth = service().await;
        auth.sign_up(sign_up_req("c@example.com")).await.unwrap();

        let err = auth.sign_in(sign_in_req("c@example.com", "wrong-pass")).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));

        let err = auth.sign_in(sign_in_req("nobody@example.com", "secret-pass")).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));

        let signed_in = auth.sign_in(sign_in_req("C@example.com", "secret-pass")).await.unwrap();
        assert_eq!(signed_in.user.email, "c@example.com");
    }

    #[tokio::test]
    async fn sign_out_ends_session() {
        let auth = service().await;
        let (_, token) = auth.sign_up(sign_up_req("d@example.com")).await.unwrap();
        let token = token.unwrap();

        auth.sign_out(&token).await.unwrap();
        assert!(auth.current_user(&token).await.unwrap().is_none());
        auth.sign_out(&token).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_token_is_anonymous() {
        let auth = service().await;
        assert!(auth.current_user("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_dropped() {
        let auth = service().await;
        let (_, token) = auth.sign_up(sign_up_req("e@example.com")).await.unwrap();
        let token = token.unwrap();

        session::Entity::update_many()
            .col_expr(session::Column::ExpiresAt, Expr::value(now_sec() - 1))
            .exec(&auth.db)
            .await
            .unwrap();

        assert!(auth.current_user(&token).await.unwrap().is_none());
        assert!(session::Entity::find_by_id(token).one(&auth.db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unconfirmed_accounts_cannot_sign_in_until_confirmed() {
        let auth = service_with(Config { auto_confirm_email: false, ..Config::for_tests() }).await;

        let (user, token) = auth.sign_up(sign_up_req("f@example.com")).await.unwrap();
        assert!(token.is_none());

        let err = auth.sign_in(sign_in_req("f@example.com", "secret-pass")).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::EmailNotConfirmed)));

        let (admin, _) = auth.sign_up(sign_up_req("admin@example.com")).await.unwrap();
        let admin = AdminUser::check(admin).unwrap();
        auth.confirm_email(&admin, &user.id).await.unwrap();

        auth.sign_in(sign_in_req("f@example.com", "secret-pass")).await.unwrap();
    }

    #[tokio::test]
    async fn admin_flag_follows_config() {
        let auth = service().await;
        let (admin, _) = auth.sign_up(sign_up_req("admin@example.com")).await.unwrap();
        let (viewer, _) = auth.sign_up(sign_up_req("viewer@example.com")).await.unwrap();

        assert!(AdminUser::check(admin).is_ok());
        assert!(matches!(AdminUser::check(viewer), Err(AppError::Forbidden)));

        // dropping an email from the list revokes the flag on next sync
        let auth = AuthService::new(
            auth.db.clone(),
            Arc::new(Config { admin_emails: vec!["viewer@example.com".into()], ..Config::for_tests() }),
        );
        auth.sync_admins().await.unwrap();

        let admin = user::Entity::find()
            .filter(user::Column::Email.eq("admin@example.com"))
            .one(&auth.db)
            .await
            .unwrap()
            .unwrap();
        let viewer = user::Entity::find()
            .filter(user::Column::Email.eq("viewer@example.com"))
            .one(&auth.db)
            .await
            .unwrap()
            .unwrap();
        assert!(!admin.is_admin);
        assert!(viewer.is_admin);
    }

    #[tokio::test]
    async fn repeated_sign_in_attempts_are_limited() {
        let auth = service().await;
        auth.sign_up(sign_up_req("g@example.com")).await.unwrap();

        for _ in 0..SIGN_IN_ATTEMPTS_PER_MINUTE {
            let _ = auth.sign_in(sign_in_req("g@example.com", "wrong-pass")).await;
        }
        let err = auth.sign_in(sign_in_req("g@example.com", "secret-pass")).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TooManyRequests)));

        // other accounts are unaffected
        let err = auth.sign_in(sign_in_req("h@example.com", "secret-pass")).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn idle_sign_in_keys_are_pruned() {
        let auth = AuthService::with_sign_in_quota(
            db::connect_in_memory().await.unwrap(),
            Arc::new(Config::for_tests()),
            Quota::per_second(NonZeroU32::new(1000).unwrap()),
        );

        for i in 0..3 {
            let email = format!("stranger{i}@example.com");
            let _ = auth.sign_in(sign_in_req(&email, "whatever")).await;
        }
        assert_eq!(auth.sign_in_limiter.len(), 3);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        auth.prune_sign_in_attempts();
        assert_eq!(auth.sign_in_limiter.len(), 0);
    }

    #[tokio::test]
    async fn unknown_email_still_verifies_a_hash() {
        let auth = service().await;
        assert!(auth.dummy_hash.get().is_none());

        let err = auth.sign_in(sign_in_req("ghost@example.com", "secret-pass")).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));
        assert!(auth.dummy_hash.get().is_some_and(|h| h.starts_with("$argon2id$")));
    }

    #[tokio::test]
    async fn abandoned_sessions_are_purged() {
        let auth = service().await;
        let (_, stale) = auth.sign_up(sign_up_req("i@example.com")).await.unwrap();
        let (_, fresh) = auth.sign_up(sign_up_req("j@example.com")).await.unwrap();
        let (stale, fresh) = (stale.unwrap(), fresh.unwrap());

        session::Entity::update_many()
            .col_expr(session::Column::ExpiresAt, Expr::value(now_sec() - 1))
            .filter(session::Column::Token.eq(stale.clone()))
            .exec(&auth.db)
            .await
            .unwrap();

        assert_eq!(auth.purge_expired_sessions().await.unwrap(), 1);
        assert!(session::Entity::find_by_id(stale).one(&auth.db).await.unwrap().is_none());
        assert!(auth.current_user(&fresh).await.unwrap().is_some());
    }

    #[test]
    fn email_shapes() {
        assert!(normalize_email("x@y.io").is_ok());
        assert!(normalize_email("@y.io").is_err());
        assert!(normalize_email("x@y").is_err());
        assert!(normalize_email("x y@z.io").is_err());
        assert!(normalize_email("x@@z.io").is_err());
    }
}
