use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub tmdb_language: String,
    pub tmdb_rps: u32,
    pub database_url: String,
    pub page_size: usize,
    /// Emails granted the admin flag in the users table.
    pub admin_emails: Vec<String>,
    pub session_ttl_days: i64,
    pub min_password_length: usize,
    pub auto_confirm_email: bool,
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let tmdb_api_key = std::env::var("TMDB_API_KEY").unwrap_or_else(|_| "".to_string());
        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());
        let tmdb_language =
            std::env::var("TMDB_LANGUAGE").unwrap_or_else(|_| "en-US".to_string());

        let tmdb_rps: u32 =
            std::env::var("TMDB_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://cinelist.db?mode=rwc".to_string());

        let page_size: usize =
            std::env::var("PAGE_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(12);

        let admin_emails = parse_email_list(&std::env::var("ADMIN_EMAILS").unwrap_or_default());

        let session_ttl_days: i64 =
            std::env::var("SESSION_TTL_DAYS").ok().and_then(|s| s.parse().ok()).unwrap_or(30);

        let min_password_length: usize =
            std::env::var("MIN_PASSWORD_LENGTH").ok().and_then(|s| s.parse().ok()).unwrap_or(6);

        let auto_confirm_email =
            std::env::var("AUTO_CONFIRM_EMAIL").ok().and_then(|s| parse_bool(&s)).unwrap_or(true);

        let cookie_secure =
            std::env::var("COOKIE_SECURE").ok().and_then(|s| parse_bool(&s)).unwrap_or(false);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            tmdb_api_key,
            tmdb_base_url,
            tmdb_language,
            tmdb_rps,
            database_url,
            page_size: page_size.max(1),
            admin_emails,
            session_ttl_days: session_ttl_days.max(1),
            min_password_length,
            auto_confirm_email,
            cookie_secure,
        })
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 0).into(),
            tmdb_api_key: String::new(),
            tmdb_base_url: "http://127.0.0.1:9".to_string(),
            tmdb_language: "en-US".to_string(),
            tmdb_rps: 50,
            database_url: "sqlite::memory:".to_string(),
            page_size: 12,
            admin_emails: vec!["admin@example.com".to_string()],
            session_ttl_days: 30,
            min_password_length: 6,
            auto_confirm_email: true,
            cookie_secure: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_list_is_trimmed_and_lowercased() {
        let list = parse_email_list(" Admin@Example.com, ,ops@example.com ");
        assert_eq!(list, vec!["admin@example.com", "ops@example.com"]);
    }

    #[test]
    fn admin_check_ignores_case() {
        let config = Config::for_tests();
        assert!(config.is_admin_email("ADMIN@example.com "));
        assert!(!config.is_admin_email("someone@example.com"));
    }

    #[test]
    fn bool_values() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
