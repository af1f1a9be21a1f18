use axum_extra::extract::cookie::CookieJar;
use cookie::{Cookie, SameSite};

const FLASH_COOKIE: &str = "flash";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlashKind {
    Notice,
    Error,
}

/// One-shot message shown on the next rendered page.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    fn encode(&self) -> String {
        let kind = match self.kind {
            FlashKind::Notice => "notice",
            FlashKind::Error => "error",
        };
        format!("{kind}:{}", urlencoding::encode(&self.message))
    }

    fn decode(raw: &str) -> Option<Self> {
        let (kind, message) = raw.split_once(':')?;
        let kind = match kind {
            "notice" => FlashKind::Notice,
            "error" => FlashKind::Error,
            _ => return None,
        };
        let message = urlencoding::decode(message).ok()?.into_owned();
        Some(Self { kind, message })
    }
}

pub fn notice(jar: CookieJar, message: impl Into<String>) -> CookieJar {
    set(jar, Flash { kind: FlashKind::Notice, message: message.into() })
}

pub fn error(jar: CookieJar, message: impl Into<String>) -> CookieJar {
    set(jar, Flash { kind: FlashKind::Error, message: message.into() })
}

fn set(jar: CookieJar, flash: Flash) -> CookieJar {
    jar.add(
        Cookie::build((FLASH_COOKIE, flash.encode()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Reads and clears the pending message.
pub fn take(jar: CookieJar) -> (CookieJar, Option<Flash>) {
    let Some(flash) = jar.get(FLASH_COOKIE).and_then(|c| Flash::decode(c.value())) else {
        return (jar, None);
    };
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), Some(flash))
}
