//! HTTP Basic-Auth gate
//!
//! Put it in front of the handlers it protects. On success it stores the
//! user name in the response context and lets the chain continue; every
//! failure renders the same 401 challenge.

use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

use super::{handler, Handler};
use crate::logger;

/// Context key holding the authenticated user name
pub const AUTH_USER_KEY: &str = "auth.user";

/// Decides whether a user name and password are accepted
pub type AuthFunction = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Why a request was refused. Only logged, never sent to the client.
#[derive(Debug, Error)]
enum Rejection {
    #[error("missing Basic scheme")]
    MissingScheme,
    #[error("invalid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    #[error("credentials are not UTF-8")]
    InvalidUtf8,
    #[error("missing ':' separator")]
    MissingSeparator,
    #[error("credentials rejected for user '{0}'")]
    Rejected(String),
}

/// Wrap a credential check as a Basic-Auth handler. If the user is not
/// accepted, no further handlers are called.
pub fn basic_auth_handler(auth: impl Fn(&str, &str) -> bool + Send + Sync + 'static) -> Handler {
    let auth: AuthFunction = Arc::new(auth);
    handler(move |w, r| match authenticate(r.get_header("authorization"), auth.as_ref()) {
        Ok(user) => {
            w.context_mut().insert(AUTH_USER_KEY, user);
            Ok(())
        }
        Err(reason) => {
            logger::log_warning(&format!("Basic auth failed for {}: {reason}", r.path()));
            w.unauthorized()
        }
    })
}

fn authenticate(header: &str, auth: &(dyn Fn(&str, &str) -> bool + Send + Sync)) -> Result<String, Rejection> {
    let encoded = match header.split_once(' ') {
        Some(("Basic", encoded)) => encoded,
        _ => return Err(Rejection::MissingScheme),
    };

    let decoded = general_purpose::STANDARD.decode(encoded)?;
    let decoded = String::from_utf8(decoded).map_err(|_| Rejection::InvalidUtf8)?;
    let (user, password) = decoded
        .split_once(':')
        .ok_or(Rejection::MissingSeparator)?;

    if auth(user, password) {
        Ok(user.to_string())
    } else {
        Err(Rejection::Rejected(user.to_string()))
    }
}
