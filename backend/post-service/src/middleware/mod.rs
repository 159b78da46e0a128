/// Request identity extraction
///
/// Authentication happens at the gateway, which forwards the caller as
/// `x-user-id` and `x-account-type` headers. Handlers take a [`Caller`]
/// argument to require one.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};

use crate::domain::{AccountType, Caller};
use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ACCOUNT_TYPE_HEADER: &str = "x-account-type";

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn caller_from(req: &HttpRequest) -> Result<Caller, AppError> {
    let user_id = header(req, USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("missing caller identity".to_string()))?;

    let account_type = match header(req, ACCOUNT_TYPE_HEADER) {
        None => AccountType::User,
        Some(raw) => AccountType::parse(raw)
            .ok_or_else(|| AppError::Unauthorized(format!("unknown account type '{}'", raw)))?,
    };

    Ok(Caller::new(user_id, account_type))
}

impl FromRequest for Caller {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(caller_from(req))
    }
}
