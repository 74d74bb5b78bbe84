mod admin;
mod auth;
mod rates;
mod transactions;

use actix_web::{HttpResponse, Responder, get, web};
use common::ExchangeError;

pub use admin::*;
pub use auth::*;
pub use rates::*;
pub use transactions::*;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Welcome to the Exchange Desk!")
}

/// Malformed JSON bodies answer 400 with the usual `{message}` body.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        log::debug!("Rejected request body: {}", err);
        ExchangeError::validation(err.to_string()).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        log::debug!("Rejected query string: {}", err);
        ExchangeError::validation(err.to_string()).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| ExchangeError::not_found(err.to_string()).into())
}

#[cfg(test)]
mod tests;
