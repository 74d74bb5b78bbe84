use actix_web::{Error, HttpResponse, get, post, web};
use common::{AuthContext, NewExchangeRate};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct QuoteQuery {
    from: String,
    to: String,
    amount: Decimal,
}

#[get("/rates")]
pub async fn get_rates(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let rates = app_state.exchange.list_rates().await?;
    Ok(HttpResponse::Ok().json(rates))
}

#[post("/rates")]
pub async fn create_rate(
    ctx: AuthContext,
    rate: web::Json<NewExchangeRate>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let rate = app_state
        .exchange
        .create_rate(&ctx, rate.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(rate))
}

#[get("/quote")]
pub async fn get_quote(
    query: web::Query<QuoteQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let quote = app_state
        .exchange
        .quote(&query.from, &query.to, query.amount)
        .await?;
    Ok(HttpResponse::Ok().json(quote))
}
