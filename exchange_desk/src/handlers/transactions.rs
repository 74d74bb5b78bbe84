use actix_web::{Error, HttpResponse, get, patch, post, web};
use common::{AuthContext, NewTransaction, TransactionScope, TransactionStatus};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct TransactionQuery {
    #[serde(default)]
    scope: TransactionScope,
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: TransactionStatus,
}

#[get("/transactions")]
pub async fn get_transactions(
    ctx: AuthContext,
    query: web::Query<TransactionQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let transactions = app_state
        .exchange
        .list_transactions(&ctx, query.scope)
        .await?;
    Ok(HttpResponse::Ok().json(transactions))
}

#[get("/transactions/{id}")]
pub async fn get_transaction(
    ctx: AuthContext,
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let transaction = app_state
        .exchange
        .get_transaction(&ctx, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(transaction))
}

#[post("/transactions")]
pub async fn create_transaction(
    ctx: AuthContext,
    body: web::Json<NewTransaction>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let transaction = app_state
        .exchange
        .create_transaction(Some(&ctx), body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(transaction))
}

/// Creates an unowned transaction. The response carries the claim code.
#[post("/transactions/guest")]
pub async fn create_guest_transaction(
    body: web::Json<NewTransaction>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let transaction = app_state
        .exchange
        .create_transaction(None, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(transaction))
}

#[patch("/transactions/{id}/status")]
pub async fn update_transaction_status(
    ctx: AuthContext,
    path: web::Path<i64>,
    body: web::Json<StatusUpdate>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let transaction = app_state
        .exchange
        .update_status(&ctx, path.into_inner(), body.status)
        .await?;
    Ok(HttpResponse::Ok().json(transaction))
}
