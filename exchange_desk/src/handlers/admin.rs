use actix_web::{Error, HttpResponse, get, patch, web};
use common::{AuthContext, VerificationStatus};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    status: VerificationStatus,
}

#[get("/pending-users")]
pub async fn get_pending_users(
    ctx: AuthContext,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let users = app_state.exchange.pending_users(&ctx).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[patch("/users/{id}/verify")]
pub async fn verify_user(
    ctx: AuthContext,
    path: web::Path<i64>,
    body: web::Json<VerifyRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let user = app_state
        .exchange
        .verify_user(&ctx, path.into_inner(), body.status)
        .await?;
    Ok(HttpResponse::Ok().json(user))
}
