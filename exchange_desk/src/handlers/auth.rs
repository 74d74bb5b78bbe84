use crate::state::AppState;
use actix_jwt_auth_middleware::TokenSigner;
use actix_web::{Error, HttpResponse, HttpResponseBuilder, error::InternalError, http::StatusCode, post, web};
use common::{AuthContext, AuthOutcome, LoginData, SignupData};
use jwt_compact::alg::Ed25519;

#[post("/auth/signup")]
pub async fn signup(
    signup_data: web::Json<SignupData>,
    app_state: web::Data<AppState>,
    cookie_signer: web::Data<TokenSigner<AuthContext, Ed25519>>,
) -> Result<HttpResponse, Error> {
    let outcome = app_state.exchange.signup(signup_data.into_inner()).await?;
    session_response(HttpResponse::Created(), &outcome, &cookie_signer)
}

#[post("/auth/login")]
pub async fn login(
    login_data: web::Json<LoginData>,
    app_state: web::Data<AppState>,
    cookie_signer: web::Data<TokenSigner<AuthContext, Ed25519>>,
) -> Result<HttpResponse, Error> {
    let outcome = app_state.exchange.login(login_data.into_inner()).await?;
    session_response(HttpResponse::Ok(), &outcome, &cookie_signer)
}

/// Sets the access and refresh cookies for the authenticated user.
fn session_response(
    mut response: HttpResponseBuilder,
    outcome: &AuthOutcome,
    cookie_signer: &TokenSigner<AuthContext, Ed25519>,
) -> Result<HttpResponse, Error> {
    let claims = AuthContext::for_user(&outcome.user);

    let access_cookie = cookie_signer.create_access_cookie(&claims).map_err(|err| {
        log::error!("Failed to create access token: {:?}", err);
        InternalError::new("Token error", StatusCode::INTERNAL_SERVER_ERROR)
    })?;

    let refresh_cookie = cookie_signer.create_refresh_cookie(&claims).map_err(|err| {
        log::error!("Failed to create refresh token: {:?}", err);
        InternalError::new("Token error", StatusCode::INTERNAL_SERVER_ERROR)
    })?;

    Ok(response
        .cookie(access_cookie)
        .cookie(refresh_cookie)
        .json(outcome))
}
