use std::sync::Arc;

use actix_web::{
    body::{MessageBody, to_bytes},
    cookie::Cookie,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test::{self, TestRequest},
    web,
};
use common::{Exchange, ExchangeSettings, LinkPolicy, MemoryStore, NewExchangeRate};
use ed25519_compact::KeyPair;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use crate::{app::exchange_app, state::AppState};

struct Reply {
    status: StatusCode,
    json: Value,
    cookies: Vec<Cookie<'static>>,
}

async fn state(settings: ExchangeSettings) -> web::Data<AppState> {
    let exchange = Exchange::new(Arc::new(MemoryStore::new()), settings);
    exchange
        .set_rate(
            NewExchangeRate::new("XOF_USDT", Decimal::new(2, 3))
                .with_fee(Decimal::new(15, 1))
                .with_limits(Decimal::new(5_000, 0), Decimal::new(1_000_000, 0)),
        )
        .await
        .expect("rate saved");
    exchange
        .create_admin("admin@example.com", "admin-pass", None, None)
        .await
        .expect("admin created");
    web::Data::new(AppState::new(exchange))
}

macro_rules! test_app {
    ($data:expr) => {{
        let KeyPair {
            pk: public_key,
            sk: secret_key,
        } = KeyPair::generate();
        test::init_service(exchange_app!($data.clone(), public_key, secret_key)).await
    }};
}

/// Sends `req` and collects status, JSON body and cookies, whether the
/// handler or a middleware produced the response.
async fn send<S, R, B>(app: &S, req: R) -> Reply
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, cookies, body) = match app.call(req).await {
        Ok(resp) => {
            let status = resp.status();
            let cookies = resp
                .response()
                .cookies()
                .map(|c| c.into_owned())
                .collect();
            let Ok(body) = to_bytes(resp.into_body()).await else {
                panic!("failed to read response body");
            };
            (status, cookies, body)
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            let Ok(body) = to_bytes(resp.into_body()).await else {
                panic!("failed to read error body");
            };
            (status, Vec::new(), body)
        }
    };
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Reply {
        status,
        json,
        cookies,
    }
}

fn with_cookies(mut req: TestRequest, cookies: &[Cookie<'static>]) -> TestRequest {
    for cookie in cookies {
        req = req.cookie(cookie.clone());
    }
    req
}

fn login_request(email: &str, password: &str) -> TestRequest {
    TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"email": email, "password": password}))
}

fn signup_request(email: &str, claim_codes: &[&str]) -> TestRequest {
    TestRequest::post().uri("/auth/signup").set_json(json!({
        "email": email,
        "password": "secret42",
        "firstName": "Awa",
        "claimCodes": claim_codes,
    }))
}

fn buy_body() -> Value {
    json!({
        "type": "BUY",
        "amountIn": "50000",
        "currencyIn": "XOF",
        "currencyOut": "USDT",
        "status": "COMPLETED",
        "paymentMethod": "mobile_money",
        "paymentDetails": {"addressOrNumber": "TQ4k9xWallet"}
    })
}

#[actix_web::test]
async fn rates_and_quotes_are_public() {
    let data = state(ExchangeSettings::default()).await;
    let app = test_app!(data);

    let reply = send(&app, TestRequest::get().uri("/rates").to_request()).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json.as_array().map(Vec::len), Some(1));
    assert_eq!(reply.json[0]["pair"], "XOF_USDT");

    let reply = send(
        &app,
        TestRequest::get()
            .uri("/quote?from=XOF&to=USDT&amount=50000")
            .to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["estimatedOut"], "100.00");
    assert_eq!(reply.json["withinLimits"], true);

    let reply = send(
        &app,
        TestRequest::get()
            .uri("/quote?from=USDT&to=BTC&amount=1")
            .to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json["message"].is_string());
}

#[actix_web::test]
async fn quote_rejects_a_malformed_amount() {
    let data = state(ExchangeSettings::default()).await;
    let app = test_app!(data);

    let reply = send(
        &app,
        TestRequest::get()
            .uri("/quote?from=XOF&to=USDT&amount=lots")
            .to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json["message"].is_string());
}

#[actix_web::test]
async fn transactions_require_a_session() {
    let data = state(ExchangeSettings::default()).await;
    let app = test_app!(data);

    let reply = send(&app, TestRequest::get().uri("/transactions").to_request()).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = send(
        &app,
        TestRequest::post()
            .uri("/transactions")
            .set_json(buy_body())
            .to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn login_rejects_bad_credentials() {
    let data = state(ExchangeSettings::default()).await;
    let app = test_app!(data);

    let reply = send(
        &app,
        login_request("admin@example.com", "wrong-pass").to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json["message"], "Invalid email or password");
    assert!(reply.cookies.is_empty());
}

#[actix_web::test]
async fn signup_sets_a_session_and_rejects_duplicates() {
    let data = state(ExchangeSettings::default()).await;
    let app = test_app!(data);

    let reply = send(&app, signup_request("awa@example.com", &[]).to_request()).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json["user"]["email"], "awa@example.com");
    assert_eq!(reply.json["user"]["status"], "PENDING");
    assert!(reply.json["user"].get("passwordHash").is_none());
    assert!(!reply.cookies.is_empty());

    let reply = send(&app, signup_request("AWA@example.com", &[]).to_request()).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["message"], "email already used");
}

#[actix_web::test]
async fn transaction_lifecycle_over_http() {
    let data = state(ExchangeSettings::default()).await;
    let app = test_app!(data);

    let customer = send(&app, signup_request("awa@example.com", &[]).to_request())
        .await
        .cookies;

    let created = send(
        &app,
        with_cookies(TestRequest::post().uri("/transactions"), &customer)
            .set_json(buy_body())
            .to_request(),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.json["status"], "PENDING");
    assert_eq!(created.json["amountOut"], "100.00");
    let id = created.json["id"].as_i64().expect("numeric id");

    let admin = send(
        &app,
        login_request("admin@example.com", "admin-pass").to_request(),
    )
    .await
    .cookies;

    let updated = send(
        &app,
        with_cookies(
            TestRequest::patch().uri(&format!("/transactions/{}/status", id)),
            &admin,
        )
        .set_json(json!({"status": "COMPLETED"}))
        .to_request(),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json["status"], "COMPLETED");

    let fetched = send(
        &app,
        with_cookies(
            TestRequest::get().uri(&format!("/transactions/{}", id)),
            &customer,
        )
        .to_request(),
    )
    .await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json["status"], "COMPLETED");

    let reopened = send(
        &app,
        with_cookies(
            TestRequest::patch().uri(&format!("/transactions/{}/status", id)),
            &admin,
        )
        .set_json(json!({"status": "PROCESSING"}))
        .to_request(),
    )
    .await;
    assert_eq!(reopened.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn customers_cannot_use_admin_routes() {
    let data = state(ExchangeSettings::default()).await;
    let app = test_app!(data);

    let customer = send(&app, signup_request("awa@example.com", &[]).to_request())
        .await
        .cookies;

    let created = send(
        &app,
        with_cookies(TestRequest::post().uri("/transactions"), &customer)
            .set_json(buy_body())
            .to_request(),
    )
    .await;
    let id = created.json["id"].as_i64().expect("numeric id");

    let reply = send(
        &app,
        with_cookies(
            TestRequest::patch().uri(&format!("/transactions/{}/status", id)),
            &customer,
        )
        .set_json(json!({"status": "COMPLETED"}))
        .to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = send(
        &app,
        with_cookies(TestRequest::post().uri("/rates"), &customer)
            .set_json(json!({"pair": "USDT_XOF", "rate": "600"}))
            .to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = send(
        &app,
        with_cookies(TestRequest::get().uri("/admin/pending-users"), &customer).to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn unknown_transactions_are_not_found() {
    let data = state(ExchangeSettings::default()).await;
    let app = test_app!(data);

    let admin = send(
        &app,
        login_request("admin@example.com", "admin-pass").to_request(),
    )
    .await
    .cookies;

    let reply = send(
        &app,
        with_cookies(TestRequest::patch().uri("/transactions/999/status"), &admin)
            .set_json(json!({"status": "COMPLETED"}))
            .to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.json["message"].is_string());

    let reply = send(
        &app,
        with_cookies(TestRequest::get().uri("/transactions/999"), &admin).to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let listed = send(
        &app,
        with_cookies(TestRequest::get().uri("/transactions"), &admin).to_request(),
    )
    .await;
    assert_eq!(listed.json.as_array().map(Vec::len), Some(0));
}

#[actix_web::test]
async fn invalid_bodies_are_bad_requests() {
    let data = state(ExchangeSettings::default()).await;
    let app = test_app!(data);

    let customer = send(&app, signup_request("awa@example.com", &[]).to_request())
        .await
        .cookies;

    let mut body = buy_body();
    body["paymentDetails"] = json!({});
    let reply = send(
        &app,
        with_cookies(TestRequest::post().uri("/transactions"), &customer)
            .set_json(body)
            .to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["message"], "Payment details are required");

    let reply = send(
        &app,
        with_cookies(TestRequest::post().uri("/transactions"), &customer)
            .set_json(json!({"amountIn": "not a number"}))
            .to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json["message"].is_string());
}

#[actix_web::test]
async fn guest_transactions_follow_their_claim_code() {
    let data = state(ExchangeSettings::default()).await;
    let app = test_app!(data);

    let guest = send(
        &app,
        TestRequest::post()
            .uri("/transactions/guest")
            .set_json(buy_body())
            .to_request(),
    )
    .await;
    assert_eq!(guest.status, StatusCode::CREATED);
    assert!(guest.json["userId"].is_null());
    let claim_code = guest.json["claimCode"]
        .as_str()
        .expect("claim code")
        .to_string();

    let bystander = send(&app, signup_request("kofi@example.com", &[]).to_request()).await;
    assert_eq!(bystander.json["linkedTransactions"], 0);

    let owner = send(
        &app,
        signup_request("awa@example.com", &[claim_code.as_str()]).to_request(),
    )
    .await;
    assert_eq!(owner.status, StatusCode::CREATED);
    assert_eq!(owner.json["linkedTransactions"], 1);

    let listed = send(
        &app,
        with_cookies(TestRequest::get().uri("/transactions"), &owner.cookies).to_request(),
    )
    .await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.json.as_array().map(Vec::len), Some(1));
    assert_eq!(listed.json[0]["id"], guest.json["id"]);

    let hidden = send(
        &app,
        with_cookies(
            TestRequest::get().uri(&format!("/transactions/{}", guest.json["id"])),
            &bystander.cookies,
        )
        .to_request(),
    )
    .await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn global_policy_links_on_login() {
    let data = state(ExchangeSettings {
        link_policy: LinkPolicy::Global,
        ..ExchangeSettings::default()
    })
    .await;
    let app = test_app!(data);

    send(
        &app,
        TestRequest::post()
            .uri("/transactions/guest")
            .set_json(buy_body())
            .to_request(),
    )
    .await;

    let admin = send(
        &app,
        login_request("admin@example.com", "admin-pass").to_request(),
    )
    .await;
    assert_eq!(admin.status, StatusCode::OK);
    assert_eq!(admin.json["linkedTransactions"], 1);
}

#[actix_web::test]
async fn admins_review_pending_users() {
    let data = state(ExchangeSettings::default()).await;
    let app = test_app!(data);

    let signed_up = send(&app, signup_request("awa@example.com", &[]).to_request()).await;
    let user_id = signed_up.json["user"]["id"].as_i64().expect("numeric id");

    let admin = send(
        &app,
        login_request("admin@example.com", "admin-pass").to_request(),
    )
    .await
    .cookies;

    let pending = send(
        &app,
        with_cookies(TestRequest::get().uri("/admin/pending-users"), &admin).to_request(),
    )
    .await;
    assert_eq!(pending.status, StatusCode::OK);
    assert_eq!(pending.json.as_array().map(Vec::len), Some(1));

    let rejected = send(
        &app,
        with_cookies(
            TestRequest::patch().uri(&format!("/admin/users/{}/verify", user_id)),
            &admin,
        )
        .set_json(json!({"status": "REJECTED"}))
        .to_request(),
    )
    .await;
    assert_eq!(rejected.status, StatusCode::OK);
    assert_eq!(rejected.json["status"], "REJECTED");

    let login = send(&app, login_request("awa@example.com", "secret42").to_request()).await;
    assert_eq!(login.status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn rejection_ends_an_open_session() {
    let data = state(ExchangeSettings::default()).await;
    let app = test_app!(data);

    let signed_up = send(&app, signup_request("awa@example.com", &[]).to_request()).await;
    let user_id = signed_up.json["user"]["id"].as_i64().expect("numeric id");
    let customer = signed_up.cookies;

    let admin = send(
        &app,
        login_request("admin@example.com", "admin-pass").to_request(),
    )
    .await
    .cookies;

    let rejected = send(
        &app,
        with_cookies(
            TestRequest::patch().uri(&format!("/admin/users/{}/verify", user_id)),
            &admin,
        )
        .set_json(json!({"status": "REJECTED"}))
        .to_request(),
    )
    .await;
    assert_eq!(rejected.status, StatusCode::OK);

    let reply = send(
        &app,
        with_cookies(TestRequest::post().uri("/transactions"), &customer)
            .set_json(buy_body())
            .to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json["message"], "Account has been rejected");

    let reply = send(
        &app,
        with_cookies(TestRequest::get().uri("/transactions"), &customer).to_request(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}
