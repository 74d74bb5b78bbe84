/// Builds the actix `App` with every route, the JWT authority and the
/// admin guard. `main` and the HTTP tests share it.
macro_rules! exchange_app {
    ($data:expr, $public_key:expr, $secret_key:expr) => {{
        use actix_jwt_auth_middleware::{Authority, TokenSigner, use_jwt::UseJWTOnApp};
        use actix_state_guards::UseStateGuardOnScope;
        use actix_web::{App, middleware::Logger, web};
        use common::AuthContext;
        use jwt_compact::alg::Ed25519;

        use $crate::handlers;

        let authority = Authority::<AuthContext, Ed25519, _, _>::new()
            .refresh_authorizer(|| async move { Ok(()) })
            .token_signer(Some(
                TokenSigner::new()
                    .signing_key($secret_key)
                    .algorithm(Ed25519)
                    .build()
                    .expect("Failed to generate TokenSigner"),
            ))
            .verifying_key($public_key)
            .build()
            .expect("Failed to create Authority");

        App::new()
            .app_data($data)
            .app_data(handlers::json_config())
            .app_data(handlers::query_config())
            .app_data(handlers::path_config())
            .wrap(Logger::new("%a %t %r %s  %{Referer}i %Dms"))
            .service(handlers::index)
            .service(handlers::signup)
            .service(handlers::login)
            .service(handlers::get_rates)
            .service(handlers::get_quote)
            .service(handlers::create_guest_transaction)
            .use_jwt(
                authority,
                web::scope("")
                    .service(handlers::get_transactions)
                    .service(handlers::get_transaction)
                    .service(handlers::create_transaction)
                    .service(handlers::update_transaction_status)
                    .service(handlers::create_rate)
                    .use_state_guard(
                        |ctx: AuthContext| async move { ctx.require_admin() },
                        web::scope("/admin")
                            .service(handlers::get_pending_users)
                            .service(handlers::verify_user),
                    ),
            )
    }};
}

pub(crate) use exchange_app;
