mod app;
mod config;
mod handlers;
mod state;

use actix_web::{HttpServer, web};
use dotenv::dotenv;
use ed25519_compact::KeyPair;
use pretty_env_logger::env_logger::{Builder, Env};

use crate::config::AppConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    if cli::run_cli().await {
        return Ok(());
    }

    let logger_env = Env::default().default_filter_or("info");
    let mut logger_builder = Builder::from_env(logger_env);
    logger_builder.init();

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Application initialization failed: {:#}", e);
        std::io::Error::other(e.to_string())
    })?;

    let state = config.create_app_state().await.map_err(|e| {
        log::error!("Application initialization failed: {:#}", e);
        std::io::Error::other(e.to_string())
    })?;

    log::info!(
        "App state initialized, link policy {:?}, fiat currency {}",
        config.link_policy,
        config.fiat_currency
    );

    let data = web::Data::new(state);

    // Sessions do not survive a restart: the key pair lives in memory only.
    let KeyPair {
        pk: public_key,
        sk: secret_key,
    } = KeyPair::generate();

    log::info!("Listening on {}", config.bind_addr);

    HttpServer::new(move || app::exchange_app!(data.clone(), public_key, secret_key.clone()))
        .bind(config.bind_addr.as_str())?
        .run()
        .await
}
