mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

#[cfg(test)]
mod test_utils;

use std::{net::SocketAddr, sync::Arc};

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use config::Config;
use db::{complaintdb::ComplaintExt, db::DBClient, userdb::UserExt};
use dotenv::dotenv;
use mail::sendmail::{Mailer, SmtpMailer};
use routes::create_router;
use service::{
    account_service::AccountService,
    complaint_service::{ComplaintService, ComplaintSettings},
    notification_service::NotificationService,
    storage_service::{AttachmentStorage, HttpStorage},
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;
use utils::reference::{RandomReference, ReferenceSource};

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Option<Arc<DBClient>>,
    pub complaint_service: Arc<ComplaintService>,
    pub account_service: Arc<AccountService>,
}

/// Collaborators the services are wired to.
pub struct Backends {
    pub complaints: Arc<dyn ComplaintExt>,
    pub users: Arc<dyn UserExt>,
    pub references: Arc<dyn ReferenceSource>,
    pub storage: Arc<dyn AttachmentStorage>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config) -> Self {
        let db_client = Arc::new(db_client);

        let backends = Backends {
            complaints: db_client.clone(),
            users: db_client.clone(),
            references: Arc::new(RandomReference::new(config.reference_prefix.clone())),
            storage: Arc::new(HttpStorage::new(
                config.storage_url.clone(),
                config.storage_bucket.clone(),
                config.storage_key.clone(),
            )),
            mailer: Arc::new(SmtpMailer::new(
                config.smtp_host.clone(),
                config.smtp_port,
                config.smtp_username.clone(),
                config.smtp_password.clone(),
                config.from_email.clone(),
            )),
        };

        let mut state = Self::with_backends(config, backends);
        state.db_client = Some(db_client);
        state
    }

    pub fn with_backends(config: Config, backends: Backends) -> Self {
        let settings = ComplaintSettings::from_config(&config);
        let notifications = NotificationService::new(
            backends.mailer,
            config.app_url.clone(),
            settings.window_days,
        );

        let complaint_service = Arc::new(ComplaintService::new(
            backends.complaints,
            backends.references,
            backends.storage,
            notifications,
            settings,
        ));
        let account_service = Arc::new(AccountService::new(
            backends.users,
            config.jwt_secret.clone(),
            config.jwt_maxage,
        ));

        Self {
            env: config,
            db_client: None,
            complaint_service,
            account_service,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!("Failed to run database migrations: {:?}", err);
        std::process::exit(1);
    }

    let allowed_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    let app_state = Arc::new(AppState::new(DBClient::new(pool), config.clone()));
    let app = create_router(app_state.clone()).layer(cors);

    tokio::spawn(service::background_jobs::start_auto_close_job(app_state.clone()));

    tracing::info!("Server is running on http://localhost:{}", config.port);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind port {}: {:?}", config.port, err);
            std::process::exit(1);
        }
    };

    if let Err(err) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!("Server error: {:?}", err);
    }
}
