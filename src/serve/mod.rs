pub mod routes;
pub mod validator;

use poem::{
    EndpointExt, Route, Server,
    listener::TcpListener,
    middleware::{Cors, Tracing},
};
use poem_openapi::OpenApiService;
use tracing::info;

use crate::config::Config;
use crate::serve::validator::Validator;
use crate::storage::Storage;

/// Builds the store from the configuration and serves the API until the
/// process is stopped.
pub async fn run_server(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Storage::open(
        &config.storage.upload_path,
        &config.storage.folder_prefix,
        config.storage.num_disks,
    )?;
    let validator = Validator::new(storage, config.storage.max_size_bytes()?);

    let cors = Cors::new()
        .allow_origin(poem::http::header::HeaderValue::from_static("*"))
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS", "HEAD"])
        .allow_headers(vec!["Content-Type", "Accept", "Origin"])
        .max_age(3600);

    let api_service = OpenApiService::new(
        routes::StoreApi::new(validator),
        "Stripebox API",
        env!("CARGO_PKG_VERSION"),
    )
    .server("/api");
    let ui = api_service.swagger_ui();

    let app = Route::new()
        .nest("/api", api_service.with(cors).with(Tracing))
        .nest("/docs", ui);

    info!("server running at http://0.0.0.0:{}", config.server.port);
    info!("API docs at http://0.0.0.0:{}/docs", config.server.port);

    Server::new(TcpListener::bind(format!("0.0.0.0:{}", config.server.port)))
        .run(app)
        .await?;

    Ok(())
}
