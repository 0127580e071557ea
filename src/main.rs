use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::Parser;
use leaf_gateway::classifier::{Classifier, OnnxClassifier};
use leaf_gateway::config::Config;
use leaf_gateway::handlers::{self, AppState};
use leaf_gateway::labels;
use std::io::Write;
use std::sync::Arc;

fn init_logging(level: log::LevelFilter) {
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .init();
}

fn to_io(e: leaf_gateway::error::GatewayError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::parse();
    init_logging(config.level_filter());

    let labels = match &config.labels_path {
        Some(path) => labels::load_labels(path).map_err(to_io)?,
        None => labels::default_labels(),
    };
    log::info!(
        "Loading {} from {} ({} labels)",
        labels::MODEL_ID,
        config.model_path.display(),
        labels.len()
    );

    let classifier: Arc<dyn Classifier> =
        Arc::new(OnnxClassifier::load(&config.model_path, labels).map_err(to_io)?);
    let state = web::Data::new(AppState::new(classifier, config.max_upload_bytes));
    let limit = config.max_upload_bytes;

    log::info!("Server running at http://{}:{}", config.host, config.port);

    let mut server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .app_data(handlers::json_config(limit))
            .configure(handlers::routes)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server.bind((config.host.as_str(), config.port))?.run().await
}
