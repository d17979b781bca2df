use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, dev::Server, middleware, web};

use crate::config::{ProblemConfig, ServerConfig};
use crate::queue::JobQueue;
use crate::routes::{configure, json_error_handler};
use crate::sandbox::LanguageRegistry;

/// Cross-origin policy for the browser client
pub fn cors(origins: &[String]) -> Cors {
    let cors = if origins.iter().any(|o| o == "*") {
        Cors::default().allow_any_origin()
    } else {
        origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .supports_credentials()
    };
    cors.allow_any_method().allow_any_header().max_age(3600)
}

pub fn build_server(
    server_config: ServerConfig,
    registry: Arc<LanguageRegistry>,
    problems: Arc<ProblemConfig>,
    job_queue: Arc<JobQueue>,
) -> std::io::Result<Server> {
    let registry = web::Data::from(registry);
    let problems = web::Data::from(problems);
    let job_queue = web::Data::from(job_queue);
    let cors_origins = server_config.cors_origins;

    let bind_address = server_config
        .bind_address
        .unwrap_or("127.0.0.1".to_string());
    let bind_port = server_config.bind_port.unwrap_or(8000);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(registry.clone())
            .app_data(problems.clone())
            .app_data(job_queue.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(middleware::NormalizePath::trim())
            .wrap(cors(&cors_origins))
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind((bind_address.as_str(), bind_port))?
    .run();

    log::info!("Listening on {bind_address}:{bind_port}");
    Ok(server)
}
