mod api;
mod config;
mod database;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::io;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::{Settings, StoreBackend};
use database::{DocumentStore, MemoryStore, QueryHelper};
use services::{DisabledVideoGenerator, HttpVideoGenerator, VideoGenerator};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::from_env().map_err(|e| {
        log::error!("❌ Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;

    log::info!("🚀 Starting Storyboard Service...");

    let store: Arc<dyn DocumentStore> = match settings.store_backend {
        StoreBackend::MongoDB => {
            log::info!("📊 Database: {} ({})", settings.mongodb_database, settings.mongodb_uri);
            let mongo = database::MongoDB::new(&settings.mongodb_uri, &settings.mongodb_database)
                .await
                .map_err(|e| {
                    log::error!("❌ Failed to connect to MongoDB: {}", e);
                    io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string())
                })?;
            log::info!("✅ MongoDB connected successfully");
            Arc::new(mongo)
        }
        StoreBackend::Memory => {
            log::warn!("⚠️  Using in-memory store, data is lost on shutdown");
            Arc::new(MemoryStore::with_default_indexes().await)
        }
    };
    let db_data = web::Data::new(QueryHelper::new(store));

    let generator: Arc<dyn VideoGenerator> = match &settings.video_generator_url {
        Some(url) => {
            log::info!("🎬 Video generator: {}", url);
            Arc::new(HttpVideoGenerator::new(url.clone()))
        }
        None => {
            log::warn!("⚠️  VIDEO_GENERATOR_URL not set, storyboard generation is disabled");
            Arc::new(DisabledVideoGenerator)
        }
    };
    let generator_data: web::Data<dyn VideoGenerator> = web::Data::from(generator);

    let serve_videos = settings.video_dir.is_dir();
    let serve_frontend = settings.frontend_dir.join("index.html").is_file();
    if serve_videos {
        log::info!("🎞️  Serving videos from {}", settings.video_dir.display());
    } else {
        log::warn!("⚠️  Video directory {} not found, /generated_videos disabled", settings.video_dir.display());
    }
    if serve_frontend {
        log::info!("🖥️  Serving frontend from {}", settings.frontend_dir.display());
    }

    let host = settings.host.clone();
    let port = settings.port;

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = (if settings.allowed_origins.is_empty() {
            Cors::default().allow_any_origin()
        } else {
            settings
                .allowed_origins
                .iter()
                .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
                .supports_credentials()
        })
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            actix_web::http::header::AUTHORIZATION,
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::ACCEPT,
        ])
        .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
        .max_age(3600);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        let mut app = App::new()
            .app_data(db_data.clone())
            .app_data(generator_data.clone())
            .wrap(cors)
            .wrap(middleware::RequestMetrics)
            .wrap(Logger::default())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            .configure(api::configure);

        if serve_videos {
            app = app.service(Files::new("/generated_videos", &settings.video_dir));
        }
        // Registered last so it never shadows the API routes.
        if serve_frontend {
            app = app.service(Files::new("/", &settings.frontend_dir).index_file("index.html"));
        }
        app
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
