use crate::bulk::{self, BulkPipeline, OUTPUT_CONTENT_TYPE, OUTPUT_FILE_NAME};
use crate::config::ServerConfig;
use crate::error::ServiceError;
use crate::inference::InferenceService;
use crate::predictor::Predictor;
use crate::schema::{self, CANONICAL_COLUMNS, PREDICTED_TYPE_COLUMN};
use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, HttpServer, error, get, post, web};
use bytes::BytesMut;
use futures_util::TryStreamExt;
use serde_json::json;
use std::sync::Arc;

/// Multipart form field carrying the CSV upload.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub inference: InferenceService,
    pub bulk: BulkPipeline,
}

impl AppState {
    pub fn new(predictor: Arc<dyn Predictor>) -> Self {
        let inference = InferenceService::new(predictor);
        let bulk = BulkPipeline::new(inference.clone());
        AppState { inference, bulk }
    }
}

// Body binding failures are client errors of the 422 class, except overflow.
pub fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> error::Error {
    log::debug!("JSON payload error: {:?}", err);
    match &err {
        error::JsonPayloadError::OverflowKnownLength { length, limit } => {
            ServiceError::PayloadTooLarge(format!(
                "{} bytes exceeds limit of {} bytes",
                length, limit
            ))
            .into()
        }
        error::JsonPayloadError::Overflow { limit } => {
            ServiceError::PayloadTooLarge(format!("exceeds limit of {} bytes", limit)).into()
        }
        _ => ServiceError::MalformedBody(err.to_string()).into(),
    }
}

pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(json_error_handler)
}

#[get("/")]
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "The Star Type Prediction app is running" }))
}

#[get("/model_info")]
pub async fn model_info(app_state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "classes": app_state.inference.classes(),
        "feature_columns": CANONICAL_COLUMNS,
        "output_column": PREDICTED_TYPE_COLUMN,
    }))
}

#[post("/predict")]
pub async fn predict(
    body: web::Json<serde_json::Value>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let record = schema::bind_record(&body).inspect_err(|e| log::debug!("{}", e))?;
    let result = app_state.inference.predict_one(&record)?;
    Ok(HttpResponse::Ok().json(result))
}

#[post("/bulk_predict")]
pub async fn bulk_predict(
    mut payload: Multipart,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ServiceError::MissingUpload(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            while field
                .try_next()
                .await
                .map_err(|e| ServiceError::MissingUpload(e.to_string()))?
                .is_some()
            {}
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);
        bulk::check_format(filename.as_deref())?;

        let mut data = BytesMut::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| ServiceError::MissingUpload(e.to_string()))?
        {
            data.extend_from_slice(&chunk);
        }
        log::info!(
            "Received bulk upload {:?} ({} bytes)",
            filename.as_deref().unwrap_or_default(),
            data.len()
        );

        let output = app_state.bulk.run(filename.as_deref(), &data)?;
        return Ok(HttpResponse::Ok()
            .content_type(OUTPUT_CONTENT_TYPE)
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", OUTPUT_FILE_NAME),
            ))
            .body(output));
    }

    Err(ServiceError::MissingUpload(format!(
        "multipart form field '{}' is required",
        UPLOAD_FIELD
    )))
}

/// Registers every route of the service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(root)
        .service(model_info)
        .service(predict)
        .service(bulk_predict);
}

fn cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .expose_headers([header::CONTENT_DISPOSITION])
}

pub async fn startup(config: ServerConfig, predictor: Arc<dyn Predictor>) -> std::io::Result<()> {
    let app_state = web::Data::new(AppState::new(predictor));
    let allowed_origins = config.allowed_origins.clone();
    let max_payload_size = config.max_payload_size;

    log::info!("Starting server at {}:{}", config.host, config.port);
    log::info!("Allowed origins: {:?}", allowed_origins);

    HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(cors(&allowed_origins))
            .app_data(app_state.clone())
            .app_data(json_config(max_payload_size))
            .configure(configure)
    })
    .bind((config.host, config.port))?
    .run()
    .await
}
