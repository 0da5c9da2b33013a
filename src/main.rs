use anyhow::Context;
use clap::{Parser, ValueEnum};
use star_type_rs::config::{
    DEFAULT_ALLOWED_ORIGIN, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_MODEL_PATH, ServerConfig,
};
use star_type_rs::predictor::{LinearPipeline, Predictor};
use star_type_rs::{logging, server};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(
        long,
        default_value = "127.0.0.1",
        help = "Host address to bind the server to"
    )]
    host: String,

    #[arg(long, default_value_t = 8000, help = "Port number to listen on")]
    port: u16,

    #[arg(
        long,
        default_value = DEFAULT_MODEL_PATH,
        help = "Path to the fitted star type pipeline artifact (JSON)"
    )]
    model_path: PathBuf,

    #[arg(
        long,
        value_delimiter = ',',
        default_value = DEFAULT_ALLOWED_ORIGIN,
        help = "Comma-separated list of origins allowed to call the API from a browser"
    )]
    allowed_origins: Vec<String>,

    #[arg(
        long,
        default_value_t = DEFAULT_MAX_PAYLOAD_SIZE,
        help = "Maximum size in bytes of a JSON request body"
    )]
    max_payload_size: usize,

    #[arg(long, default_value_t = LogLevel::Info, value_enum, help = "Log level")]
    log_level: LogLevel,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            model_path: self.model_path,
            allowed_origins: self.allowed_origins,
            max_payload_size: self.max_payload_size,
            log_level: self.log_level.into(),
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config().validated()?;
    logging::init_logging(config.log_level)?;

    let pipeline = LinearPipeline::load(&config.model_path)?;
    log::info!(
        "Loaded model {} with classes {:?}",
        config.model_path.display(),
        pipeline.classes()
    );
    let predictor: Arc<dyn Predictor> = Arc::new(pipeline);

    server::startup(config, predictor)
        .await
        .context("HTTP server terminated with an error")
}
