use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Prometheus exporter could not be installed: {0}")]
    ExporterError(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
