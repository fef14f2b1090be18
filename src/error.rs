use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DateError {
    #[error(
        "Date '{input}' is not in a supported format. \
        Either use YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS"
    )]
    Format { input: String },

    #[error("Month '{input}' is not in a supported format. Use YYYY-MM")]
    Month { input: String },
}

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Error parsing calendar: {reason}")]
    Parse { reason: String },

    #[error("Event '{event}' has no {property}")]
    MissingProperty {
        property: &'static str,
        event: String,
    },

    #[error("Event '{event}' has an invalid {property}: '{value}'")]
    Timestamp {
        property: &'static str,
        value: String,
        event: String,
    },

    #[error("Event '{event}' has an invalid DURATION: '{value}'")]
    Duration { value: String, event: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Error decoding config {}: {source}", path.display())]
    Format {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Error rendering bundled template: {source}")]
    Bundled {
        #[from]
        source: askama::Error,
    },

    #[error("Error rendering template: {source}")]
    Template {
        #[from]
        source: minijinja::Error,
    },
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("IO Error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("Could not run pandoc: {source}")]
    Spawn { source: io::Error },

    #[error("pandoc failed ({status}): {stderr}")]
    Pandoc { status: ExitStatus, stderr: String },

    #[error("Error restyling document: {source}")]
    Archive {
        #[from]
        source: zip::result::ZipError,
    },

    #[error("Malformed document XML: {source}")]
    Xml {
        #[from]
        source: quick_xml::Error,
    },
}
