use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplgridError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Component parsing failed for {template}: {message}")]
    Composition { template: String, message: String },

    #[error("Rendering block '{block}' of {template} failed: {message}")]
    Render {
        template: String,
        block: String,
        message: String,
    },

    #[error("Minifying block '{block}' of {template} failed: {message}")]
    Minify {
        template: String,
        block: String,
        message: String,
    },

    #[error("No email template with name {0} found")]
    UnknownTemplate(String),

    #[error("No locale with name {0} found")]
    UnknownLocale(String),

    #[error("Remote call failed with status {status}: {body}")]
    RemoteCall { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Email queue is closed")]
    QueueClosed,

    #[error("Email queue is full")]
    QueueFull,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TemplgridError {
    /// Whether the error comes from the caller naming something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TemplgridError::UnknownTemplate(_) | TemplgridError::UnknownLocale(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TemplgridError>;
