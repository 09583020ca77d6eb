use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid JSON from renderer: {message}")]
    ResultParse { message: String, snippet: String },

    #[error("Renderer reported success without template metadata")]
    MissingTemplate,

    #[error("Analysis failed")]
    AnalysisFailed { errors: Vec<String> },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
