use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Server returned {status} for {url}")]
    Status { status: u16, url: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
