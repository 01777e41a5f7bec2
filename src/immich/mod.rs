//! Client for the Immich HTTP API: DTOs, errors, and the transport trait
//! the sync engine talks through.

pub mod client;
pub mod error;
pub mod types;

pub use client::{AssetDownload, ByteStream, ImmichApi, ImmichClient};
pub use error::ApiError;
pub use types::{Album, AlbumDetail, AssetMetadata};
