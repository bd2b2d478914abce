//! Xeno-Canto API v3: typed query builder, paginating search client and
//! per-species recording downloader.

pub mod api;
pub mod download;
pub mod error;
pub mod key_store;
pub mod layout;
pub mod metadata;
pub mod query;
pub mod retry;
pub mod types;

pub use api::{XcClient, XcClientBuilder};
pub use download::Downloader;
pub use error::{Result, XcError};
pub use query::{Automatic, BoundingBox, Query, QueryBuilder, Tag};
pub use retry::RetryPolicy;
pub use types::*;
