pub mod catalog;
pub mod upstream;

pub use catalog::{CatalogModel, DEFAULT_MODEL_ID, MODEL_CATALOG, find_model, short_label};
pub use upstream::{UpstreamClient, UpstreamError, UpstreamReply};
