//! Tool catalog: public naming, metadata, and the per-server index.

pub mod index;
pub mod naming;
pub mod types;

pub use index::{build_for_server, ToolCatalog};
pub use types::{CatalogBuild, Invocation, ToolMetadata};
