//! Infrastructure layer: row stores, document side channel, config, resources.

pub mod bootstrap;
pub mod config;
pub mod documents;
pub mod resource;
pub mod row_store;

pub use bootstrap::{BootstrapError, Infrastructure};
pub use config::{ConfigError, DocumentBackend, InfraConfig, StoreBackend};
pub use documents::{DocumentError, DocumentSink, InMemoryDocumentSink};
pub use resource::{Resource, ResourceError, ResourceHandle};
pub use row_store::{InMemoryRowStore, PostgresRowStore, RowStore, StoreError, StoreResult, Tables};
