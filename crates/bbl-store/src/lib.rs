pub mod error;
pub mod file_store;
pub mod migrate;
pub mod paths;
pub mod store;

pub use error::StoreError;
pub use file_store::{atomic_write, FileStore};
pub use paths::{DeploymentPaths, StatePaths};
pub use store::StateStore;
