//! # Dataset Cache
//!
//! Session-scoped storage for the dataset the user is working on: uploaded
//! files, preview rows, parsed headers and rows, and processed output.
//!
//! ```no_run
//! use bridge_desktop::SqliteSettingsStore;
//! use core_dataset::DatasetStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> core_dataset::Result<()> {
//! let settings = Arc::new(SqliteSettingsStore::in_memory().await?);
//! let store = DatasetStore::load(settings).await?;
//!
//! store
//!     .set_data(vec![], vec![], vec!["month".into()], vec![serde_json::json!(["2024-01"])])
//!     .await?;
//! assert_eq!(store.snapshot().await.rows.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod store;

pub use error::{DatasetError, Result};
pub use store::{DatasetSnapshot, DatasetStore, DATASET_KEY};
