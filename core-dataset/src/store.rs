//! Working dataset cache.
//!
//! Holds the files the user uploaded, a preview, the parsed table and the
//! processed output, mirrored as one JSON document under the `dataStore`
//! key of the host [`SettingsStore`]. With an in-memory settings store the
//! dataset lives exactly as long as the host session.

use crate::error::Result;
use bridge_traits::storage::SettingsStore;
use core_runtime::events::{CoreEvent, DatasetEvent, EventBus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DATASET_KEY: &str = "dataStore";

const PROCESSED_DATA_FIELD: &str = "processedData";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSnapshot {
    #[serde(default)]
    pub files: Vec<Value>,
    #[serde(default)]
    pub preview_data: Vec<Value>,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Value>,
    #[serde(default)]
    pub processed_data: Option<Value>,
}

impl DatasetSnapshot {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.preview_data.is_empty()
            && self.headers.is_empty()
            && self.rows.is_empty()
            && self.processed_data.is_none()
    }
}

pub struct DatasetStore {
    settings: Arc<dyn SettingsStore>,
    event_bus: Option<EventBus>,
    state: Mutex<DatasetSnapshot>,
}

impl DatasetStore {
    /// Open the store, restoring any dataset saved earlier in this session.
    ///
    /// An unreadable saved document is discarded and the store starts empty.
    pub async fn load(settings: Arc<dyn SettingsStore>) -> Result<Self> {
        let snapshot = match settings.get_string(DATASET_KEY).await? {
            Some(raw) => match serde_json::from_str::<DatasetSnapshot>(&raw) {
                Ok(snapshot) => {
                    debug!(rows = snapshot.rows.len(), "Restored dataset");
                    snapshot
                }
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable dataset");
                    settings.delete(DATASET_KEY).await?;
                    DatasetSnapshot::default()
                }
            },
            None => DatasetSnapshot::default(),
        };

        Ok(Self {
            settings,
            event_bus: None,
            state: Mutex::new(snapshot),
        })
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: DatasetEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Dataset(event));
        }
    }

    pub async fn snapshot(&self) -> DatasetSnapshot {
        self.state.lock().await.clone()
    }

    /// Replace the source data. Processed output is kept.
    pub async fn set_data(
        &self,
        files: Vec<Value>,
        preview_data: Vec<Value>,
        headers: Vec<String>,
        rows: Vec<Value>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        let next = DatasetSnapshot {
            files,
            preview_data,
            headers,
            rows,
            processed_data: state.processed_data.clone(),
        };
        let raw = serde_json::to_string(&next)?;
        self.settings.set_string(DATASET_KEY, &raw).await?;
        *state = next;

        info!(
            files = state.files.len(),
            rows = state.rows.len(),
            columns = state.headers.len(),
            "Dataset loaded"
        );
        self.emit(DatasetEvent::DataLoaded {
            file_count: state.files.len(),
            row_count: state.rows.len(),
            column_count: state.headers.len(),
        });
        Ok(())
    }

    /// Replace the processed output.
    ///
    /// Only the `processedData` field of the saved document is rewritten, so
    /// other fields in it survive untouched. `null` clears the output.
    pub async fn set_processed_data(&self, processed_data: Value) -> Result<()> {
        let mut state = self.state.lock().await;

        let mut document = match self.settings.get_string(DATASET_KEY).await? {
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    warn!("Saved dataset is not a JSON object, rewriting it");
                    serde_json::Map::new()
                }
            },
            None => serde_json::Map::new(),
        };
        document.insert(PROCESSED_DATA_FIELD.to_string(), processed_data.clone());

        let raw = serde_json::to_string(&document)?;
        self.settings.set_string(DATASET_KEY, &raw).await?;

        let row_count = match &processed_data {
            Value::Array(items) => items.len(),
            Value::Null => 0,
            _ => 1,
        };
        state.processed_data = match processed_data {
            Value::Null => None,
            value => Some(value),
        };

        debug!(row_count, "Processed data updated");
        self.emit(DatasetEvent::ProcessedDataUpdated { row_count });
        Ok(())
    }

    pub async fn clear_data(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.settings.delete(DATASET_KEY).await?;
        *state = DatasetSnapshot::default();

        info!("Dataset cleared");
        self.emit(DatasetEvent::Cleared);
        Ok(())
    }
}
