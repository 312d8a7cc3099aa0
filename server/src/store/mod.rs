use crate::config::Backend;
use async_trait::async_trait;
use shared::sheet::{CellRef, Table};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod google;
pub mod memory;

pub use google::GoogleSheets;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sheet request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sheet store answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("worksheet {0:?} does not exist")]
    UnknownSheet(String),
    #[error("unexpected sheet response: {0}")]
    Malformed(String),
    #[error("cannot load seed {path}: {reason}")]
    Seed { path: String, reason: String },
}

/// A spreadsheet holding the roster and audit worksheets.
///
/// Every read returns the full current contents; nothing is cached.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// All rows of a worksheet, header row first.
    async fn read_grid(&self, sheet: &str) -> Result<Vec<Vec<String>>, StoreError>;

    /// Overwrite exactly one data cell.
    async fn write_cell(&self, sheet: &str, at: CellRef, value: u64) -> Result<(), StoreError>;

    /// Add one row after the last row of the worksheet.
    async fn append_row(&self, sheet: &str, row: Vec<String>) -> Result<(), StoreError>;

    async fn read_table(&self, sheet: &str) -> Result<Table, StoreError> {
        Ok(Table::from_grid(self.read_grid(sheet).await?))
    }
}

pub async fn connect(backend: &Backend) -> Result<Arc<dyn SheetStore>, StoreError> {
    match backend {
        Backend::Google {
            api_base,
            spreadsheet_id,
            token,
        } => {
            info!("Using Google Sheets backend for spreadsheet {}", spreadsheet_id);
            let sheets = GoogleSheets::new(api_base.clone(), spreadsheet_id.clone(), token.clone())?;
            Ok(Arc::new(sheets))
        }
        Backend::Memory { seed } => {
            let store = match seed {
                Some(path) => MemoryStore::from_seed(path).await?,
                None => MemoryStore::new(),
            };
            info!("Using in-memory backend with {} worksheets", store.sheet_count());
            Ok(Arc::new(store))
        }
    }
}
