use super::{SheetStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use shared::sheet::{CellRef, Table};
use std::{collections::HashMap, path::Path};

/// Worksheets held in process memory. Used by tests and for local demos.
#[derive(Default)]
pub struct MemoryStore {
    sheets: DashMap<String, Vec<Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(self, name: &str, grid: Vec<Vec<String>>) -> Self {
        self.sheets.insert(name.to_string(), grid);
        self
    }

    /// Load worksheets from a JSON object of `name -> rows`.
    pub async fn from_seed(path: &Path) -> Result<Self, StoreError> {
        let seed_err = |reason: String| StoreError::Seed {
            path: path.display().to_string(),
            reason,
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| seed_err(e.to_string()))?;
        let sheets: HashMap<String, Vec<Vec<String>>> =
            serde_json::from_str(&raw).map_err(|e| seed_err(e.to_string()))?;
        Ok(Self {
            sheets: sheets.into_iter().collect(),
        })
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Copy of a worksheet, header row first.
    pub fn grid(&self, sheet: &str) -> Option<Vec<Vec<String>>> {
        self.sheets.get(sheet).map(|g| g.value().clone())
    }
}

#[async_trait]
impl SheetStore for MemoryStore {
    async fn read_grid(&self, sheet: &str) -> Result<Vec<Vec<String>>, StoreError> {
        self.grid(sheet)
            .ok_or_else(|| StoreError::UnknownSheet(sheet.to_string()))
    }

    async fn write_cell(&self, sheet: &str, at: CellRef, value: u64) -> Result<(), StoreError> {
        let mut grid = self
            .sheets
            .get_mut(sheet)
            .ok_or_else(|| StoreError::UnknownSheet(sheet.to_string()))?;
        let mut table = Table::from_grid(std::mem::take(grid.value_mut()));
        table.set(at, value.to_string());
        let mut rows = vec![table.header];
        rows.extend(table.rows);
        *grid.value_mut() = rows;
        Ok(())
    }

    async fn append_row(&self, sheet: &str, row: Vec<String>) -> Result<(), StoreError> {
        self.sheets
            .get_mut(sheet)
            .ok_or_else(|| StoreError::UnknownSheet(sheet.to_string()))?
            .push(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_write_cell_touches_one_cell() {
        let store = MemoryStore::new().with_sheet(
            "Roster",
            grid(&[&["Name", "Day 01", "Score"], &["Ann", "", "=SUM(B2)"], &["Ben", "4"]]),
        );
        store
            .write_cell("Roster", CellRef { row: 1, column: 1 }, 9)
            .await
            .unwrap();
        assert_eq!(
            store.grid("Roster").unwrap(),
            grid(&[&["Name", "Day 01", "Score"], &["Ann", "", "=SUM(B2)"], &["Ben", "9"]])
        );
    }

    #[tokio::test]
    async fn test_unknown_sheet() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.read_grid("Nope").await,
            Err(StoreError::UnknownSheet(name)) if name == "Nope"
        ));
        assert!(store.append_row("Nope", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_append_and_read_table() {
        let store = MemoryStore::new().with_sheet("Log", grid(&[&["timestamp", "admin"]]));
        store
            .append_row("Log", vec!["2026-10-16 09:00:00".into(), "kru_a".into()])
            .await
            .unwrap();
        let table = store.read_table("Log").await.unwrap();
        assert_eq!(table.header, vec!["timestamp", "admin"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_seed_file() {
        let path = std::env::temp_dir().join(format!("seed-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, r#"{"Leaderboard": [["Name"], ["Ann"]], "Log": []}"#)
            .await
            .unwrap();
        let store = MemoryStore::from_seed(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.ok();
        assert_eq!(store.sheet_count(), 2);
        assert_eq!(store.grid("Leaderboard").unwrap()[1], vec!["Ann"]);
    }

    #[tokio::test]
    async fn test_demo_seed_ranks() {
        use shared::{rank::project, schema::RosterSchema, score::ScorePolicy};

        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demo/seed.json");
        let store = MemoryStore::from_seed(&path).await.unwrap();
        let schema = RosterSchema {
            score_column: 4,
            exp_column: 5,
            medal_column: 6,
            ..RosterSchema::default()
        };
        let roster = store.read_table("Leaderboard").await.unwrap();
        schema.validate(&roster.header).unwrap();

        let ranked: Vec<(u32, String)> = project(&roster, &schema, ScorePolicy::ZeroFill)
            .into_iter()
            .map(|e| (e.rank, e.name))
            .collect();
        assert_eq!(
            ranked,
            vec![
                (1, "Malee".to_string()),
                (2, "Pim".to_string()),
                (2, "Somchai".to_string()),
                (3, "Anan".to_string()),
                (4, "Niran".to_string()),
            ]
        );
    }
}
