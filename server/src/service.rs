use crate::{auth::AdminContext, config::Config, error::AppError, store::SheetStore};
use chrono::NaiveDateTime;
use shared::{
    audit::parse_log,
    fsm::{GrantEvent, GrantStage},
    gate::{Decision, Gate, GrantPlan, GrantRequest},
    protocol::{GrantOutcome, Standings},
    rank::{project, search},
    schema::RosterSchema,
    score::ScorePolicy,
    sheet::a1_cell,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Reads standings from, and applies grants to, the configured spreadsheet.
pub struct LeaderboardService {
    store: Arc<dyn SheetStore>,
    roster_sheet: String,
    audit_sheet: String,
    policy: ScorePolicy,
    gate: Gate,
}

impl LeaderboardService {
    pub fn new(
        store: Arc<dyn SheetStore>,
        roster_sheet: impl Into<String>,
        audit_sheet: impl Into<String>,
        schema: RosterSchema,
        policy: ScorePolicy,
        override_code: Option<String>,
    ) -> Self {
        Self {
            store,
            roster_sheet: roster_sheet.into(),
            audit_sheet: audit_sheet.into(),
            policy,
            gate: Gate::new(schema, override_code),
        }
    }

    pub fn from_config(store: Arc<dyn SheetStore>, config: &Config) -> Self {
        Self::new(
            store,
            config.roster_sheet.clone(),
            config.audit_sheet.clone(),
            config.schema.clone(),
            config.score_policy,
            config.override_code.clone(),
        )
    }

    pub fn schema(&self) -> &RosterSchema {
        &self.gate.schema
    }

    /// Check the live roster header and the audit sheet before serving.
    pub async fn verify_schema(&self) -> Result<(), AppError> {
        let roster = self.store.read_table(&self.roster_sheet).await?;
        self.gate.schema.validate(&roster.header)?;
        self.store.read_grid(&self.audit_sheet).await?;
        info!(
            "Roster {} has {} rows and {} activity columns",
            self.roster_sheet,
            roster.rows.len(),
            self.gate.schema.activity_columns(&roster.header).len()
        );
        Ok(())
    }

    pub async fn standings(&self, query: Option<&str>) -> Result<Standings, AppError> {
        let roster = self.store.read_table(&self.roster_sheet).await?;
        let entries = project(&roster, &self.gate.schema, self.policy);
        let entries = match query {
            Some(q) => search(&entries, q),
            None => entries,
        };
        Ok(Standings {
            entries,
            activities: self.gate.schema.activity_labels(&roster.header),
        })
    }

    /// Check, write, and log one grant.
    ///
    /// The roster cell is written before the audit row. If the audit append
    /// fails the cell is put back to its previous value.
    pub async fn grant(
        &self,
        ctx: &AdminContext,
        request: &GrantRequest,
        now: NaiveDateTime,
    ) -> Result<GrantOutcome, AppError> {
        let roster = self.store.read_table(&self.roster_sheet).await?;
        let log = parse_log(&self.store.read_grid(&self.audit_sheet).await?);

        let plan = match self.gate.plan(request, &ctx.admin, now, &roster, &log)? {
            Decision::Refused(refusal) => {
                info!(
                    "Refused grant by {} for {} / {}: already logged at {}",
                    ctx.admin,
                    request.student.trim(),
                    request.activity.trim(),
                    refusal.existing().timestamp
                );
                return Ok(GrantOutcome::Refused { refusal });
            }
            Decision::Proceed(plan) => plan,
        };
        self.apply(plan).await
    }

    async fn apply(&self, plan: GrantPlan) -> Result<GrantOutcome, AppError> {
        let GrantPlan {
            cell,
            previous,
            updated,
            record,
            stage,
        } = plan;
        let address = a1_cell(&self.roster_sheet, cell);
        info!(
            "Grant by {}: {} +{} on {} ({:?})",
            record.admin, record.student, record.points, record.activity, stage
        );

        self.store
            .write_cell(&self.roster_sheet, cell, updated)
            .await?;
        let stage = step(stage, GrantEvent::CellWritten);
        info!("Wrote {} -> {} at {} ({:?})", previous, updated, address, stage);

        match self
            .store
            .append_row(&self.audit_sheet, record.to_row())
            .await
        {
            Ok(()) => {
                let stage = step(stage, GrantEvent::AuditAppended);
                info!("Logged grant for {} on {} ({:?})", record.student, record.activity, stage);
                Ok(GrantOutcome::Applied {
                    record,
                    previous,
                    updated,
                })
            }
            Err(source) => {
                warn!("Audit append failed after writing {}: {}", address, source);
                match self
                    .store
                    .write_cell(&self.roster_sheet, cell, previous)
                    .await
                {
                    Ok(()) => {
                        let stage = step(stage, GrantEvent::AuditFailed);
                        warn!("Restored {} to {} ({:?})", address, previous, stage);
                        Err(AppError::AuditRolledBack {
                            cell: address,
                            value: previous,
                            source,
                        })
                    }
                    Err(restore) => {
                        error!(
                            "Could not restore {} to {}: {}; roster and audit log disagree",
                            address, previous, restore
                        );
                        Err(AppError::AuditDiverged {
                            cell: address,
                            value: previous,
                            source,
                        })
                    }
                }
            }
        }
    }
}

fn step(stage: GrantStage, event: GrantEvent) -> GrantStage {
    match stage.advance(&event) {
        Ok(next) => next,
        Err(stuck) => {
            warn!("Grant stage {:?} does not accept {:?}", stuck, event);
            stuck
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use shared::{
        audit::{parse_timestamp, AuditStatus, AUDIT_HEADER},
        gate::{GrantError, Refusal},
        sheet::CellRef,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    const ROSTER: &str = "Leaderboard";
    const LOG: &str = "Log";

    fn schema() -> RosterSchema {
        RosterSchema {
            name_column: 0,
            score_column: 3,
            exp_column: 4,
            medal_column: 5,
            activity_marker: "day".to_string(),
        }
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn seeded() -> MemoryStore {
        MemoryStore::new()
            .with_sheet(
                ROSTER,
                vec![
                    row(&["Name", "Day 05", "Day 10", "Score", "EXP", "Medal"]),
                    row(&["Alice", "2", "", "12", "3", "Gold"]),
                    row(&["Somchai", "", "", "7", "1", ""]),
                ],
            )
            .with_sheet(LOG, vec![AUDIT_HEADER.iter().map(|s| s.to_string()).collect()])
    }

    fn service(store: Arc<dyn SheetStore>, code: Option<&str>) -> LeaderboardService {
        LeaderboardService::new(
            store,
            ROSTER,
            LOG,
            schema(),
            ScorePolicy::ZeroFill,
            code.map(String::from),
        )
    }

    fn admin() -> AdminContext {
        AdminContext {
            admin: "kru_a".to_string(),
        }
    }

    fn now() -> NaiveDateTime {
        parse_timestamp("2026-10-16 10:00:00").unwrap()
    }

    fn request(student: &str, activity: &str, points: u64) -> GrantRequest {
        GrantRequest {
            student: student.to_string(),
            activity: activity.to_string(),
            points,
            override_code: None,
        }
    }

    /// Memory store whose audit appends can be switched off.
    struct FlakyLog {
        inner: MemoryStore,
        fail_append: AtomicBool,
        fail_restore: AtomicBool,
        writes: std::sync::Mutex<usize>,
    }

    #[async_trait]
    impl SheetStore for FlakyLog {
        async fn read_grid(&self, sheet: &str) -> Result<Vec<Vec<String>>, StoreError> {
            self.inner.read_grid(sheet).await
        }

        async fn write_cell(&self, sheet: &str, at: CellRef, value: u64) -> Result<(), StoreError> {
            let n = {
                let mut writes = self.writes.lock().unwrap();
                *writes += 1;
                *writes
            };
            if n > 1 && self.fail_restore.load(Ordering::SeqCst) {
                return Err(StoreError::Malformed("restore refused".into()));
            }
            self.inner.write_cell(sheet, at, value).await
        }

        async fn append_row(&self, sheet: &str, row: Vec<String>) -> Result<(), StoreError> {
            if self.fail_append.load(Ordering::SeqCst) {
                return Err(StoreError::Status {
                    status: 503,
                    body: "backend unavailable".into(),
                });
            }
            self.inner.append_row(sheet, row).await
        }
    }

    #[tokio::test]
    async fn test_standings() {
        let svc = service(Arc::new(seeded()), None);
        let standings = svc.standings(None).await.unwrap();
        assert_eq!(standings.activities, vec!["Day 05", "Day 10"]);
        assert_eq!(standings.entries[0].name, "Alice");
        assert_eq!(standings.entries[0].rank, 1);
        assert_eq!(standings.entries[1].rank, 2);

        let filtered = svc.standings(Some("som")).await.unwrap();
        assert_eq!(filtered.entries.len(), 1);
        assert_eq!(filtered.entries[0].rank, 2);
    }

    #[tokio::test]
    async fn test_verify_schema() {
        let svc = service(Arc::new(seeded()), None);
        svc.verify_schema().await.unwrap();

        let wrong = LeaderboardService::new(
            Arc::new(seeded()),
            ROSTER,
            LOG,
            RosterSchema::default(),
            ScorePolicy::ZeroFill,
            None,
        );
        assert!(matches!(wrong.verify_schema().await, Err(AppError::Schema(_))));

        let no_log = service(Arc::new(MemoryStore::new().with_sheet(ROSTER, seeded().grid(ROSTER).unwrap())), None);
        assert!(matches!(no_log.verify_schema().await, Err(AppError::Store(_))));
    }

    #[tokio::test]
    async fn test_grant_writes_one_cell_and_one_log_row() {
        let store = Arc::new(seeded());
        let before = store.grid(ROSTER).unwrap();
        let svc = service(store.clone(), None);

        let outcome = svc
            .grant(&admin(), &request("Somchai", "Day 10", 5), now())
            .await
            .unwrap();
        match outcome {
            GrantOutcome::Applied { previous, updated, ref record } => {
                assert_eq!((previous, updated), (0, 5));
                assert_eq!(record.status, AuditStatus::Granted);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let after = store.grid(ROSTER).unwrap();
        let mut changed = Vec::new();
        for (r, (old, new)) in before.iter().zip(after.iter()).enumerate() {
            for c in 0..old.len().max(new.len()) {
                let o = old.get(c).map(String::as_str).unwrap_or("");
                let n = new.get(c).map(String::as_str).unwrap_or("");
                if o != n {
                    changed.push((r, c, n.to_string()));
                }
            }
        }
        assert_eq!(changed, vec![(2, 2, "5".to_string())]);

        let log = store.grid(LOG).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1][1..], row(&["kru_a", "Somchai", "5", "Day 10", "granted"])[..]);
    }

    #[tokio::test]
    async fn test_second_grant_same_day_refused() {
        let store = Arc::new(seeded());
        let svc = service(store.clone(), None);
        let req = request("Alice", "Day 05", 3);

        let first = svc.grant(&admin(), &req, now()).await.unwrap();
        assert!(matches!(first, GrantOutcome::Applied { updated: 5, .. }));
        let roster_after_first = store.grid(ROSTER).unwrap();

        let second = svc.grant(&admin(), &req, now()).await.unwrap();
        assert!(matches!(
            second,
            GrantOutcome::Refused {
                refusal: Refusal::Duplicate { .. }
            }
        ));
        assert_eq!(store.grid(ROSTER).unwrap(), roster_after_first);
        assert_eq!(store.grid(LOG).unwrap().len(), 2);

        let tomorrow = parse_timestamp("2026-10-17 08:00:00").unwrap();
        let third = svc.grant(&admin(), &req, tomorrow).await.unwrap();
        assert!(matches!(third, GrantOutcome::Applied { updated: 8, .. }));
    }

    #[tokio::test]
    async fn test_override_is_logged_distinctly() {
        let store = Arc::new(seeded());
        let svc = service(store.clone(), Some("1234"));
        let mut req = request("Alice", "Day 05", 1);
        svc.grant(&admin(), &req, now()).await.unwrap();

        req.override_code = Some("1234".to_string());
        let outcome = svc.grant(&admin(), &req, now()).await.unwrap();
        assert!(matches!(outcome, GrantOutcome::Applied { updated: 4, .. }));
        let log = store.grid(LOG).unwrap();
        assert_eq!(log[2][5], "override");
    }

    #[tokio::test]
    async fn test_lookup_failure_writes_nothing() {
        let store = Arc::new(seeded());
        let svc = service(store.clone(), None);
        let err = svc
            .grant(&admin(), &request("Nobody", "Day 05", 1), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Grant(_)));
        assert_eq!(store.grid(ROSTER), seeded().grid(ROSTER));
        assert_eq!(store.grid(LOG).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_activity_writes_nothing() {
        let grid = vec![
            row(&["Name", "Day 05", "Day 05", "Score", "EXP", "Medal"]),
            row(&["Alice", "2", "", "12", "3", "Gold"]),
        ];
        let store = Arc::new(
            MemoryStore::new()
                .with_sheet(ROSTER, grid.clone())
                .with_sheet(LOG, vec![AUDIT_HEADER.iter().map(|s| s.to_string()).collect()]),
        );
        let svc = service(store.clone(), None);
        let err = svc
            .grant(&admin(), &request("Alice", "Day 05", 1), now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Grant(GrantError::AmbiguousActivity { count: 2, .. })
        ));
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
        assert_eq!(store.grid(ROSTER), Some(grid));
        assert_eq!(store.grid(LOG).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_audit_restores_cell() {
        let store = Arc::new(FlakyLog {
            inner: seeded(),
            fail_append: AtomicBool::new(true),
            fail_restore: AtomicBool::new(false),
            writes: Default::default(),
        });
        let svc = service(store.clone(), None);
        let err = svc
            .grant(&admin(), &request("Alice", "Day 05", 4), now())
            .await
            .unwrap_err();
        match err {
            AppError::AuditRolledBack { cell, value, .. } => {
                assert_eq!(cell, "'Leaderboard'!B2");
                assert_eq!(value, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(store.inner.grid(ROSTER), seeded().grid(ROSTER));
        assert_eq!(store.inner.grid(LOG).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_restore_reports_divergence() {
        let store = Arc::new(FlakyLog {
            inner: seeded(),
            fail_append: AtomicBool::new(true),
            fail_restore: AtomicBool::new(true),
            writes: Default::default(),
        });
        let svc = service(store.clone(), None);
        let err = svc
            .grant(&admin(), &request("Alice", "Day 05", 4), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuditDiverged { value: 2, .. }));
        assert_eq!(store.inner.grid(ROSTER).unwrap()[1][1], "6");
    }
}
