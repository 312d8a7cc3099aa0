use crate::schema::RosterSchema;
use crate::score::{cell_points, ScorePolicy};
use crate::sheet::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Bound::{Excluded, Unbounded};

/// One card on the leaderboard.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RankEntry {
    pub rank: u32,
    pub name: String,
    pub score: u64,
    pub exp: u64,
    pub medal: String,
}

/// Dense rank for each score, descending: ties share a rank and the next
/// distinct score is exactly one lower in standing.
pub fn dense_ranks(scores: &[u64]) -> Vec<u32> {
    let distinct: BTreeSet<u64> = scores.iter().copied().collect();
    scores
        .iter()
        .map(|&score| 1 + distinct.range((Excluded(score), Unbounded)).count() as u32)
        .collect()
}

/// Project a roster snapshot into ordered standings.
///
/// Rows without a name are skipped. Rows whose score is unreadable are ranked
/// at zero or left out, according to `policy`. The result is ordered by rank,
/// then by name.
pub fn project(table: &Table, schema: &RosterSchema, policy: ScorePolicy) -> Vec<RankEntry> {
    let mut rows: Vec<(String, u64, u64, String)> = Vec::with_capacity(table.rows.len());
    for row in 0..table.rows.len() {
        let name = table.cell(row, schema.name_column).trim();
        if name.is_empty() {
            continue;
        }
        let Some(score) = policy.apply(table.cell(row, schema.score_column)) else {
            continue;
        };
        rows.push((
            name.to_string(),
            score,
            cell_points(table.cell(row, schema.exp_column)),
            table.cell(row, schema.medal_column).trim().to_string(),
        ));
    }

    let scores: Vec<u64> = rows.iter().map(|r| r.1).collect();
    let mut entries: Vec<RankEntry> = rows
        .into_iter()
        .zip(dense_ranks(&scores))
        .map(|((name, score, exp, medal), rank)| RankEntry {
            rank,
            name,
            score,
            exp,
            medal,
        })
        .collect();
    entries.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));
    entries
}

/// Filter ranked entries by a case-insensitive match on name or medal.
/// Entries keep the rank they hold on the full board.
pub fn search(entries: &[RankEntry], query: &str) -> Vec<RankEntry> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return entries.to_vec();
    }
    entries
        .iter()
        .filter(|e| {
            e.name.to_lowercase().contains(&needle) || e.medal.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}
