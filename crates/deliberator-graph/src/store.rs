//! Decision-graph store: SQLite-backed persistence for decision nodes,
//! participant stances, and similarity edges.

use crate::entities::{DecisionNode, DecisionSimilarity, ParticipantStance};
use crate::error::{GraphError, GraphResult};
use crate::migration_runner::MigrationRunner;
use crate::migration_types::Migration;
use crate::path::resolve_db_path;
use crate::pool::{DatabasePool, PoolConfig};
use chrono::{DateTime, Duration, Utc};
use deliberator_core::{ConvergenceStatus, DecisionId};
use sqlx::Row;
use tracing::{instrument, warn};

const SCHEMA_MIGRATION_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS decision_nodes (
    id TEXT PRIMARY KEY,
    question TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    consensus TEXT NOT NULL,
    winning_option TEXT,
    convergence_status TEXT NOT NULL,
    participants TEXT NOT NULL,
    transcript_path TEXT NOT NULL,
    metadata TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_decision_nodes_timestamp ON decision_nodes(timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_decision_nodes_question ON decision_nodes(question);

CREATE TABLE IF NOT EXISTS participant_stances (
    decision_id TEXT NOT NULL REFERENCES decision_nodes(id),
    participant TEXT NOT NULL,
    vote_option TEXT,
    confidence REAL,
    rationale TEXT,
    final_position TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_participant_stances_decision_id ON participant_stances(decision_id);

CREATE TABLE IF NOT EXISTS decision_similarities (
    source_id TEXT NOT NULL REFERENCES decision_nodes(id),
    target_id TEXT NOT NULL REFERENCES decision_nodes(id),
    score REAL NOT NULL,
    computed_at TEXT NOT NULL,
    PRIMARY KEY (source_id, target_id),
    CHECK (source_id != target_id),
    CHECK (score >= 0.0 AND score <= 1.0)
);
CREATE INDEX IF NOT EXISTS idx_decision_similarities_source ON decision_similarities(source_id);
CREATE INDEX IF NOT EXISTS idx_decision_similarities_score ON decision_similarities(score DESC);
"#;

/// Per-table row counts, storage footprint, and integrity signals.
#[derive(Debug, Clone)]
pub struct GraphHealth {
    pub decision_count: i64,
    pub stance_count: i64,
    pub similarity_count: i64,
    pub db_size_bytes: u64,
    pub orphan_stances: i64,
    pub invalid_scores: i64,
    pub decisions_in_window: i64,
}

pub struct DecisionGraphStore {
    pool: DatabasePool,
}

impl DecisionGraphStore {
    #[instrument(skip(db_path), fields(path = %db_path))]
    pub async fn open(db_path: &str) -> GraphResult<Self> {
        let resolved = resolve_db_path(db_path);
        let resolved_str = resolved.to_string_lossy().to_string();

        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    GraphError::Validation {
                        message: format!("could not create db directory {:?}: {e}", parent),
                    }
                })?;
            }
        }

        let pool_config = PoolConfig::builder()
            .database_path(resolved_str)
            .create_if_missing(true)
            .build()
            .map_err(GraphError::from)?;

        Self::with_pool_config(pool_config).await
    }

    pub async fn in_memory() -> GraphResult<Self> {
        Self::with_pool_config(PoolConfig::in_memory()).await
    }

    async fn with_pool_config(pool_config: PoolConfig) -> GraphResult<Self> {
        let pool = DatabasePool::new(pool_config).await?;

        let mut runner = MigrationRunner::new(pool.pool().clone());
        runner.add_migration(Migration::new(
            SCHEMA_MIGRATION_VERSION,
            "decision_graph_schema",
            SCHEMA_SQL,
        ));
        runner.run().await?;

        Ok(Self { pool })
    }

    #[instrument(skip(self, node))]
    pub async fn insert_decision_node(&self, node: &DecisionNode) -> GraphResult<()> {
        let participants_json = serde_json::to_string(&node.participants)?;
        let metadata_json = serde_json::to_string(&node.metadata)?;
        let status_str = convergence_status_to_str(node.convergence_status);

        let mut tx = self.pool.pool().begin().await?;
        sqlx::query(
            "INSERT INTO decision_nodes
             (id, question, timestamp, consensus, winning_option, convergence_status,
              participants, transcript_path, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(node.id.to_string())
        .bind(&node.question)
        .bind(node.timestamp)
        .bind(&node.consensus)
        .bind(&node.winning_option)
        .bind(status_str)
        .bind(participants_json)
        .bind(&node.transcript_path)
        .bind(metadata_json)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(())
    }

    #[instrument(skip(self, stance))]
    pub async fn insert_stance(&self, stance: &ParticipantStance) -> GraphResult<()> {
        let mut tx = self.pool.pool().begin().await?;
        sqlx::query(
            "INSERT INTO participant_stances
             (decision_id, participant, vote_option, confidence, rationale, final_position)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(stance.decision_id.to_string())
        .bind(&stance.participant)
        .bind(&stance.vote_option)
        .bind(stance.confidence)
        .bind(&stance.rationale)
        .bind(&stance.final_position)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(())
    }

    #[instrument(skip(self, similarity))]
    pub async fn upsert_similarity(&self, similarity: &DecisionSimilarity) -> GraphResult<()> {
        if similarity.source_id == similarity.target_id {
            return Err(GraphError::Validation {
                message: "similarity self-edges are forbidden".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&similarity.score) {
            return Err(GraphError::Validation {
                message: format!("similarity score {} out of [0,1]", similarity.score),
            });
        }

        let mut tx = self.pool.pool().begin().await?;
        sqlx::query(
            "INSERT INTO decision_similarities (source_id, target_id, score, computed_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(source_id, target_id) DO UPDATE SET
                score = excluded.score, computed_at = excluded.computed_at",
        )
        .bind(similarity.source_id.to_string())
        .bind(similarity.target_id.to_string())
        .bind(similarity.score)
        .bind(similarity.computed_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(())
    }

    pub async fn get_decision(&self, id: DecisionId) -> GraphResult<Option<DecisionNode>> {
        let row = sqlx::query(
            "SELECT id, question, timestamp, consensus, winning_option, convergence_status,
                    participants, transcript_path, metadata
             FROM decision_nodes WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(decision_node_from_row).transpose()
    }

    pub async fn list_recent(&self, limit: i64, offset: i64) -> GraphResult<Vec<DecisionNode>> {
        let rows = sqlx::query(
            "SELECT id, question, timestamp, consensus, winning_option, convergence_status,
                    participants, transcript_path, metadata
             FROM decision_nodes ORDER BY timestamp DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await?;

        rows.into_iter().map(decision_node_from_row).collect()
    }

    pub async fn list_stances(&self, decision_id: DecisionId) -> GraphResult<Vec<ParticipantStance>> {
        let rows = sqlx::query(
            "SELECT decision_id, participant, vote_option, confidence, rationale, final_position
             FROM participant_stances WHERE decision_id = ?",
        )
        .bind(decision_id.to_string())
        .fetch_all(self.pool.pool())
        .await?;

        rows.into_iter().map(stance_from_row).collect()
    }

    pub async fn list_similar(
        &self,
        source_id: DecisionId,
        threshold: f64,
        limit: i64,
    ) -> GraphResult<Vec<DecisionSimilarity>> {
        let rows = sqlx::query(
            "SELECT source_id, target_id, score, computed_at
             FROM decision_similarities
             WHERE source_id = ? AND score >= ?
             ORDER BY score DESC LIMIT ?",
        )
        .bind(source_id.to_string())
        .bind(threshold)
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await?;

        rows.into_iter().map(similarity_from_row).collect()
    }

    /// Maintenance/health surface: counts, size, orphan stances, invalid
    /// scores, and decision volume within `window`.
    pub async fn health(&self, window: Duration) -> GraphResult<GraphHealth> {
        let decision_count: i64 =
            sqlx::query("SELECT COUNT(*) as c FROM decision_nodes")
                .fetch_one(self.pool.pool())
                .await?
                .try_get("c")?;

        let stance_count: i64 =
            sqlx::query("SELECT COUNT(*) as c FROM participant_stances")
                .fetch_one(self.pool.pool())
                .await?
                .try_get("c")?;

        let similarity_count: i64 =
            sqlx::query("SELECT COUNT(*) as c FROM decision_similarities")
                .fetch_one(self.pool.pool())
                .await?
                .try_get("c")?;

        let orphan_stances: i64 = sqlx::query(
            "SELECT COUNT(*) as c FROM participant_stances ps
             WHERE NOT EXISTS (SELECT 1 FROM decision_nodes dn WHERE dn.id = ps.decision_id)",
        )
        .fetch_one(self.pool.pool())
        .await?
        .try_get("c")?;

        let invalid_scores: i64 = sqlx::query(
            "SELECT COUNT(*) as c FROM decision_similarities WHERE score < 0.0 OR score > 1.0",
        )
        .fetch_one(self.pool.pool())
        .await?
        .try_get("c")?;

        let since = Utc::now() - window;
        let decisions_in_window: i64 =
            sqlx::query("SELECT COUNT(*) as c FROM decision_nodes WHERE timestamp >= ?")
                .bind(since)
                .fetch_one(self.pool.pool())
                .await?
                .try_get("c")?;

        let db_size_bytes = match self.pool.config().database_path.as_str() {
            ":memory:" => 0,
            path => std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        };

        if orphan_stances > 0 {
            warn!(orphan_stances, "decision graph has orphaned stance rows");
        }
        if invalid_scores > 0 {
            warn!(invalid_scores, "decision graph has similarity rows outside [0,1]");
        }

        Ok(GraphHealth {
            decision_count,
            stance_count,
            similarity_count,
            db_size_bytes,
            orphan_stances,
            invalid_scores,
            decisions_in_window,
        })
    }
}

fn convergence_status_to_str(status: ConvergenceStatus) -> &'static str {
    match status {
        ConvergenceStatus::Converged => "converged",
        ConvergenceStatus::Impasse => "impasse",
        ConvergenceStatus::Refining => "refining",
        ConvergenceStatus::Diverging => "diverging",
        ConvergenceStatus::UnanimousConsensus => "unanimous_consensus",
        ConvergenceStatus::MajorityDecision => "majority_decision",
        ConvergenceStatus::Tie => "tie",
        ConvergenceStatus::Unknown => "unknown",
    }
}

fn convergence_status_from_str(s: &str) -> ConvergenceStatus {
    match s {
        "converged" => ConvergenceStatus::Converged,
        "impasse" => ConvergenceStatus::Impasse,
        "refining" => ConvergenceStatus::Refining,
        "diverging" => ConvergenceStatus::Diverging,
        "unanimous_consensus" => ConvergenceStatus::UnanimousConsensus,
        "majority_decision" => ConvergenceStatus::MajorityDecision,
        "tie" => ConvergenceStatus::Tie,
        _ => ConvergenceStatus::Unknown,
    }
}

fn decision_node_from_row(row: sqlx::sqlite::SqliteRow) -> GraphResult<DecisionNode> {
    let id_str: String = row.try_get("id")?;
    let participants_json: String = row.try_get("participants")?;
    let metadata_json: String = row.try_get("metadata")?;
    let status_str: String = row.try_get("convergence_status")?;
    let timestamp: DateTime<Utc> = row.try_get("timestamp")?;

    Ok(DecisionNode {
        id: DecisionId::parse(&id_str).map_err(|_| GraphError::Validation {
            message: format!("invalid decision id in store: {id_str}"),
        })?,
        question: row.try_get("question")?,
        timestamp,
        consensus: row.try_get("consensus")?,
        winning_option: row.try_get("winning_option")?,
        convergence_status: convergence_status_from_str(&status_str),
        participants: serde_json::from_str(&participants_json)?,
        transcript_path: row.try_get("transcript_path")?,
        metadata: serde_json::from_str(&metadata_json)?,
    })
}

fn stance_from_row(row: sqlx::sqlite::SqliteRow) -> GraphResult<ParticipantStance> {
    let decision_id_str: String = row.try_get("decision_id")?;

    Ok(ParticipantStance {
        decision_id: DecisionId::parse(&decision_id_str).map_err(|_| GraphError::Validation {
            message: format!("invalid decision id in store: {decision_id_str}"),
        })?,
        participant: row.try_get("participant")?,
        vote_option: row.try_get("vote_option")?,
        confidence: row.try_get("confidence")?,
        rationale: row.try_get("rationale")?,
        final_position: row.try_get("final_position")?,
    })
}

fn similarity_from_row(row: sqlx::sqlite::SqliteRow) -> GraphResult<DecisionSimilarity> {
    let source_str: String = row.try_get("source_id")?;
    let target_str: String = row.try_get("target_id")?;

    Ok(DecisionSimilarity {
        source_id: DecisionId::parse(&source_str).map_err(|_| GraphError::Validation {
            message: format!("invalid decision id in store: {source_str}"),
        })?,
        target_id: DecisionId::parse(&target_str).map_err(|_| GraphError::Validation {
            message: format!("invalid decision id in store: {target_str}"),
        })?,
        score: row.try_get("score")?,
        computed_at: row.try_get("computed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seeded_node(store: &DecisionGraphStore, question: &str) -> DecisionNode {
        let node = DecisionNode {
            id: DecisionId::new(),
            question: question.to_string(),
            timestamp: Utc::now(),
            consensus: "agreed".to_string(),
            winning_option: Some("A".to_string()),
            convergence_status: ConvergenceStatus::Converged,
            participants: vec!["opus@claude".to_string()],
            transcript_path: "transcripts/x.md".to_string(),
            metadata: json!({}),
        };
        store.insert_decision_node(&node).await.unwrap();
        node
    }

    #[tokio::test]
    async fn insert_and_get_decision_round_trips() {
        let store = DecisionGraphStore::in_memory().await.unwrap();
        let node = seeded_node(&store, "should we ship?").await;

        let fetched = store.get_decision(node.id).await.unwrap().unwrap();
        assert_eq!(fetched.question, "should we ship?");
        assert_eq!(fetched.winning_option.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn stance_insert_requires_existing_decision() {
        let store = DecisionGraphStore::in_memory().await.unwrap();
        let stance =
            ParticipantStance::new(DecisionId::new(), "opus@claude", None, None, None, "text");

        let result = store.insert_stance(&stance).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn self_edge_similarity_is_rejected() {
        let store = DecisionGraphStore::in_memory().await.unwrap();
        let node = seeded_node(&store, "q").await;

        let sim = DecisionSimilarity {
            source_id: node.id,
            target_id: node.id,
            score: 0.9,
            computed_at: Utc::now(),
        };

        let result = store.upsert_similarity(&sim).await;
        assert!(matches!(result, Err(GraphError::Validation { .. })));
    }

    #[tokio::test]
    async fn list_similar_filters_by_threshold_and_orders_desc() {
        let store = DecisionGraphStore::in_memory().await.unwrap();
        let a = seeded_node(&store, "a").await;
        let b = seeded_node(&store, "b").await;
        let c = seeded_node(&store, "c").await;

        store
            .upsert_similarity(&DecisionSimilarity {
                source_id: a.id,
                target_id: b.id,
                score: 0.9,
                computed_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .upsert_similarity(&DecisionSimilarity {
                source_id: a.id,
                target_id: c.id,
                score: 0.3,
                computed_at: Utc::now(),
            })
            .await
            .unwrap();

        let similar = store.list_similar(a.id, 0.5, 10).await.unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].target_id, b.id);
    }

    #[tokio::test]
    async fn health_reports_counts_and_no_orphans_on_clean_store() {
        let store = DecisionGraphStore::in_memory().await.unwrap();
        seeded_node(&store, "q").await;

        let health = store.health(Duration::days(7)).await.unwrap();
        assert_eq!(health.decision_count, 1);
        assert_eq!(health.orphan_stances, 0);
        assert_eq!(health.invalid_scores, 0);
        assert_eq!(health.decisions_in_window, 1);
    }
}
