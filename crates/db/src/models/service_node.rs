use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    Healthy,
    Degraded,
    Offline,
    RateLimited,
}

/// One row per backend inference node, shared across provider families via
/// the `family_id` discriminator (§3 ServiceNode: "one table per provider
/// family... others follow analogously" — modeled here as one generic table
/// rather than N duplicated tables, see DESIGN.md).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ServiceNode {
    pub node_url: String,
    pub family_id: String,
    pub status: NodeStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub current_tasks: i32,
    pub dispatched_tasks: i16,
}

impl ServiceNode {
    /// §4.2: up to ten alive family members ordered by current load,
    /// ascending, for dispatcher pre-selection.
    pub async fn alive_candidates(
        pool: &PgPool,
        family_id: &str,
    ) -> Result<Vec<ServiceNode>, sqlx::Error> {
        sqlx::query_as::<_, ServiceNode>(
            "SELECT node_url, family_id, status, last_heartbeat, current_tasks, dispatched_tasks
             FROM service_nodes
             WHERE family_id = $1 AND status = 'HEALTHY' AND last_heartbeat > now() - interval '30 seconds'
             ORDER BY current_tasks ASC
             LIMIT 10",
        )
        .bind(family_id)
        .fetch_all(pool)
        .await
    }

    /// §4.4 step 1: candidates the router may route fresh traffic to —
    /// healthy, fresh heartbeat, and currently idle on both counters.
    pub async fn routable_candidates(
        pool: &PgPool,
        family_id: &str,
    ) -> Result<Vec<ServiceNode>, sqlx::Error> {
        sqlx::query_as::<_, ServiceNode>(
            "SELECT node_url, family_id, status, last_heartbeat, current_tasks, dispatched_tasks
             FROM service_nodes
             WHERE family_id = $1
               AND status = 'HEALTHY'
               AND last_heartbeat > now() - interval '30 seconds'
               AND dispatched_tasks = 0
               AND current_tasks = 0",
        )
        .bind(family_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_url(
        pool: &PgPool,
        node_url: &str,
    ) -> Result<Option<ServiceNode>, sqlx::Error> {
        sqlx::query_as::<_, ServiceNode>(
            "SELECT node_url, family_id, status, last_heartbeat, current_tasks, dispatched_tasks
             FROM service_nodes WHERE node_url = $1",
        )
        .bind(node_url)
        .fetch_optional(pool)
        .await
    }

    /// §4.7 CAS-claim: the only writer that may move `dispatched_tasks`
    /// 0 -> 1. Returns `true` iff exactly one row was affected.
    pub async fn cas_claim(pool: &PgPool, node_url: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE service_nodes SET dispatched_tasks = 1
             WHERE node_url = $1 AND dispatched_tasks = 0",
        )
        .bind(node_url)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// §4.7 release: `delta` is `-1` on every worker exit path. Clamped at
    /// zero so a stray double-release can't go negative (invariant 4).
    pub async fn release(pool: &PgPool, node_url: &str, delta: i16) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE service_nodes
             SET dispatched_tasks = GREATEST(0, dispatched_tasks + $2)
             WHERE node_url = $1",
        )
        .bind(node_url)
        .bind(delta)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn increment_current_tasks(
        pool: &PgPool,
        node_url: &str,
        delta: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE service_nodes SET current_tasks = GREATEST(0, current_tasks + $2)
             WHERE node_url = $1",
        )
        .bind(node_url)
        .bind(delta)
        .execute(pool)
        .await?;
        Ok(())
    }
}
