use db::models::service_node::ServiceNode;
use families::FamilyConfig;
use rand::seq::SliceRandom;
use sqlx::PgPool;

/// §4.2: load-aware bounded random sampling. Queries up to ten alive family
/// members ordered by `current_tasks` ascending, then samples `concurrency`
/// of them — without replacement once there are enough candidates, with
/// replacement otherwise. A family with no node pool (or with none alive)
/// yields `concurrency` nulls; the worker self-routes via the Router.
pub async fn select_nodes(
    pool: &PgPool,
    family: &FamilyConfig,
    concurrency: u32,
) -> Result<Vec<Option<String>>, sqlx::Error> {
    if !family.has_node_pool {
        return Ok(vec![None; concurrency as usize]);
    }

    let candidates = ServiceNode::alive_candidates(pool, family.id.as_str()).await?;
    if candidates.is_empty() {
        return Ok(vec![None; concurrency as usize]);
    }

    let mut rng = rand::thread_rng();
    let n = concurrency as usize;

    let picked: Vec<String> = if candidates.len() >= n {
        candidates
            .choose_multiple(&mut rng, n)
            .map(|node| node.node_url.clone())
            .collect()
    } else {
        (0..n)
            .map(|_| candidates.choose(&mut rng).unwrap().node_url.clone())
            .collect()
    };

    Ok(picked.into_iter().map(Some).collect())
}
