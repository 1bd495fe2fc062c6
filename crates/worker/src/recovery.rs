use chrono::Utc;
use db::models::task::Task;

use crate::runner::{RunnerError, WorkerContext, process_message};

const PENDING_BATCH_SIZE: usize = 50;
const MAX_PENDING_AGE_MS: i64 = 60_000;

/// §4.8: run once on worker startup, before entering the main read loop.
/// Walks the consumer's pending-entries list, drops anything stale, zombie
/// resets anything still `PROCESSING`, and replays the rest through the
/// normal lifecycle with a mandatory idempotent claim.
pub async fn recover_pending(
    ctx: &WorkerContext,
    stream_key: &str,
    group: &str,
    consumer: &str,
) -> Result<(), RunnerError> {
    let pending = ctx
        .stream
        .read_pending(stream_key, group, consumer, PENDING_BATCH_SIZE)
        .await?;

    let now_millis = Utc::now().timestamp_millis();

    for delivery in pending {
        let age = delivery.timestamp_millis().map(|ts| now_millis - ts);
        if age.is_none_or(|age| age > MAX_PENDING_AGE_MS) {
            tracing::warn!(id = %delivery.id, "dropping expired pending entry");
            ctx.stream.ack(stream_key, group, &delivery.id).await?;
            continue;
        }

        if let Ok(envelope) = delivery.decode() {
            Task::reset_zombie_to_pending(&ctx.pool, envelope.task_id).await?;
        }

        process_message(ctx, stream_key, group, delivery, true).await?;
    }

    Ok(())
}
