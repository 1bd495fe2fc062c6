pub mod audit;
pub mod backend;
pub mod context;
pub mod node_lock;
pub mod recovery;
pub mod runner;

pub use runner::{RunnerError, WorkerContext, process_message};

const READ_BATCH_SIZE: usize = 10;
const BLOCK_MS: usize = 2_000;

/// Drives one consumer against one stream/group forever (§5 Suspension
/// points: a bounded block read is the only wait, so housekeeping — none
/// needed here beyond logging — still gets a chance to run every tick).
/// Broker unreachability is logged and backed off rather than propagated,
/// matching §7's "sleep 5s and retry" fatal/recoverable split.
pub async fn run_consumer(
    ctx: WorkerContext,
    stream_key: &str,
    group: &str,
    consumer: &str,
) -> ! {
    if let Err(e) = ctx.stream.ensure_group(stream_key, group).await {
        tracing::error!(error = %e, stream_key, group, "failed to ensure consumer group, retrying loop will keep trying");
    }

    if let Err(e) = recovery::recover_pending(&ctx, stream_key, group, consumer).await {
        tracing::error!(error = %e, "pending-entries recovery failed");
    }

    loop {
        match ctx
            .stream
            .read_new(stream_key, group, consumer, READ_BATCH_SIZE, BLOCK_MS)
            .await
        {
            Ok(deliveries) => {
                for delivery in deliveries {
                    if let Err(e) =
                        runner::process_message(&ctx, stream_key, group, delivery, false).await
                    {
                        tracing::error!(error = %e, "message processing failed, leaving unacked for recovery");
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, stream_key, "broker read failed, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
        }
    }
}
