use db::models::conversation::Conversation;
use db::models::task::Task;
use sqlx::PgPool;
use uuid::Uuid;

/// §4.6: the only two writers of a terminal task status. `mark_failed` and
/// `finish_success` both refresh `updated_at`; success additionally touches
/// the owning conversation so `GET /v1/conversations?limit=N` reflects
/// recency of activity, not just creation.
pub async fn process_ai_result(
    pool: &PgPool,
    task_id: Uuid,
    text: &str,
    cost: f64,
    conversation_id: Uuid,
    refusal_keywords: &[&str],
) -> Result<bool, sqlx::Error> {
    if let Some(hit) = refusal_keywords.iter().find(|kw| text.contains(**kw)) {
        tracing::info!(%task_id, keyword = *hit, "refusal keyword matched, marking failed");
        Task::mark_failed(pool, task_id, &format!("生成失败: {text}")).await?;
        return Ok(false);
    }

    Task::finish_success(pool, task_id, text, cost).await?;
    Conversation::touch(pool, conversation_id).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    #[test]
    fn refusal_substring_matching_is_case_sensitive_literal() {
        let keywords = ["无法为您创建任何图片"];
        let text = "抱歉，无法为您创建任何图片，请换个描述";
        assert!(keywords.iter().any(|kw| text.contains(kw)));
    }
}
