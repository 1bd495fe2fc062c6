//! Provider-family configuration.
//!
//! The dispatcher, router and worker all need to know, for a given model
//! identifier: which Redis stream it travels on, whether it participates in
//! the node pool (and under what concurrency policy), which refusal
//! keywords mark a 200-response as a soft rejection, and what timeout to
//! give the backend call. Rather than scattering `if model.contains("gemini")`
//! across three crates, that branching happens once here, at family
//! resolution, and every other crate works off the resulting `FamilyConfig`.

use std::time::Duration;

/// Identifies one backend provider family. `Other` covers any model name
/// that doesn't match a known family; it still gets a stream (falls back to
/// gemini's) but never participates in node pre-selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FamilyId {
    Gemini,
    Qwen,
    DeepSeek,
    StableDiffusion,
}

impl FamilyId {
    pub fn as_str(self) -> &'static str {
        match self {
            FamilyId::Gemini => "gemini",
            FamilyId::Qwen => "qwen",
            FamilyId::DeepSeek => "deepseek",
            FamilyId::StableDiffusion => "stable_diffusion",
        }
    }
}

/// How many node slots a dispatch of this family should fan out to.
#[derive(Debug, Clone, Copy)]
pub enum ConcurrencyPolicy {
    /// Always exactly `n` slots.
    Fixed(u32),
    /// The caller-requested concurrency is clamped to `[min, max]`.
    Clamped { min: u32, max: u32 },
}

impl ConcurrencyPolicy {
    pub fn resolve(self, requested: Option<u32>) -> u32 {
        match self {
            ConcurrencyPolicy::Fixed(n) => n,
            ConcurrencyPolicy::Clamped { min, max } => requested.unwrap_or(min).clamp(min, max),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FamilyConfig {
    pub id: FamilyId,
    pub stream_key: &'static str,
    /// Whether this family has rows in the shared `service_nodes` table and
    /// participates in dispatcher pre-selection / router CAS-claim.
    pub has_node_pool: bool,
    pub refusal_keywords: &'static [&'static str],
    pub request_timeout: Duration,
    pub concurrency_policy: ConcurrencyPolicy,
}

const GEMINI_REFUSALS: &[&str] = &[
    "无法为您创建任何图片",
    "无法满足该请求",
    "我不能生成",
    "抱歉，我无法",
];

const DEFAULT_STREAM: &str = "gemini_stream";

/// Every known family's configuration, in resolution order. Exposed so the
/// worker binary can spawn one consumer per stream without hand-maintaining
/// a second list of stream keys.
pub fn registry() -> [FamilyConfig; 4] {
    [
        FamilyConfig {
            id: FamilyId::Gemini,
            stream_key: "gemini_stream",
            has_node_pool: true,
            refusal_keywords: GEMINI_REFUSALS,
            request_timeout: Duration::from_secs(120),
            concurrency_policy: ConcurrencyPolicy::Clamped { min: 1, max: 2 },
        },
        FamilyConfig {
            id: FamilyId::Qwen,
            stream_key: "qwen_stream",
            has_node_pool: false,
            refusal_keywords: &[],
            request_timeout: Duration::from_secs(120),
            concurrency_policy: ConcurrencyPolicy::Fixed(1),
        },
        FamilyConfig {
            id: FamilyId::DeepSeek,
            stream_key: "deepseek_stream",
            has_node_pool: false,
            refusal_keywords: &[],
            request_timeout: Duration::from_secs(300),
            concurrency_policy: ConcurrencyPolicy::Fixed(1),
        },
        FamilyConfig {
            id: FamilyId::StableDiffusion,
            stream_key: "sd_stream",
            has_node_pool: false,
            refusal_keywords: &[],
            request_timeout: Duration::from_secs(120),
            concurrency_policy: ConcurrencyPolicy::Fixed(1),
        },
    ]
}

/// Resolves a user-supplied model identifier to its family configuration by
/// case-insensitive substring match (§6.2). Falls back to the Gemini
/// stream key (but *not* the Gemini node pool) when nothing matches.
pub fn resolve(model_name: &str) -> FamilyConfig {
    let lower = model_name.to_lowercase();

    for family in registry() {
        let matches = match family.id {
            FamilyId::Gemini => lower.contains("gemini"),
            FamilyId::Qwen => lower.contains("qwen") || lower.contains("千问"),
            FamilyId::DeepSeek => lower.contains("deepseek"),
            FamilyId::StableDiffusion => lower.contains("sd") || lower.contains("stable"),
        };
        if matches {
            return family;
        }
    }

    FamilyConfig {
        id: FamilyId::Gemini,
        stream_key: DEFAULT_STREAM,
        has_node_pool: false,
        refusal_keywords: &[],
        request_timeout: Duration::from_secs(120),
        concurrency_policy: ConcurrencyPolicy::Fixed(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_gemini_case_insensitively() {
        let f = resolve("Gemini-2.5-Flash");
        assert_eq!(f.stream_key, "gemini_stream");
        assert!(f.has_node_pool);
    }

    #[test]
    fn resolves_qwen_by_chinese_alias() {
        assert_eq!(resolve("千问-7b").stream_key, "qwen_stream");
    }

    #[test]
    fn resolves_deepseek_with_longer_timeout() {
        let f = resolve("deepseek-chat");
        assert_eq!(f.request_timeout, Duration::from_secs(300));
    }

    #[test]
    fn resolves_stable_diffusion_aliases() {
        assert_eq!(resolve("stable-diffusion-xl").stream_key, "sd_stream");
        assert_eq!(resolve("sd-turbo").stream_key, "sd_stream");
    }

    #[test]
    fn unknown_model_falls_back_to_gemini_stream_without_node_pool() {
        let f = resolve("llama-3-70b");
        assert_eq!(f.stream_key, "gemini_stream");
        assert!(!f.has_node_pool);
    }

    #[test]
    fn gemini_concurrency_clamps_into_range() {
        let policy = ConcurrencyPolicy::Clamped { min: 1, max: 2 };
        assert_eq!(policy.resolve(Some(0)), 1);
        assert_eq!(policy.resolve(Some(5)), 2);
        assert_eq!(policy.resolve(None), 1);
    }
}
