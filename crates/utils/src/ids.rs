use uuid::Uuid;

/// Truncates `prompt` to its first `limit` Unicode scalar values, appending
/// `…` when truncation actually happened. Used to derive a conversation
/// title from the first user prompt.
pub fn truncate_title(prompt: &str, limit: usize) -> String {
    let mut chars = prompt.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

/// Builds a fresh random filename that preserves the original extension,
/// e.g. `photo.png` -> `3b1e...f0.png`. Extension-less inputs get no
/// extension back.
pub fn random_filename_preserving_ext(original_name: &str) -> String {
    let stem = Uuid::new_v4().simple().to_string();
    match original_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!("{stem}.{ext}"),
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_prompt_with_ellipsis() {
        let prompt = "a".repeat(25);
        let title = truncate_title(&prompt, 20);
        assert_eq!(title, format!("{}…", "a".repeat(20)));
    }

    #[test]
    fn leaves_short_prompt_untouched() {
        assert_eq!(truncate_title("hi", 20), "hi");
    }

    #[test]
    fn preserves_extension() {
        let name = random_filename_preserving_ext("cat.PNG");
        assert!(name.ends_with(".PNG"));
    }

    #[test]
    fn handles_missing_extension() {
        let name = random_filename_preserving_ext("README");
        assert!(!name.contains('.'));
    }
}
