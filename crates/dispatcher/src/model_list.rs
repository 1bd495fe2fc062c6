/// §4.1 Inputs: `model_config` is comma-separated; whitespace and literal
/// `"on"` tokens (left behind by an HTML checkbox posted as a form field)
/// are stripped. An empty result defaults to a single model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub fn normalize_models(model_config: &str) -> Vec<String> {
    let models: Vec<String> = model_config
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty() && *part != "on")
        .map(str::to_owned)
        .collect();

    if models.is_empty() {
        vec![DEFAULT_MODEL.to_string()]
    } else {
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_on_tokens_and_whitespace() {
        assert_eq!(
            normalize_models("on, gemini, qwen"),
            vec!["gemini".to_string(), "qwen".to_string()]
        );
    }

    #[test]
    fn empty_list_defaults_to_gemini_flash() {
        assert_eq!(normalize_models(""), vec![DEFAULT_MODEL.to_string()]);
        assert_eq!(normalize_models("on, ,  "), vec![DEFAULT_MODEL.to_string()]);
    }

    #[test]
    fn single_model_passes_through() {
        assert_eq!(normalize_models("gemini-2.5-flash"), vec!["gemini-2.5-flash".to_string()]);
    }
}
