//! Vision model detection for image attachments on the local backend.

/// Model families known to accept images.
const VISION_FAMILIES: &[&str] = &[
    "llava",
    "bakllava",
    "moondream",
    "llava-llama3",
    "llava-phi3",
    "llava-v1.6",
];

/// Search order when picking a replacement model.
const VISION_PRIORITY: &[&str] = &[
    "llava",
    "llava-llama3",
    "llava-v1.6",
    "llava-phi3",
    "bakllava",
    "moondream",
];

pub fn is_vision_model(model_name: &str) -> bool {
    let name = model_name.to_lowercase();
    VISION_FAMILIES.iter().any(|family| name.contains(family))
}

/// Only the local path reroutes; the cloud path is treated as vision-capable.
pub fn needs_vision_reroute(model_name: &str, has_images: bool, is_ollama_path: bool) -> bool {
    is_ollama_path && has_images && !is_vision_model(model_name)
}

/// First priority token with any match wins, regardless of list order.
pub fn find_best_vision_model<S: AsRef<str>>(available: &[S]) -> Option<String> {
    VISION_PRIORITY.iter().find_map(|token| {
        available
            .iter()
            .map(|name| name.as_ref())
            .find(|name: &&str| name.to_lowercase().contains(token))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_vision_families_case_insensitively() {
        assert!(is_vision_model("llava:13b"));
        assert!(is_vision_model("LLaVA-Phi3:latest"));
        assert!(is_vision_model("moondream"));
        assert!(!is_vision_model("llama3.2:latest"));
        assert!(!is_vision_model("codellama:7b"));
    }

    #[test]
    fn reroute_requires_images_on_local_path() {
        assert!(needs_vision_reroute("llama3.2:latest", true, true));
        assert!(!needs_vision_reroute("llama3.2:latest", false, true));
        assert!(!needs_vision_reroute("llama3.2:latest", true, false));
        assert!(!needs_vision_reroute("llava:7b", true, true));
    }

    #[test]
    fn no_images_never_reroutes() {
        for model in ["llama3.2:latest", "llava", "mixtral-8x7b-32768", ""] {
            for local in [true, false] {
                assert!(!needs_vision_reroute(model, false, local));
            }
        }
    }

    #[test]
    fn priority_beats_list_order() {
        let available = ["llava-phi3:latest", "moondream:latest"];
        // "llava" is a substring of "llava-phi3", so it wins on the first token.
        assert_eq!(
            find_best_vision_model(&available),
            Some("llava-phi3:latest".to_string())
        );

        let available = ["moondream:latest", "bakllava:7b"];
        assert_eq!(
            find_best_vision_model(&available),
            Some("bakllava:7b".to_string())
        );
    }

    #[test]
    fn returns_none_without_vision_models() {
        let available = vec!["llama3.2:latest".to_string(), "codellama:13b".to_string()];
        assert_eq!(find_best_vision_model(&available), None);
        assert_eq!(find_best_vision_model::<&str>(&[]), None);
    }
}
