//! Prompt assembly

/// Build the prompt for one attempt.
///
/// Block terms from a rejected attempt are appended as negative guidance,
/// capped at `max_terms`.
pub fn build_prompt(
    base: &str,
    topic: Option<&str>,
    block_terms: &[String],
    max_terms: usize,
) -> String {
    let mut prompt = base.trim_end().to_string();

    if let Some(topic) = topic.map(str::trim).filter(|t| !t.is_empty()) {
        prompt.push_str(&format!("\n\nTopic: {}", topic));
    }

    let terms: Vec<&str> = block_terms
        .iter()
        .map(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .take(max_terms)
        .collect();

    if !terms.is_empty() {
        prompt.push_str(
            "\n\nA previous draft was too similar to an earlier post. \
             Avoid content overlapping with these strings:\n",
        );
        for term in terms {
            prompt.push_str(&format!("- \"{}\"\n", term));
        }
        prompt.push_str("Write something clearly different.");
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    #[test]
    fn test_base_only() {
        assert_eq!(build_prompt("Write a post.\n", None, &[], 12), "Write a post.");
    }

    #[test]
    fn test_topic_line() {
        let p = build_prompt("Base", Some(" rust "), &[], 12);
        assert!(p.ends_with("Topic: rust"));
        assert_eq!(build_prompt("Base", Some("  "), &[], 12), "Base");
    }

    #[test]
    fn test_block_terms_are_capped() {
        let p = build_prompt("Base", None, &terms(20), 12);
        assert!(p.contains("Avoid content overlapping with these strings"));
        assert!(p.contains("- \"t11\""));
        assert!(!p.contains("- \"t12\""));
    }
}
