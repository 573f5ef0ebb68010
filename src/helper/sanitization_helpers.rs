use std::collections::HashSet;

/// Strips all HTML tags from input, leaving only the text content.
pub fn strip_all_html(input: &str) -> String {
    ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
}

/// Strips HTML and trims. Blank input becomes `None`.
pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input
        .map(|raw| strip_all_html(raw.trim()))
        .map(|clean| clean.trim().to_string())
        .filter(|clean| !clean.is_empty())
}

/// Keeps `[A-Za-z0-9_-]` only.
pub fn sanitize_actor(actor: &str) -> String {
    actor
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Reduces an uploaded file name to a single safe path segment.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_is_removed_from_text_fields() {
        assert_eq!(strip_all_html("<b>Roteiro</b> final"), "Roteiro final");
        assert_eq!(strip_all_html("<script>alert(1)</script>ok"), "ok");
        assert_eq!(clean_optional(Some("  <i>  </i> ")), None);
        assert_eq!(clean_optional(Some(" Roteiro ")), Some("Roteiro".to_string()));
        assert_eq!(clean_optional(None), None);
    }

    #[test]
    fn actor_keeps_safe_characters_only() {
        assert_eq!(sanitize_actor("user 42/../x"), "user42x");
        assert_eq!(sanitize_actor("ab_c-1"), "ab_c-1");
    }

    #[test]
    fn file_names_cannot_escape_their_folder() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\videos\\corte final.mp4"), "corte_final.mp4");
        assert_eq!(sanitize_file_name(".."), "upload.bin");
        assert_eq!(sanitize_file_name(".env"), "env");
    }
}
