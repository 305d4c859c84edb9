//! Content sniffing for files without a usable extension.

use crate::lang::Lang;

/// Guess the language from file content when extension detection failed.
///
/// Checks, in order: shebang line, JSON structural probe, YAML document
/// marker, markdown heading heuristic.
#[must_use]
pub fn sniff_language(content: &str) -> Option<Lang> {
    if let Some(lang) = sniff_shebang(content) {
        return Some(lang);
    }

    let trimmed = content.trim_start();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(content).is_ok()
    {
        return Some(Lang::Json);
    }

    if trimmed.starts_with("---\n") || trimmed.starts_with("---\r\n") {
        return Some(Lang::Yaml);
    }

    if trimmed.starts_with("# ") && content.lines().any(|l| l.starts_with("## ")) {
        return Some(Lang::Markdown);
    }

    None
}

fn sniff_shebang(content: &str) -> Option<Lang> {
    let first = content.lines().next()?;
    let rest = first.strip_prefix("#!")?;
    if rest.contains("python") {
        Some(Lang::Python)
    } else if rest.contains("node") {
        Some(Lang::JavaScript)
    } else if rest.contains("sh") {
        // sh, bash, zsh, dash all chunk fine with the bash grammar
        Some(Lang::Bash)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shebang_bash() {
        assert_eq!(sniff_language("#!/bin/bash\necho hi\n"), Some(Lang::Bash));
        assert_eq!(sniff_language("#!/usr/bin/env zsh\n"), Some(Lang::Bash));
    }

    #[test]
    fn shebang_python() {
        assert_eq!(
            sniff_language("#!/usr/bin/env python3\nprint('hi')\n"),
            Some(Lang::Python)
        );
    }

    #[test]
    fn json_probe() {
        assert_eq!(sniff_language("{\"a\": [1, 2, 3]}"), Some(Lang::Json));
        assert_eq!(sniff_language("[1, 2]"), Some(Lang::Json));
        // Braces alone are not enough; it has to parse.
        assert_eq!(sniff_language("{not json"), None);
    }

    #[test]
    fn yaml_document_marker() {
        assert_eq!(sniff_language("---\nkey: value\n"), Some(Lang::Yaml));
    }

    #[test]
    fn markdown_headings() {
        assert_eq!(
            sniff_language("# Title\n\nintro\n\n## Section\n"),
            Some(Lang::Markdown)
        );
    }

    #[test]
    fn plain_text_is_unknown() {
        assert_eq!(sniff_language("just some prose, nothing special"), None);
        assert_eq!(sniff_language(""), None);
    }
}
