//! Language detection, grammar registry, and content-type classification.

use std::path::Path;

use strata_store::ContentType;

/// Supported language with its tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Bash,
    Toml,
    Json,
    Yaml,
    Markdown,
}

impl Lang {
    /// Identifier stored in chunk metadata and vector payloads.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::Bash => "bash",
            Self::Toml => "toml",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Markdown => "markdown",
        }
    }

    /// The tree-sitter grammar, where one is linked in.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Self::Bash => Some(tree_sitter_bash::LANGUAGE.into()),
            Self::Toml => Some(tree_sitter_toml_ng::LANGUAGE.into()),
            Self::Json => Some(tree_sitter_json::LANGUAGE.into()),
            Self::Markdown => Some(tree_sitter_md::LANGUAGE.into()),
            Self::Yaml => None,
        }
    }

    /// AST node kinds that form chunk boundaries.
    ///
    /// Empty for non-code languages; those always go through the generic
    /// window strategy.
    #[must_use]
    pub fn entity_node_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &[
                "function_item",
                "struct_item",
                "enum_item",
                "trait_item",
                "impl_item",
                "type_item",
                "const_item",
                "static_item",
                "macro_definition",
                "mod_item",
            ],
            Self::Python => &[
                "function_definition",
                "class_definition",
                "decorated_definition",
            ],
            Self::JavaScript | Self::TypeScript => &[
                "function_declaration",
                "class_declaration",
                "method_definition",
                "export_statement",
                "lexical_declaration",
            ],
            Self::Go => &[
                "function_declaration",
                "method_declaration",
                "type_declaration",
                "const_declaration",
            ],
            _ => &[],
        }
    }

    /// Entity kinds whose members are themselves boundaries; oversize nodes
    /// of these kinds recurse into their children instead of being
    /// window-split.
    #[must_use]
    pub fn container_node_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["impl_item", "mod_item", "trait_item"],
            Self::Python => &["class_definition", "decorated_definition"],
            Self::JavaScript | Self::TypeScript => &["class_declaration", "export_statement"],
            _ => &[],
        }
    }

    /// Comment node kinds, used to attach leading doc comments to entities.
    #[must_use]
    pub fn comment_node_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["line_comment", "block_comment"],
            Self::Python | Self::JavaScript | Self::TypeScript | Self::Go | Self::Bash => {
                &["comment"]
            }
            _ => &[],
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension.
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "rs" => Some(Lang::Rust),
        "py" | "pyi" => Some(Lang::Python),
        "js" | "jsx" | "mjs" | "cjs" => Some(Lang::JavaScript),
        "ts" | "tsx" | "mts" | "cts" => Some(Lang::TypeScript),
        "go" => Some(Lang::Go),
        "sh" | "bash" | "zsh" => Some(Lang::Bash),
        "toml" => Some(Lang::Toml),
        "json" | "jsonc" => Some(Lang::Json),
        "yaml" | "yml" => Some(Lang::Yaml),
        "md" | "markdown" => Some(Lang::Markdown),
        _ => None,
    }
}

fn is_test_path(path: &Path) -> bool {
    let in_test_dir = path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("tests" | "test" | "__tests__" | "spec")
        )
    });
    if in_test_dir {
        return true;
    }
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with(".test")
        || stem.ends_with(".spec")
}

fn in_docs_dir(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c.as_os_str().to_str(), Some("docs" | "doc")))
}

/// Classify a file into the content type the extraction strategy keys on.
#[must_use]
pub fn classify_content(path: &Path, lang: Option<Lang>) -> ContentType {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    if stem.eq_ignore_ascii_case("readme") {
        return ContentType::Readme;
    }

    match lang {
        Some(Lang::Markdown) => {
            if in_docs_dir(path) {
                ContentType::Documentation
            } else {
                ContentType::Markdown
            }
        }
        Some(Lang::Toml | Lang::Json | Lang::Yaml) => ContentType::Configuration,
        Some(
            Lang::Rust | Lang::Python | Lang::JavaScript | Lang::TypeScript | Lang::Go | Lang::Bash,
        ) => {
            if is_test_path(path) {
                ContentType::Tests
            } else {
                ContentType::SourceCode
            }
        }
        None => {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
            match ext {
                "rst" | "adoc" => ContentType::Documentation,
                "ini" | "cfg" | "conf" | "env" => ContentType::Configuration,
                "txt" if in_docs_dir(path) => ContentType::Documentation,
                _ => ContentType::Text,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_common_extensions() {
        assert_eq!(detect_language(Path::new("src/main.rs")), Some(Lang::Rust));
        assert_eq!(detect_language(Path::new("app.py")), Some(Lang::Python));
        assert_eq!(detect_language(Path::new("index.tsx")), Some(Lang::TypeScript));
        assert_eq!(detect_language(Path::new("conf.yaml")), Some(Lang::Yaml));
        assert_eq!(detect_language(Path::new("unknown.xyz")), None);
        assert_eq!(detect_language(Path::new("Makefile")), None);
    }

    #[test]
    fn readme_wins_over_markdown() {
        assert_eq!(
            classify_content(Path::new("README.md"), Some(Lang::Markdown)),
            ContentType::Readme
        );
        assert_eq!(
            classify_content(Path::new("readme.txt"), None),
            ContentType::Readme
        );
    }

    #[test]
    fn markdown_in_docs_is_documentation() {
        assert_eq!(
            classify_content(Path::new("docs/guide.md"), Some(Lang::Markdown)),
            ContentType::Documentation
        );
        assert_eq!(
            classify_content(Path::new("CHANGELOG.md"), Some(Lang::Markdown)),
            ContentType::Markdown
        );
    }

    #[test]
    fn test_paths_classified_as_tests() {
        assert_eq!(
            classify_content(Path::new("tests/integration.rs"), Some(Lang::Rust)),
            ContentType::Tests
        );
        assert_eq!(
            classify_content(Path::new("src/test_utils.py"), Some(Lang::Python)),
            ContentType::Tests
        );
        assert_eq!(
            classify_content(Path::new("src/app.spec.ts"), Some(Lang::TypeScript)),
            ContentType::Tests
        );
        assert_eq!(
            classify_content(Path::new("src/lib.rs"), Some(Lang::Rust)),
            ContentType::SourceCode
        );
    }

    #[test]
    fn config_extensions_classified() {
        assert_eq!(
            classify_content(Path::new("Cargo.toml"), Some(Lang::Toml)),
            ContentType::Configuration
        );
        assert_eq!(
            classify_content(Path::new("settings.ini"), None),
            ContentType::Configuration
        );
    }

    #[test]
    fn unknown_falls_back_to_text() {
        assert_eq!(classify_content(Path::new("notes.xyz"), None), ContentType::Text);
    }

    #[test]
    fn entity_kinds_empty_for_config_langs() {
        assert!(Lang::Toml.entity_node_kinds().is_empty());
        assert!(Lang::Json.entity_node_kinds().is_empty());
        assert!(Lang::Markdown.entity_node_kinds().is_empty());
        assert!(!Lang::Rust.entity_node_kinds().is_empty());
    }

    #[test]
    fn grammar_available_for_code_langs() {
        assert!(Lang::Rust.grammar().is_some());
        assert!(Lang::Python.grammar().is_some());
        assert!(Lang::Yaml.grammar().is_none());
    }
}
