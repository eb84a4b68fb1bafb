//! Service classification: maps a configured server name to the test suite
//! category that applies to it.

use std::fmt;

/// Test-suite bucket for a configured MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Filesystem,
    SearchServer,
    Sqlite,
    ChromaVectorStore,
    DeepWiki,
    /// Recognised but has no test suite; reported as skipped.
    Docker,
    /// Best-effort probing of common operation names.
    Generic,
}

/// Ordered keyword table. First match wins.
const KEYWORDS: &[(&str, Category)] = &[
    ("filesystem", Category::Filesystem),
    ("search", Category::SearchServer),
    ("sqlite", Category::Sqlite),
    ("chroma", Category::ChromaVectorStore),
    ("deepwiki", Category::DeepWiki),
    ("docker", Category::Docker),
];

impl Category {
    /// Stable kebab-case name used in console output.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Filesystem => "filesystem",
            Category::SearchServer => "search-server",
            Category::Sqlite => "sqlite",
            Category::ChromaVectorStore => "chroma",
            Category::DeepWiki => "deepwiki",
            Category::Docker => "docker",
            Category::Generic => "generic",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a server name by case-insensitive substring match.
///
/// Total: names matching no keyword are `Generic`.
pub fn classify(name: &str) -> Category {
    let lowered = name.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, category)| *category)
        .unwrap_or(Category::Generic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_keywords() {
        assert_eq!(classify("filesystem"), Category::Filesystem);
        assert_eq!(classify("search-server"), Category::SearchServer);
        assert_eq!(classify("my-sqlite"), Category::Sqlite);
        assert_eq!(classify("chroma"), Category::ChromaVectorStore);
        assert_eq!(classify("deepwiki"), Category::DeepWiki);
        assert_eq!(classify("docker-mcp"), Category::Docker);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify("My-SQLite-DB"), Category::Sqlite);
        assert_eq!(classify("ChromaDB"), Category::ChromaVectorStore);
    }

    #[test]
    fn test_classify_defaults_to_generic() {
        assert_eq!(classify("unknown-thing"), Category::Generic);
        assert_eq!(classify(""), Category::Generic);
    }

    #[test]
    fn test_classify_first_keyword_wins() {
        // Docker is checked last, so a tested keyword wins over it.
        assert_eq!(classify("docker-filesystem"), Category::Filesystem);
        assert_eq!(classify("sqlite-in-docker"), Category::Sqlite);
        // Matches both "filesystem" and "search".
        assert_eq!(classify("filesystem-search"), Category::Filesystem);
    }

    #[test]
    fn test_classify_is_deterministic() {
        for name in ["filesystem", "git", "deepwiki-mirror", "Search"] {
            assert_eq!(classify(name), classify(name));
        }
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::SearchServer.to_string(), "search-server");
        assert_eq!(Category::ChromaVectorStore.to_string(), "chroma");
    }
}
