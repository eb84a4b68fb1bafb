//! Host-style tool naming.
//!
//! The host exposes each server's tools as `<service>_<tool>`
//! (e.g., `sqlite_list_tables`). Service names may themselves contain
//! underscores or hyphens, so splitting needs the set of known services.

/// Join a service name and a tool name with a single underscore.
/// E.g., service="sqlite", tool="list_tables" -> "sqlite_list_tables"
pub fn namespaced_tool_name(service: &str, tool: &str) -> String {
    format!("{service}_{tool}")
}

/// Split a namespaced tool name into (service, tool) using the longest
/// matching known service name. Returns None if no service matches.
pub fn split_tool_name<'a, S: AsRef<str>>(
    namespaced: &'a str,
    services: &[S],
) -> Option<(&'a str, &'a str)> {
    services
        .iter()
        .map(AsRef::as_ref)
        .filter(|service| {
            namespaced.len() > service.len() + 1
                && namespaced.starts_with(service)
                && namespaced.as_bytes()[service.len()] == b'_'
        })
        .max_by_key(|service| service.len())
        .map(|service| {
            let (head, rest) = namespaced.split_at(service.len());
            (head, &rest[1..])
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_tool_name() {
        assert_eq!(
            namespaced_tool_name("sqlite", "list_tables"),
            "sqlite_list_tables"
        );
    }

    #[test]
    fn test_split_simple() {
        let services = ["sqlite", "chroma"];
        assert_eq!(
            split_tool_name("sqlite_list_tables", &services),
            Some(("sqlite", "list_tables"))
        );
        assert_eq!(
            split_tool_name("chroma_chroma_list_collections", &services),
            Some(("chroma", "chroma_list_collections"))
        );
    }

    #[test]
    fn test_split_prefers_longest_service() {
        let services = ["search", "search-server", "search_server"];
        assert_eq!(
            split_tool_name("search-server_one_search", &services),
            Some(("search-server", "one_search"))
        );
        assert_eq!(
            split_tool_name("search_server_query", &services),
            Some(("search_server", "query"))
        );
    }

    #[test]
    fn test_split_unknown_service() {
        let services = ["sqlite"];
        assert!(split_tool_name("git_status", &services).is_none());
        assert!(split_tool_name("sqlite_", &services).is_none());
        assert!(split_tool_name("sqlitex_list", &services).is_none());
    }

    #[test]
    fn test_split_roundtrip() {
        let services = vec!["deepwiki".to_string()];
        let name = namespaced_tool_name("deepwiki", "deepwiki_fetch");
        assert_eq!(
            split_tool_name(&name, &services),
            Some(("deepwiki", "deepwiki_fetch"))
        );
    }
}
