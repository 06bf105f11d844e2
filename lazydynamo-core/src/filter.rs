//! Fuzzy table-name filtering

/// True if every character of `query` appears in `name` in order, ignoring case
pub fn fuzzy_match(name: &str, query: &str) -> bool {
    let mut haystack = name.chars().flat_map(char::to_lowercase);
    query
        .chars()
        .flat_map(char::to_lowercase)
        .all(|q| haystack.any(|c| c == q))
}

/// Keep the table names matching `query`, preserving input order
///
/// An empty query matches everything.
pub fn filter_tables<'a>(tables: &'a [String], query: &str) -> Vec<&'a str> {
    tables
        .iter()
        .map(String::as_str)
        .filter(|name| fuzzy_match(name, query))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsequence_match() {
        assert!(fuzzy_match("customer-orders", "cord"));
        assert!(fuzzy_match("CustomerOrders", "co"));
        assert!(fuzzy_match("orders", ""));
        assert!(!fuzzy_match("orders", "sro"));
        assert!(!fuzzy_match("ord", "orders"));
    }

    #[test]
    fn test_filter_preserves_order() {
        let tables: Vec<String> = ["Orders", "Users", "order-events", "Inventory"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(filter_tables(&tables, "ord"), vec!["Orders", "order-events"]);
        assert_eq!(filter_tables(&tables, "").len(), 4);
        assert!(filter_tables(&tables, "xyz").is_empty());
    }
}
