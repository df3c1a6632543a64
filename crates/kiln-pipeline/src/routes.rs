//! Mapping content items to output routes.

use std::collections::BTreeMap;

use kiln_content::ContentItem;
use kiln_store::normalize_route;

const DEFAULT_PATTERN: &str = "/{slug}/";

/// Permalink rules: a pattern per content kind plus routes that refresh
/// on every change.
#[derive(Debug, Clone, Default)]
pub struct RouteRules {
    patterns: BTreeMap<String, String>,
    always: Vec<String>,
}

impl RouteRules {
    /// Build rules from per-kind patterns (`posts` -> `/blog/{slug}/`) and
    /// a list of always-refresh routes.
    pub fn new(patterns: BTreeMap<String, String>, always: Vec<String>) -> Self {
        Self {
            patterns,
            always: always.iter().map(|r| normalize_route(r)).collect(),
        }
    }

    /// Routes re-rendered whenever anything changed at all.
    pub fn always(&self) -> &[String] {
        &self.always
    }

    /// The output route for an item. Patterns substitute `{slug}` and
    /// `{id}`; kinds without a pattern fall back to `/{slug}/`.
    pub fn route_for(&self, item: &ContentItem) -> String {
        let pattern = self
            .patterns
            .get(item.kind.as_str())
            .map(String::as_str)
            .unwrap_or(DEFAULT_PATTERN);

        let route = pattern
            .replace("{slug}", &item.slug)
            .replace("{id}", &item.id.to_string());

        normalize_route(&route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_content::{ContentKind, Timestamp};
    use time::macros::datetime;

    fn item(kind: &str, id: u64, slug: &str) -> ContentItem {
        ContentItem {
            id,
            slug: slug.to_string(),
            link: None,
            modified: Timestamp(datetime!(2024-01-01 00:00:00 UTC)),
            title: None,
            kind: ContentKind::from(kind),
        }
    }

    #[test]
    fn default_pattern_is_slug() {
        let rules = RouteRules::default();

        assert_eq!(rules.route_for(&item("pages", 1, "about")), "/about/");
    }

    #[test]
    fn per_kind_patterns_substitute_slug_and_id() {
        let patterns = [
            ("posts".to_string(), "/blog/{slug}/".to_string()),
            ("products".to_string(), "/shop/{id}".to_string()),
        ]
        .into_iter()
        .collect();
        let rules = RouteRules::new(patterns, vec![]);

        assert_eq!(rules.route_for(&item("posts", 1, "hello")), "/blog/hello/");
        assert_eq!(rules.route_for(&item("products", 42, "x")), "/shop/42/");
    }

    #[test]
    fn always_routes_are_normalized() {
        let rules = RouteRules::new(BTreeMap::new(), vec!["".to_string(), "blog".to_string()]);

        assert_eq!(rules.always(), ["/".to_string(), "/blog/".to_string()]);
    }
}
