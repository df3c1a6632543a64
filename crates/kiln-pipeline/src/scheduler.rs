//! Turning a change set into an ordered render plan.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use kiln_content::{ChangeSet, ContentItem};

use crate::routes::RouteRules;

/// One route to render and the item keys that caused it. Always-refresh
/// routes carry no sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRoute {
    pub route: String,
    pub sources: Vec<String>,
}

/// Deduplicated, deterministically ordered set of routes to render.
#[derive(Debug, Default)]
pub struct RoutePlan {
    pub renders: Vec<PlannedRoute>,
}

impl RoutePlan {
    pub fn is_empty(&self) -> bool {
        self.renders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.renders.len()
    }
}

/// Maps content changes to the routes they affect.
pub struct RenderScheduler {
    rules: RouteRules,
}

impl RenderScheduler {
    pub fn new(rules: RouteRules) -> Self {
        Self { rules }
    }

    /// Plan the routes affected by a change set.
    ///
    /// Created and updated items map through their kind's permalink
    /// pattern; deletions are handled by pruning and never produce a
    /// render. Always-refresh routes join the plan only when something
    /// actually changed.
    pub fn plan(&self, changes: &ChangeSet) -> RoutePlan {
        if changes.is_empty() {
            return RoutePlan::default();
        }

        let mut by_route: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for item in changes.renderable() {
            by_route
                .entry(self.rules.route_for(item))
                .or_default()
                .push(item.key());
        }

        for route in self.rules.always() {
            by_route.entry(route.clone()).or_default();
        }

        RoutePlan {
            renders: by_route
                .into_iter()
                .map(|(route, sources)| PlannedRoute { route, sources })
                .collect(),
        }
    }

    /// Plan every route for a full fetch, ignoring change state.
    pub fn plan_all(&self, items: &[ContentItem]) -> RoutePlan {
        let mut by_route: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for item in items {
            by_route
                .entry(self.rules.route_for(item))
                .or_default()
                .push(item.key());
        }

        for route in self.rules.always() {
            by_route.entry(route.clone()).or_default();
        }

        RoutePlan {
            renders: by_route
                .into_iter()
                .map(|(route, sources)| PlannedRoute { route, sources })
                .collect(),
        }
    }

    /// Every route the current content maps to, always-refresh included.
    /// Anything outside this set is prunable.
    pub fn live_routes(&self, items: &[ContentItem]) -> BTreeSet<String> {
        let mut live: BTreeSet<String> = items.iter().map(|i| self.rules.route_for(i)).collect();
        live.extend(self.rules.always().iter().cloned());
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kiln_content::{ContentIndex, ContentKind, Timestamp};
    use time::macros::datetime;

    fn item(kind: &str, id: u64, slug: &str, day: u8) -> ContentItem {
        ContentItem {
            id,
            slug: slug.to_string(),
            link: None,
            modified: Timestamp(
                datetime!(2024-01-01 00:00:00 UTC) + time::Duration::days(day as i64),
            ),
            title: None,
            kind: ContentKind::from(kind),
        }
    }

    fn scheduler() -> RenderScheduler {
        RenderScheduler::new(RouteRules::new(
            [("posts".to_string(), "/blog/{slug}/".to_string())]
                .into_iter()
                .collect(),
            vec!["/".to_string()],
        ))
    }

    #[test]
    fn empty_change_set_plans_nothing() {
        let plan = scheduler().plan(&ChangeSet::default());

        assert!(plan.is_empty());
    }

    #[test]
    fn changed_items_map_to_routes_plus_always() {
        let index = ContentIndex::new();
        let changes = index.diff(&[item("posts", 1, "hello", 1), item("pages", 2, "about", 1)]);

        let plan = scheduler().plan(&changes);

        let routes: Vec<&str> = plan.renders.iter().map(|p| p.route.as_str()).collect();
        assert_eq!(routes, ["/", "/about/", "/blog/hello/"]);

        let home = &plan.renders[0];
        assert!(home.sources.is_empty());
        let hello = &plan.renders[2];
        assert_eq!(hello.sources, vec!["posts/1".to_string()]);
    }

    #[test]
    fn deletions_do_not_produce_renders() {
        let mut index = ContentIndex::new();
        index.apply(&[item("posts", 1, "hello", 1)]);

        let changes = index.diff(&[]);
        assert_eq!(changes.deleted.len(), 1);

        let plan = scheduler().plan(&changes);

        // Only the always-refresh route remains.
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.renders[0].route, "/");
    }

    #[test]
    fn shared_routes_merge_their_sources() {
        let rules = RouteRules::new(
            [("posts".to_string(), "/news/".to_string())].into_iter().collect(),
            vec![],
        );
        let scheduler = RenderScheduler::new(rules);

        let index = ContentIndex::new();
        let changes = index.diff(&[item("posts", 1, "a", 1), item("posts", 2, "b", 1)]);

        let plan = scheduler.plan(&changes);

        assert_eq!(plan.len(), 1);
        assert_eq!(
            plan.renders[0].sources,
            vec!["posts/1".to_string(), "posts/2".to_string()]
        );
    }

    #[test]
    fn live_routes_cover_all_items_and_always() {
        let items = vec![item("posts", 1, "hello", 1), item("pages", 2, "about", 1)];

        let live = scheduler().live_routes(&items);

        let expected: BTreeSet<String> = ["/", "/about/", "/blog/hello/"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(live, expected);
    }
}
