use std::collections::BTreeSet;

/// Clusters a viewer connection is interested in. Empty means all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscription {
    cluster_ids: BTreeSet<String>,
}

impl Subscription {
    pub fn all() -> Self {
        Self::default()
    }

    /// Parses the whitespace separated `cluster_ids` query value.
    pub fn from_query(raw: Option<&str>) -> Self {
        Self {
            cluster_ids: raw
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_owned)
                .collect(),
        }
    }

    pub fn matches(&self, cluster_id: &str) -> bool {
        self.cluster_ids.is_empty() || self.cluster_ids.contains(cluster_id)
    }

    pub fn cluster_ids(&self) -> &BTreeSet<String> {
        &self.cluster_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Subscription::all().matches("anything"));
        assert!(Subscription::from_query(Some("   ")).matches("c1"));
        assert!(Subscription::from_query(None).matches("c1"));
    }

    #[test]
    fn filter_is_whitespace_separated() {
        let subscription = Subscription::from_query(Some("c1  c2\tc3"));
        assert_eq!(subscription.cluster_ids().len(), 3);
        assert!(subscription.matches("c2"));
        assert!(!subscription.matches("c4"));
    }
}
