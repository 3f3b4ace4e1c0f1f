use async_trait::async_trait;
use dashmap::DashSet;

/// Boundary to the social graph service. The session core only ever asks one
/// question: is the friendship between two users in the accepted state?
///
/// Implementations may perform network I/O; callers must never hold a room
/// lock across this call.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    async fn are_friends(&self, a: &str, b: &str) -> anyhow::Result<bool>;
}

/// In-memory friendship set, used standalone and in tests. Edges are stored
/// direction-normalized so insertion order does not matter.
#[derive(Debug, Default)]
pub struct InMemorySocialGraph {
    edges: DashSet<(String, String)>,
}

impl InMemorySocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_friendship(&self, a: &str, b: &str) {
        self.edges.insert(edge(a, b));
    }

    pub fn remove_friendship(&self, a: &str, b: &str) {
        self.edges.remove(&edge(a, b));
    }
}

fn edge(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[async_trait]
impl SocialGraph for InMemorySocialGraph {
    async fn are_friends(&self, a: &str, b: &str) -> anyhow::Result<bool> {
        Ok(self.edges.contains(&edge(a, b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn friendship_is_symmetric() {
        let graph = InMemorySocialGraph::new();
        graph.add_friendship("u1", "u2");
        assert!(graph.are_friends("u1", "u2").await.unwrap());
        assert!(graph.are_friends("u2", "u1").await.unwrap());
        assert!(!graph.are_friends("u1", "u3").await.unwrap());

        graph.remove_friendship("u2", "u1");
        assert!(!graph.are_friends("u1", "u2").await.unwrap());
    }
}
