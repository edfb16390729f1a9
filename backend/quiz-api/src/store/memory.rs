use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use super::{GraphStore, Mutation, MutationResponse, Node, Object, StoreError, Term, Value};

/// In-process graph used by tests and `STORE_BACKEND=memory` runs.
///
/// Mutations are applied atomically under one write lock.
#[derive(Default)]
pub struct MemoryGraph {
    inner: RwLock<MemoryInner>,
    fail_mutations: AtomicBool,
    mutations_applied: AtomicUsize,
}

#[derive(Default)]
struct MemoryInner {
    nodes: HashMap<String, Node>,
    next_uid: u64,
}

impl MemoryInner {
    fn allocate_uid(&mut self) -> String {
        self.next_uid += 1;
        format!("0x{:x}", self.next_uid)
    }
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following mutation fail with `StoreError::Unavailable`.
    pub fn set_fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Number of mutations successfully applied so far.
    pub fn mutations_applied(&self) -> usize {
        self.mutations_applied.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn mutate(&self, mutation: &Mutation) -> Result<MutationResponse, StoreError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory graph is refusing writes".to_string(),
            ));
        }
        if mutation.is_empty() {
            return Err(StoreError::Rejected("empty mutation".to_string()));
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Unavailable("memory graph lock poisoned".to_string()))?;

        let mut response = MutationResponse::default();
        for label in mutation.blank_labels() {
            let uid = inner.allocate_uid();
            response.uids.insert(label.to_string(), uid);
        }

        let resolve = |term: &Term| -> String {
            match term {
                Term::Uid(uid) => uid.clone(),
                // Every blank label was allocated above.
                Term::Blank(label) => response.uids[label.as_str()].clone(),
            }
        };

        for statement in mutation.statements() {
            let subject = resolve(&statement.subject);
            let value = match &statement.object {
                Object::Literal(literal) => Value::Literal(literal.clone()),
                Object::Node(term) => Value::Uid(resolve(term)),
            };
            inner
                .nodes
                .entry(subject.clone())
                .or_insert_with(|| Node::new(subject))
                .insert(&statement.predicate, value);
        }

        self.mutations_applied.fetch_add(1, Ordering::SeqCst);
        Ok(response)
    }

    async fn node(&self, uid: &str) -> Result<Option<Node>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Unavailable("memory graph lock poisoned".to_string()))?;
        Ok(inner.nodes.get(uid).filter(|node| !node.is_empty()).cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_nodes_get_distinct_uids() {
        let graph = MemoryGraph::new();
        let mut mutation = Mutation::new();
        mutation
            .set_edge(Term::uid("0xc0ffee"), "candidate.question", Term::blank("qn"))
            .set_literal(Term::blank("qn"), "question.asked", "t0")
            .set_literal(Term::blank("other"), "name", "x");

        let response = graph.mutate(&mutation).await.unwrap();
        let qn = response.uid("qn").unwrap().to_string();
        let other = response.uid("other").unwrap().to_string();
        assert_ne!(qn, other);

        let candidate = graph.node("0xc0ffee").await.unwrap().unwrap();
        assert_eq!(candidate.edges("candidate.question"), vec![qn.as_str()]);
        let attempt = graph.node(&qn).await.unwrap().unwrap();
        assert_eq!(attempt.literal("question.asked"), Some("t0"));
    }

    #[tokio::test]
    async fn failing_graph_applies_nothing() {
        let graph = MemoryGraph::new();
        graph.set_fail_mutations(true);

        let mut mutation = Mutation::new();
        mutation.set_literal(Term::uid("0x1"), "quiz_start", "t0");

        let err = graph.mutate(&mutation).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(graph.node("0x1").await.unwrap().is_none());
        assert_eq!(graph.mutations_applied(), 0);

        graph.set_fail_mutations(false);
        graph.mutate(&mutation).await.unwrap();
        assert_eq!(graph.mutations_applied(), 1);
    }

    #[tokio::test]
    async fn empty_mutation_is_rejected() {
        let graph = MemoryGraph::new();
        let err = graph.mutate(&Mutation::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }
}
