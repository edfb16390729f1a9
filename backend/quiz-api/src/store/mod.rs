//! Graph-structured durable store.
//!
//! The quiz engine never writes store syntax directly. It builds a [`Mutation`]
//! out of typed [`Statement`]s and hands it to a [`GraphStore`] backend, which
//! resolves blank nodes to generated uids and reports them back in a
//! [`MutationResponse`].
//!
//! Store semantics shared by every backend:
//! - literal predicates are single-valued, asserting a new value replaces the old one;
//! - edge predicates are sets, re-asserting an existing edge is a no-op;
//! - every blank label used in one mutation maps to exactly one fresh uid.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

pub mod memory;
pub mod mongo;
pub mod seed;

pub use memory::MemoryGraph;
pub use mongo::MongoGraph;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected mutation: {0}")]
    Rejected(String),
    #[error("inconsistent store state: {0}")]
    Inconsistent(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Subject or edge target of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// An existing node.
    Uid(String),
    /// A node created by this mutation, identified by a label local to it.
    Blank(String),
}

impl Term {
    pub fn uid(uid: impl Into<String>) -> Self {
        Term::Uid(uid.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Term::Blank(label.into())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Uid(uid) => write!(f, "<{}>", uid),
            Term::Blank(label) => write!(f, "_:{}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Node(Term),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub subject: Term,
    pub predicate: String,
    pub object: Object,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> ", self.subject, self.predicate)?;
        match &self.object {
            Object::Node(term) => write!(f, "{}", term)?,
            Object::Literal(value) => write!(f, "\"{}\"", escape_literal(value))?,
        }
        write!(f, " .")
    }
}

fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Ordered batch of statements applied as one logical step.
#[derive(Debug, Clone, Default)]
pub struct Mutation {
    statements: Vec<Statement>,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_literal(
        &mut self,
        subject: Term,
        predicate: &str,
        value: impl ToString,
    ) -> &mut Self {
        self.statements.push(Statement {
            subject,
            predicate: predicate.to_string(),
            object: Object::Literal(value.to_string()),
        });
        self
    }

    pub fn set_edge(&mut self, subject: Term, predicate: &str, object: Term) -> &mut Self {
        self.statements.push(Statement {
            subject,
            predicate: predicate.to_string(),
            object: Object::Node(object),
        });
        self
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Every blank label referenced as subject or object.
    pub fn blank_labels(&self) -> BTreeSet<&str> {
        let mut labels = BTreeSet::new();
        for statement in &self.statements {
            if let Term::Blank(label) = &statement.subject {
                labels.insert(label.as_str());
            }
            if let Object::Node(Term::Blank(label)) = &statement.object {
                labels.insert(label.as_str());
            }
        }
        labels
    }

    /// Renders the batch in the store's line-oriented wire syntax.
    pub fn to_rdf(&self) -> String {
        self.statements
            .iter()
            .map(|statement| statement.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct MutationResponse {
    /// Blank label -> generated uid.
    pub uids: HashMap<String, String>,
}

impl MutationResponse {
    pub fn uid(&self, label: &str) -> Option<&str> {
        self.uids.get(label).map(|uid| uid.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Literal(String),
    Uid(String),
}

/// All predicates recorded for one subject.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub uid: String,
    predicates: BTreeMap<String, Vec<Value>>,
}

impl Node {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            predicates: BTreeMap::new(),
        }
    }

    /// Applies the shared store semantics: literals replace, edges accumulate.
    pub fn insert(&mut self, predicate: &str, value: Value) {
        let values = self.predicates.entry(predicate.to_string()).or_default();
        match value {
            Value::Literal(_) => {
                values.retain(|existing| !matches!(existing, Value::Literal(_)));
                values.push(value);
            }
            Value::Uid(_) => {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
    }

    pub fn literal(&self, predicate: &str) -> Option<&str> {
        self.predicates.get(predicate).and_then(|values| {
            values.iter().find_map(|value| match value {
                Value::Literal(literal) => Some(literal.as_str()),
                Value::Uid(_) => None,
            })
        })
    }

    pub fn parse<T: FromStr>(&self, predicate: &str) -> Option<T> {
        self.literal(predicate).and_then(|raw| raw.parse().ok())
    }

    /// Edge targets in assertion order.
    pub fn edges(&self, predicate: &str) -> Vec<&str> {
        self.predicates
            .get(predicate)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|value| match value {
                        Value::Uid(uid) => Some(uid.as_str()),
                        Value::Literal(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Applies a mutation. Failures surface as-is; the adapter never retries.
    async fn mutate(&self, mutation: &Mutation) -> Result<MutationResponse, StoreError>;

    /// Loads every predicate of `uid`, `None` when the node has no facts.
    async fn node(&self, uid: &str) -> Result<Option<Node>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    fn backend(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_render_in_wire_syntax() {
        let mut mutation = Mutation::new();
        mutation
            .set_edge(Term::uid("0x1"), "candidate.question", Term::blank("qn"))
            .set_edge(Term::blank("qn"), "question.uid", Term::uid("0x2a"))
            .set_literal(Term::blank("qn"), "question.asked", "2026-01-01T10:00:00.000Z");

        assert_eq!(
            mutation.to_rdf(),
            "<0x1> <candidate.question> _:qn .\n\
             _:qn <question.uid> <0x2a> .\n\
             _:qn <question.asked> \"2026-01-01T10:00:00.000Z\" ."
        );
    }

    #[test]
    fn literal_quotes_are_escaped() {
        let mut mutation = Mutation::new();
        mutation.set_literal(Term::uid("0x1"), "name", "Ada \"The\" Countess\\");
        assert_eq!(
            mutation.to_rdf(),
            "<0x1> <name> \"Ada \\\"The\\\" Countess\\\\\" ."
        );
    }

    #[test]
    fn blank_labels_are_collected_once() {
        let mut mutation = Mutation::new();
        mutation
            .set_edge(Term::uid("0x1"), "candidate.question", Term::blank("qn"))
            .set_literal(Term::blank("qn"), "question.asked", "now")
            .set_edge(Term::blank("tag"), "name", Term::blank("qn"));

        let labels: Vec<&str> = mutation.blank_labels().into_iter().collect();
        assert_eq!(labels, vec!["qn", "tag"]);
    }

    #[test]
    fn node_literals_replace_and_edges_accumulate() {
        let mut node = Node::new("0x1");
        node.insert("score", Value::Literal("1.5".to_string()));
        node.insert("score", Value::Literal("-2".to_string()));
        node.insert("candidate.question", Value::Uid("0x2".to_string()));
        node.insert("candidate.question", Value::Uid("0x3".to_string()));
        node.insert("candidate.question", Value::Uid("0x2".to_string()));

        assert_eq!(node.parse::<f64>("score"), Some(-2.0));
        assert_eq!(node.edges("candidate.question"), vec!["0x2", "0x3"]);
        assert!(node.literal("missing").is_none());
    }
}
