use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::{FindOptions, IndexOptions},
    ClientSession, Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{GraphStore, Mutation, MutationResponse, Node, Object, StoreError, Term, Value};

const TRIPLES_COLLECTION: &str = "triples";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TripleKind {
    Literal,
    Uid,
}

impl TripleKind {
    fn as_str(&self) -> &'static str {
        match self {
            TripleKind::Literal => "literal",
            TripleKind::Uid => "uid",
        }
    }
}

/// One fact as stored in MongoDB. Document `_id` order is assertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TripleDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    subject: String,
    predicate: String,
    kind: TripleKind,
    object: String,
}

/// Graph store persisted as a triple collection in MongoDB.
///
/// A mutation is applied inside one multi-document transaction, so a failed
/// batch leaves no triples behind (requires a replica set or mongos).
pub struct MongoGraph {
    mongo: Database,
    triples: Collection<TripleDocument>,
}

impl MongoGraph {
    pub fn new(mongo: Database) -> Self {
        let triples = mongo.collection::<TripleDocument>(TRIPLES_COLLECTION);
        Self { mongo, triples }
    }

    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let index = IndexModel::builder()
            .keys(doc! { "subject": 1, "predicate": 1 })
            .options(
                IndexOptions::builder()
                    .name("subject_predicate".to_string())
                    .build(),
            )
            .build();
        self.triples.create_index(index).await?;
        tracing::info!("MongoDB triple indexes ensured");
        Ok(())
    }

    async fn replace_literal(
        &self,
        session: &mut ClientSession,
        subject: &str,
        predicate: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.triples
            .delete_many(doc! {
                "subject": subject,
                "predicate": predicate,
                "kind": TripleKind::Literal.as_str(),
            })
            .session(&mut *session)
            .await?;
        self.triples
            .insert_one(TripleDocument {
                id: None,
                subject: subject.to_string(),
                predicate: predicate.to_string(),
                kind: TripleKind::Literal,
                object: value.to_string(),
            })
            .session(&mut *session)
            .await?;
        Ok(())
    }

    async fn upsert_edge(
        &self,
        session: &mut ClientSession,
        subject: &str,
        predicate: &str,
        target: &str,
    ) -> Result<(), StoreError> {
        let filter = doc! {
            "subject": subject,
            "predicate": predicate,
            "kind": TripleKind::Uid.as_str(),
            "object": target,
        };
        self.triples
            .update_one(filter.clone(), doc! { "$setOnInsert": filter })
            .upsert(true)
            .session(&mut *session)
            .await?;
        Ok(())
    }

    async fn apply(
        &self,
        session: &mut ClientSession,
        mutation: &Mutation,
        uids: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let resolve = |term: &Term| -> Result<String, StoreError> {
            match term {
                Term::Uid(uid) => Ok(uid.clone()),
                Term::Blank(label) => uids.get(label).cloned().ok_or_else(|| {
                    StoreError::Inconsistent(format!("unresolved blank node _:{}", label))
                }),
            }
        };

        for statement in mutation.statements() {
            let subject = resolve(&statement.subject)?;
            match &statement.object {
                Object::Literal(value) => {
                    self.replace_literal(session, &subject, &statement.predicate, value)
                        .await?
                }
                Object::Node(term) => {
                    let target = resolve(term)?;
                    self.upsert_edge(session, &subject, &statement.predicate, &target)
                        .await?
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MongoGraph {
    async fn mutate(&self, mutation: &Mutation) -> Result<MutationResponse, StoreError> {
        if mutation.is_empty() {
            return Err(StoreError::Rejected("empty mutation".to_string()));
        }

        let uids: HashMap<String, String> = mutation
            .blank_labels()
            .into_iter()
            .map(|label| (label.to_string(), ObjectId::new().to_hex()))
            .collect();

        let mut session = self.mongo.client().start_session().await?;
        session.start_transaction().await?;
        if let Err(e) = self.apply(&mut session, mutation, &uids).await {
            if let Err(abort) = session.abort_transaction().await {
                tracing::warn!("Failed to abort triple transaction: {}", abort);
            }
            return Err(e);
        }
        session.commit_transaction().await?;

        Ok(MutationResponse { uids })
    }

    async fn node(&self, uid: &str) -> Result<Option<Node>, StoreError> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let mut cursor = self
            .triples
            .find(doc! { "subject": uid })
            .with_options(options)
            .await?;

        let mut node = Node::new(uid);
        while let Some(triple) = cursor.try_next().await? {
            let value = match triple.kind {
                TripleKind::Literal => Value::Literal(triple.object),
                TripleKind::Uid => Value::Uid(triple.object),
            };
            node.insert(&triple.predicate, value);
        }

        if node.is_empty() {
            Ok(None)
        } else {
            Ok(Some(node))
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.mongo.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "mongo"
    }
}
