//! Loads a quiz, its question bank and invited candidates into a graph store.
//!
//! Used to bootstrap `STORE_BACKEND=memory` runs (demo quiz or `SEED_FILE`)
//! and by tests to build fixtures through the same mutation path the engine
//! uses.

use serde::Deserialize;
use std::collections::HashMap;

use super::{GraphStore, Mutation, StoreError, Term};

#[derive(Debug, Clone, Deserialize)]
pub struct QuizSeed {
    pub name: String,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    pub questions: Vec<QuestionSeed>,
    #[serde(default)]
    pub candidates: Vec<CandidateSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionSeed {
    pub key: String,
    pub text: String,
    pub options: Vec<OptionSeed>,
    #[serde(default)]
    pub multiple: bool,
    pub positive: f64,
    pub negative: f64,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionSeed {
    pub name: String,
    #[serde(default)]
    pub correct: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateSeed {
    pub key: String,
    pub name: String,
    pub email: String,
}

fn default_level() -> u32 {
    1
}

/// Uids generated for a seeded quiz, keyed by the seed's own keys.
#[derive(Debug, Clone, Default)]
pub struct SeededQuiz {
    pub quiz: String,
    pub questions: HashMap<String, String>,
    /// (question key, option name) -> option uid.
    pub options: HashMap<(String, String), String>,
    pub candidates: HashMap<String, String>,
}

impl SeededQuiz {
    pub fn question(&self, key: &str) -> &str {
        self.questions.get(key).map(String::as_str).unwrap_or_default()
    }

    pub fn option(&self, question_key: &str, name: &str) -> &str {
        self.options
            .get(&(question_key.to_string(), name.to_string()))
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn candidate(&self, key: &str) -> &str {
        self.candidates
            .get(key)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl QuizSeed {
    pub fn to_mutation(&self) -> Mutation {
        let mut m = Mutation::new();
        let quiz = Term::blank("quiz");
        m.set_literal(quiz.clone(), "quiz.name", &self.name);
        if let Some(threshold) = self.threshold {
            m.set_literal(quiz.clone(), "quiz.threshold", threshold);
        }
        if let Some(duration) = self.duration_minutes {
            m.set_literal(quiz.clone(), "quiz.duration", duration);
        }

        for question in &self.questions {
            let qn = Term::blank(question_label(&question.key));
            m.set_edge(quiz.clone(), "quiz.question", qn.clone())
                .set_literal(qn.clone(), "text", &question.text)
                .set_literal(qn.clone(), "multiple", question.multiple)
                .set_literal(qn.clone(), "positive", question.positive)
                .set_literal(qn.clone(), "negative", question.negative)
                .set_literal(qn.clone(), "level", question.level);

            for (idx, option) in question.options.iter().enumerate() {
                let opt = Term::blank(option_label(&question.key, idx));
                m.set_edge(qn.clone(), "question.option", opt.clone())
                    .set_literal(opt.clone(), "name", &option.name);
                if option.correct {
                    m.set_edge(qn.clone(), "question.correct", opt);
                }
            }

            for tag in &question.tags {
                let tag_node = Term::blank(format!("tag.{}", tag));
                m.set_literal(tag_node.clone(), "name", tag)
                    .set_edge(qn.clone(), "question.tag", tag_node);
            }
        }

        for candidate in &self.candidates {
            let node = Term::blank(candidate_label(&candidate.key));
            m.set_literal(node.clone(), "name", &candidate.name)
                .set_literal(node.clone(), "email", &candidate.email)
                .set_edge(node, "candidate.quiz", quiz.clone());
        }

        m
    }

    pub async fn apply(&self, store: &dyn GraphStore) -> Result<SeededQuiz, StoreError> {
        let response = store.mutate(&self.to_mutation()).await?;
        let lookup = |label: &str| -> Result<String, StoreError> {
            response
                .uid(label)
                .map(str::to_string)
                .ok_or_else(|| StoreError::Inconsistent(format!("no uid for seed node {}", label)))
        };

        let mut seeded = SeededQuiz {
            quiz: lookup("quiz")?,
            ..SeededQuiz::default()
        };
        for question in &self.questions {
            seeded
                .questions
                .insert(question.key.clone(), lookup(&question_label(&question.key))?);
            for (idx, option) in question.options.iter().enumerate() {
                seeded.options.insert(
                    (question.key.clone(), option.name.clone()),
                    lookup(&option_label(&question.key, idx))?,
                );
            }
        }
        for candidate in &self.candidates {
            seeded.candidates.insert(
                candidate.key.clone(),
                lookup(&candidate_label(&candidate.key))?,
            );
        }

        tracing::info!(
            "Seeded quiz {} ({}) with {} questions and {} candidates",
            self.name,
            seeded.quiz,
            seeded.questions.len(),
            seeded.candidates.len()
        );
        Ok(seeded)
    }

    /// The three-question demo shipped with the terminal client.
    pub fn demo() -> Self {
        let option = |name: &str, correct: bool| OptionSeed {
            name: name.to_string(),
            correct,
        };
        QuizSeed {
            name: "Demo screening quiz".to_string(),
            threshold: Some(-10.0),
            duration_minutes: Some(60),
            questions: vec![
                QuestionSeed {
                    key: "capital".to_string(),
                    text: "What is the capital of France?".to_string(),
                    options: vec![
                        option("Berlin", false),
                        option("Paris", true),
                        option("Rome", false),
                        option("London", false),
                    ],
                    multiple: false,
                    positive: 5.0,
                    negative: 2.5,
                    level: 1,
                    tags: vec!["geography".to_string()],
                },
                QuestionSeed {
                    key: "google".to_string(),
                    text: "Which among the following were originally developed at Google?"
                        .to_string(),
                    options: vec![
                        option("Go programming language", true),
                        option("Ruby", false),
                        option("Angular", true),
                        option("Rust", false),
                    ],
                    multiple: true,
                    positive: 5.0,
                    negative: 2.5,
                    level: 1,
                    tags: vec!["technology".to_string()],
                },
                QuestionSeed {
                    key: "ocean".to_string(),
                    text: "Which one is the largest ocean in the world?".to_string(),
                    options: vec![
                        option("Indian", false),
                        option("Pacific", true),
                        option("Atlantic", false),
                        option("Arctic", false),
                    ],
                    multiple: false,
                    positive: 5.0,
                    negative: 2.5,
                    level: 2,
                    tags: vec!["geography".to_string()],
                },
            ],
            candidates: vec![CandidateSeed {
                key: "demo".to_string(),
                name: "Demo Candidate".to_string(),
                email: "demo@example.com".to_string(),
            }],
        }
    }
}

fn question_label(key: &str) -> String {
    format!("q.{}", key)
}

fn option_label(question_key: &str, idx: usize) -> String {
    format!("q.{}.o{}", question_key, idx)
}

fn candidate_label(key: &str) -> String {
    format!("c.{}", key)
}
