use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub uid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub uid: String,
    pub name: String,
}

/// Canonical question from the bank. Read-only during a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub uid: String,
    pub text: String,
    pub options: Vec<AnswerOption>,
    /// Uids of the correct options; never sent to the candidate.
    pub correct: BTreeSet<String>,
    pub multiple: bool,
    pub positive: f64,
    pub negative: f64,
    pub level: u32,
    pub tags: Vec<Tag>,
}

impl Question {
    pub fn has_option(&self, option_uid: &str) -> bool {
        self.options.iter().any(|option| option.uid == option_uid)
    }

    /// Fully correct means exactly the correct set, no more and no less.
    pub fn is_correct_selection(&self, selected: &BTreeSet<String>) -> bool {
        !selected.is_empty() && *selected == self.correct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multi() -> Question {
        Question {
            uid: "0x10".to_string(),
            text: "Which were developed at Google?".to_string(),
            options: ["0x11", "0x12", "0x13"]
                .iter()
                .map(|uid| AnswerOption {
                    uid: uid.to_string(),
                    name: format!("option {}", uid),
                })
                .collect(),
            correct: ["0x11", "0x13"].iter().map(|s| s.to_string()).collect(),
            multiple: true,
            positive: 5.0,
            negative: 2.5,
            level: 1,
            tags: Vec::new(),
        }
    }

    #[test]
    fn partial_selection_is_not_correct() {
        let question = multi();
        let partial: BTreeSet<String> = ["0x11".to_string()].into_iter().collect();
        let full: BTreeSet<String> = ["0x13".to_string(), "0x11".to_string()]
            .into_iter()
            .collect();
        let extra: BTreeSet<String> = ["0x11", "0x12", "0x13"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert!(!question.is_correct_selection(&partial));
        assert!(question.is_correct_selection(&full));
        assert!(!question.is_correct_selection(&extra));
        assert!(!question.is_correct_selection(&BTreeSet::new()));
    }

    #[test]
    fn option_membership() {
        let question = multi();
        assert!(question.has_option("0x12"));
        assert!(!question.has_option("0x99"));
    }
}
