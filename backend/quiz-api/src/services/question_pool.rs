use rand::seq::SliceRandom;
use std::collections::{BTreeMap, VecDeque};

use crate::models::question::{AnswerOption, Question};

/// Pending questions of a session, one FIFO queue per level.
///
/// The delivered question stays at the head of its queue until an answer for
/// it is accepted; `peek` serves the re-delivery check and `pop_front` is only
/// called by answer intake.
#[derive(Debug, Clone, Default)]
pub struct QuestionPool {
    levels: BTreeMap<u32, VecDeque<Question>>,
}

impl QuestionPool {
    /// Groups questions by level, keeping their relative order.
    pub fn from_questions(questions: impl IntoIterator<Item = Question>) -> Self {
        let mut levels: BTreeMap<u32, VecDeque<Question>> = BTreeMap::new();
        for question in questions {
            levels.entry(question.level).or_default().push_back(question);
        }
        levels.retain(|_, queue| !queue.is_empty());
        Self { levels }
    }

    /// Lowest level with questions left.
    pub fn current_level(&self) -> Option<u32> {
        self.levels
            .iter()
            .find(|(_, queue)| !queue.is_empty())
            .map(|(level, _)| *level)
    }

    pub fn peek(&self) -> Option<&Question> {
        self.current_level()
            .and_then(|level| self.levels.get(&level))
            .and_then(|queue| queue.front())
    }

    pub fn pop_front(&mut self) -> Option<Question> {
        let level = self.current_level()?;
        let queue = self.levels.get_mut(&level)?;
        let question = queue.pop_front();
        if queue.is_empty() {
            self.levels.remove(&level);
        }
        question
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_level().is_none()
    }

    pub fn remaining(&self) -> usize {
        self.levels.values().map(VecDeque::len).sum()
    }
}

/// Options in a fresh random order for display. The question is untouched.
pub fn shuffled_options(question: &Question) -> Vec<AnswerOption> {
    let mut options = question.options.clone();
    options.shuffle(&mut rand::rng());
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn question(uid: &str, level: u32) -> Question {
        Question {
            uid: uid.to_string(),
            text: format!("question {}", uid),
            options: (0..6)
                .map(|i| AnswerOption {
                    uid: format!("{}.{}", uid, i),
                    name: format!("option {}", i),
                })
                .collect(),
            correct: BTreeSet::from([format!("{}.0", uid)]),
            multiple: false,
            positive: 5.0,
            negative: 2.5,
            level,
            tags: Vec::new(),
        }
    }

    #[test]
    fn delivers_lowest_level_first_in_fifo_order() {
        let mut pool = QuestionPool::from_questions(vec![
            question("hard-1", 3),
            question("easy-1", 1),
            question("easy-2", 1),
            question("medium-1", 2),
        ]);

        assert_eq!(pool.remaining(), 4);
        assert_eq!(pool.current_level(), Some(1));

        let order: Vec<String> = std::iter::from_fn(|| pool.pop_front())
            .map(|q| q.uid)
            .collect();
        assert_eq!(order, vec!["easy-1", "easy-2", "medium-1", "hard-1"]);
        assert!(pool.is_exhausted());
        assert_eq!(pool.current_level(), None);
    }

    #[test]
    fn peek_does_not_consume() {
        let pool = QuestionPool::from_questions(vec![question("q1", 1), question("q2", 1)]);
        assert_eq!(pool.peek().map(|q| q.uid.as_str()), Some("q1"));
        assert_eq!(pool.peek().map(|q| q.uid.as_str()), Some("q1"));
        assert_eq!(pool.remaining(), 2);
    }

    #[test]
    fn emptied_level_hands_over_to_the_next() {
        let mut pool = QuestionPool::from_questions(vec![question("q1", 1), question("q2", 2)]);
        assert_eq!(pool.current_level(), Some(1));
        pool.pop_front();
        assert_eq!(pool.current_level(), Some(2));
        assert_eq!(pool.peek().map(|q| q.uid.as_str()), Some("q2"));
        assert_eq!(pool.remaining(), 1);
    }

    #[test]
    fn shuffle_keeps_option_content() {
        let q = question("q1", 1);
        let shuffled = shuffled_options(&q);

        let mut original_ids: Vec<&str> = q.options.iter().map(|o| o.uid.as_str()).collect();
        let mut shuffled_ids: Vec<&str> = shuffled.iter().map(|o| o.uid.as_str()).collect();
        original_ids.sort();
        shuffled_ids.sort();
        assert_eq!(original_ids, shuffled_ids);
        assert_eq!(q.options[0].uid, "q1.0");
    }
}
