use std::collections::BTreeMap;

use crate::model::{Answer, QuestionNumber};

/// In-memory answers for the active attempt, keyed by question number.
///
/// Every write replaces the whole entry for its question; there is no partial
/// update. Iteration is in question order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerLedger {
    entries: BTreeMap<QuestionNumber, Answer>,
}

impl AnswerLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `answer` for `question`, returning the answer it replaced.
    pub fn set_answer(&mut self, question: QuestionNumber, answer: Answer) -> Option<Answer> {
        self.entries.insert(question, answer)
    }

    #[must_use]
    pub fn get_answer(&self, question: QuestionNumber) -> Option<&Answer> {
        self.entries.get(&question)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionNumber, &Answer)> {
        self.entries.iter().map(|(number, answer)| (*number, answer))
    }
}
