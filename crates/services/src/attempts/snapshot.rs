use exam_core::model::{AttemptId, QuestionNumber};
use exam_core::timer::{TimeThreshold, format_remaining};

use crate::attempts::phase::AttemptPhase;

/// Point-in-time view of an attempt for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptSnapshot {
    pub phase: AttemptPhase,
    pub attempt_id: Option<AttemptId>,
    pub current_question_index: usize,
    pub current_part_index: usize,
    /// `None` once every question has been answered.
    pub current_question: Option<QuestionNumber>,
    pub total_questions: usize,
    pub answered: usize,
    pub remaining_ms: u64,
    pub threshold: TimeThreshold,
    /// True while the resume dialog blocks the attempt.
    pub is_paused: bool,
}

impl AttemptSnapshot {
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_ms / 1_000
    }

    /// Remaining time as `H:MM:SS` or `M:SS`.
    #[must_use]
    pub fn remaining_display(&self) -> String {
        format_remaining(self.remaining_ms)
    }

    #[must_use]
    pub fn all_answered(&self) -> bool {
        self.current_question.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_remaining_time() {
        let snapshot = AttemptSnapshot {
            phase: AttemptPhase::InProgress,
            attempt_id: None,
            current_question_index: 3,
            current_part_index: 1,
            current_question: Some(QuestionNumber::new(4)),
            total_questions: 8,
            answered: 3,
            remaining_ms: 3_725_999,
            threshold: TimeThreshold::Normal,
            is_paused: false,
        };
        assert_eq!(snapshot.remaining_secs(), 3_725);
        assert_eq!(snapshot.remaining_display(), "1:02:05");
        assert!(!snapshot.all_answered());
    }
}
