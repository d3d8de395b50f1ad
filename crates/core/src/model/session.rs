use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{AnswerLedger, TestId};
use crate::timer::SessionClock;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CursorError {
    #[error("question cursor cannot move back from {current} to {requested}")]
    Rewind { current: usize, requested: usize },
}

/// Transient state of one active attempt.
///
/// The question cursor only moves forward while the attempt is active.
#[derive(Debug, Clone)]
pub struct TestSession {
    test_id: TestId,
    started_at: DateTime<Utc>,
    current_question_index: usize,
    current_part_index: usize,
    answers: AnswerLedger,
    clock: SessionClock,
}

impl TestSession {
    #[must_use]
    pub fn new(test_id: TestId, started_at: DateTime<Utc>) -> Self {
        Self {
            test_id,
            started_at,
            current_question_index: 0,
            current_part_index: 0,
            answers: AnswerLedger::new(),
            clock: SessionClock::new(),
        }
    }

    #[must_use]
    pub fn test_id(&self) -> &TestId {
        &self.test_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    #[must_use]
    pub fn current_part_index(&self) -> usize {
        self.current_part_index
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerLedger {
        &self.answers
    }

    pub fn answers_mut(&mut self) -> &mut AnswerLedger {
        &mut self.answers
    }

    #[must_use]
    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut SessionClock {
        &mut self.clock
    }

    #[must_use]
    pub fn time_remaining_ms(&self) -> u64 {
        self.clock.remaining_ms()
    }

    /// True while the clock holds a reading but is not counting down.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    /// Move the cursor to `index` within `part`.
    ///
    /// # Errors
    ///
    /// Returns `CursorError::Rewind` if `index` is behind the current cursor.
    pub fn advance_to(&mut self, index: usize, part: usize) -> Result<(), CursorError> {
        if index < self.current_question_index {
            return Err(CursorError::Rewind {
                current: self.current_question_index,
                requested: index,
            });
        }
        self.current_question_index = index;
        self.current_part_index = part;
        Ok(())
    }

    /// Drop all progress and begin again at `started_at`.
    pub fn restart(&mut self, started_at: DateTime<Utc>) {
        self.started_at = started_at;
        self.current_question_index = 0;
        self.current_part_index = 0;
        self.answers.clear();
        self.clock = SessionClock::new();
    }
}
