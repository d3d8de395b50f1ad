use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ParseIdError, QuestionNumber, TestId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlanError {
    #[error("test must contain at least one part")]
    NoParts,

    #[error("part {index} has no questions")]
    EmptyPart { index: usize },

    #[error("test duration must be positive")]
    ZeroDuration,

    #[error("first question number must be at least 1")]
    InvalidFirstQuestion,
}

//
// ─── TEST KIND ────────────────────────────────────────────────────────────────
//

/// Kind of test being attempted. Decides the priced feature, the recovery
/// slot and how answers reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Speaking,
    Writing,
}

/// How answers of a test kind are delivered to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionShape {
    /// Each answer is uploaded as soon as it is given; finishing only signals the end.
    Incremental,
    /// Answers stay local and are sent together when the attempt finishes.
    Batched,
}

/// Credit-priced feature consumed by an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    SpeakingTest,
    WritingTest,
}

impl FeatureType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureType::SpeakingTest => "SPEAKING_TEST",
            FeatureType::WritingTest => "WRITING_TEST",
        }
    }
}

impl TestKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TestKind::Speaking => "speaking",
            TestKind::Writing => "writing",
        }
    }

    #[must_use]
    pub fn feature(self) -> FeatureType {
        match self {
            TestKind::Speaking => FeatureType::SpeakingTest,
            TestKind::Writing => FeatureType::WritingTest,
        }
    }

    #[must_use]
    pub fn submission_shape(self) -> SubmissionShape {
        match self {
            TestKind::Speaking => SubmissionShape::Incremental,
            TestKind::Writing => SubmissionShape::Batched,
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "speaking" => Ok(TestKind::Speaking),
            "writing" => Ok(TestKind::Writing),
            _ => Err(ParseIdError::new("TestKind")),
        }
    }
}

//
// ─── TEST PLAN ────────────────────────────────────────────────────────────────
//

/// Static shape of a test: which test, how long, and how questions are grouped
/// into parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPlan {
    test_id: TestId,
    kind: TestKind,
    duration_ms: u64,
    parts: Vec<usize>,
    first_question_number: u32,
}

impl TestPlan {
    /// Build a plan from per-part question counts.
    ///
    /// # Errors
    ///
    /// Returns `PlanError` if there are no parts, a part is empty, or the
    /// duration is zero.
    pub fn new(
        test_id: TestId,
        kind: TestKind,
        duration: Duration,
        parts: Vec<usize>,
    ) -> Result<Self, PlanError> {
        if parts.is_empty() {
            return Err(PlanError::NoParts);
        }
        if let Some(index) = parts.iter().position(|count| *count == 0) {
            return Err(PlanError::EmptyPart { index });
        }
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        if duration_ms == 0 {
            return Err(PlanError::ZeroDuration);
        }

        Ok(Self {
            test_id,
            kind,
            duration_ms,
            parts,
            first_question_number: 1,
        })
    }

    /// Number printed on the first question (TOEIC writing starts at 1,
    /// some practice sets continue numbering from a previous section).
    ///
    /// # Errors
    ///
    /// Returns `PlanError::InvalidFirstQuestion` for 0.
    pub fn with_first_question_number(mut self, first: u32) -> Result<Self, PlanError> {
        if first == 0 {
            return Err(PlanError::InvalidFirstQuestion);
        }
        self.first_question_number = first;
        Ok(self)
    }

    #[must_use]
    pub fn test_id(&self) -> &TestId {
        &self.test_id
    }

    #[must_use]
    pub fn kind(&self) -> TestKind {
        self.kind
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    #[must_use]
    pub fn parts(&self) -> &[usize] {
        &self.parts
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.parts.iter().sum()
    }

    /// Question number shown for the zero-based `index`, if it is in range.
    #[must_use]
    pub fn question_number(&self, index: usize) -> Option<QuestionNumber> {
        if index >= self.total_questions() {
            return None;
        }
        let offset = u32::try_from(index).ok()?;
        self.first_question_number
            .checked_add(offset)
            .map(QuestionNumber::new)
    }

    /// Part containing the zero-based question `index`.
    ///
    /// Indices past the end map to the last part.
    #[must_use]
    pub fn part_index_for(&self, index: usize) -> usize {
        let mut start = 0;
        for (part, count) in self.parts.iter().enumerate() {
            if index < start + count {
                return part;
            }
            start += count;
        }
        self.parts.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writing_plan() -> TestPlan {
        TestPlan::new(
            TestId::new("writing-1"),
            TestKind::Writing,
            Duration::from_secs(60 * 60),
            vec![5, 2, 1],
        )
        .unwrap()
    }

    #[test]
    fn part_index_follows_question_layout() {
        let plan = writing_plan();
        assert_eq!(plan.total_questions(), 8);
        assert_eq!(plan.part_index_for(0), 0);
        assert_eq!(plan.part_index_for(4), 0);
        assert_eq!(plan.part_index_for(5), 1);
        assert_eq!(plan.part_index_for(7), 2);
        assert_eq!(plan.part_index_for(8), 2);
    }

    #[test]
    fn question_numbers_offset_from_first() {
        let plan = writing_plan().with_first_question_number(11).unwrap();
        assert_eq!(plan.question_number(0), Some(QuestionNumber::new(11)));
        assert_eq!(plan.question_number(7), Some(QuestionNumber::new(18)));
        assert_eq!(plan.question_number(8), None);
    }

    #[test]
    fn rejects_empty_part() {
        let err = TestPlan::new(
            TestId::new("t"),
            TestKind::Speaking,
            Duration::from_secs(60),
            vec![3, 0],
        )
        .unwrap_err();
        assert_eq!(err, PlanError::EmptyPart { index: 1 });
    }

    #[test]
    fn rejects_zero_duration() {
        let err = TestPlan::new(TestId::new("t"), TestKind::Speaking, Duration::ZERO, vec![1])
            .unwrap_err();
        assert_eq!(err, PlanError::ZeroDuration);
    }

    #[test]
    fn kind_maps_to_feature_and_shape() {
        assert_eq!(TestKind::Speaking.feature(), FeatureType::SpeakingTest);
        assert_eq!(TestKind::Writing.submission_shape(), SubmissionShape::Batched);
        assert_eq!("Speaking".parse::<TestKind>().unwrap(), TestKind::Speaking);
        assert!("reading".parse::<TestKind>().is_err());
    }
}
