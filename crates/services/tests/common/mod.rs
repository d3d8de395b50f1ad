#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use exam_core::model::{
    Answer, AttemptId, AudioClip, FeatureType, QuestionNumber, TestId, TestKind, TestPlan,
};
use services::api::{Affordability, ExamApi, ScoreReceipt};
use services::error::ApiError;

#[derive(Debug, Default)]
pub struct Calls {
    pub affordability_checks: Vec<FeatureType>,
    pub starts: Vec<TestId>,
    pub uploads: Vec<(AttemptId, u32)>,
    pub finishes: Vec<AttemptId>,
    pub submissions: Vec<(TestId, BTreeMap<String, String>)>,
}

#[derive(Debug)]
struct Behaviour {
    can_afford: bool,
    failing_finishes: u32,
    failing_starts: u32,
    finish_delay: Option<Duration>,
}

/// Backend fake that records every call.
#[derive(Debug)]
pub struct RecordingApi {
    calls: Mutex<Calls>,
    behaviour: Mutex<Behaviour>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Calls::default()),
            behaviour: Mutex::new(Behaviour {
                can_afford: true,
                failing_finishes: 0,
                failing_starts: 0,
                finish_delay: None,
            }),
        }
    }

    pub fn set_can_afford(&self, can_afford: bool) {
        self.behaviour.lock().unwrap().can_afford = can_afford;
    }

    /// Make the next `count` finish requests fail with a gateway error.
    pub fn fail_next_finishes(&self, count: u32) {
        self.behaviour.lock().unwrap().failing_finishes = count;
    }

    /// Hold every finish request for `delay` after it is recorded.
    pub fn delay_finishes(&self, delay: Duration) {
        self.behaviour.lock().unwrap().finish_delay = Some(delay);
    }

    pub fn fail_next_starts(&self, count: u32) {
        self.behaviour.lock().unwrap().failing_starts = count;
    }

    pub fn calls<R>(&self, read: impl FnOnce(&Calls) -> R) -> R {
        read(&self.calls.lock().unwrap())
    }

    fn take_failure(counter: &mut u32) -> Result<(), ApiError> {
        if *counter > 0 {
            *counter -= 1;
            return Err(ApiError::HttpStatus(reqwest::StatusCode::BAD_GATEWAY));
        }
        Ok(())
    }
}

#[async_trait]
impl ExamApi for RecordingApi {
    async fn check_affordability(&self, feature: FeatureType) -> Result<Affordability, ApiError> {
        self.calls.lock().unwrap().affordability_checks.push(feature);
        let can_afford = self.behaviour.lock().unwrap().can_afford;
        Ok(Affordability {
            can_afford,
            required_credits: 5,
            current_credits: if can_afford { 20 } else { 2 },
        })
    }

    async fn start_attempt(&self, test_id: &TestId) -> Result<AttemptId, ApiError> {
        Self::take_failure(&mut self.behaviour.lock().unwrap().failing_starts)?;
        let mut calls = self.calls.lock().unwrap();
        calls.starts.push(test_id.clone());
        Ok(AttemptId::new(format!("att-{}", calls.starts.len())))
    }

    async fn submit_question(
        &self,
        attempt_id: &AttemptId,
        question: QuestionNumber,
        _audio: &AudioClip,
    ) -> Result<(), ApiError> {
        self.calls
            .lock()
            .unwrap()
            .uploads
            .push((attempt_id.clone(), question.value()));
        Ok(())
    }

    async fn finish_attempt(&self, attempt_id: &AttemptId) -> Result<(), ApiError> {
        self.calls.lock().unwrap().finishes.push(attempt_id.clone());
        let delay = self.behaviour.lock().unwrap().finish_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Self::take_failure(&mut self.behaviour.lock().unwrap().failing_finishes)
    }

    async fn submit_and_score(
        &self,
        test_id: &TestId,
        answers: &BTreeMap<String, String>,
    ) -> Result<ScoreReceipt, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .submissions
            .push((test_id.clone(), answers.clone()));
        Self::take_failure(&mut self.behaviour.lock().unwrap().failing_finishes)?;
        Ok(ScoreReceipt {
            result_id: "result-1".into(),
        })
    }
}

/// Eight writing questions in three parts, one hour.
pub fn writing_plan() -> TestPlan {
    TestPlan::new(
        TestId::new("toeic-writing-01"),
        TestKind::Writing,
        Duration::from_secs(60 * 60),
        vec![5, 2, 1],
    )
    .unwrap()
}

/// Twenty speaking questions in two parts.
pub fn speaking_plan(duration: Duration) -> TestPlan {
    TestPlan::new(
        TestId::new("toeic-speaking-01"),
        TestKind::Speaking,
        duration,
        vec![11, 9],
    )
    .unwrap()
}

pub fn recording() -> Answer {
    Answer::from(AudioClip::new("audio/webm", vec![0, 1, 2, 3]))
}
