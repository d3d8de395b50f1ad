use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use url::Url;

use exam_core::model::{AttemptId, AudioClip, FeatureType, QuestionNumber, TestId};

use super::{Affordability, ExamApi, ScoreReceipt};
use crate::error::ApiError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: Url,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

impl ApiConfig {
    /// Build a config for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if the URL does not parse or cannot
    /// carry a path.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut base_url =
            Url::parse(base_url.trim()).map_err(|err| ApiError::InvalidUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Read `EXAM_API_BASE_URL`, `EXAM_API_TOKEN` and `EXAM_API_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotConfigured` when the base URL is unset and
    /// `ApiError::InvalidUrl` when it does not parse.
    pub fn from_env() -> Result<Self, ApiError> {
        let base_url = env::var("EXAM_API_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ApiError::NotConfigured("EXAM_API_BASE_URL is not set"))?;
        let mut config = Self::new(&base_url)?;
        config.api_token = env::var("EXAM_API_TOKEN")
            .ok()
            .filter(|value| !value.trim().is_empty());
        if let Some(secs) = env::var("EXAM_API_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Resolve an endpoint below the base URL, escaping every segment.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if the base URL cannot take path segments.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// `ExamApi` over the REST backend.
#[derive(Clone)]
pub struct HttpExamApi {
    client: Client,
    config: ApiConfig,
}

impl HttpExamApi {
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// # Errors
    ///
    /// See [`ApiConfig::from_env`] and [`HttpExamApi::new`].
    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(ApiConfig::from_env()?)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status()));
        }
        Ok(response.json().await?)
    }

    fn ensure_success(body: SuccessResponse, what: &str) -> Result<(), ApiError> {
        if body.success {
            Ok(())
        } else {
            Err(ApiError::Rejected(
                body.message.unwrap_or_else(|| format!("{what} was not accepted")),
            ))
        }
    }
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn check_affordability(&self, feature: FeatureType) -> Result<Affordability, ApiError> {
        let url = self.config.endpoint(&["credits", "affordability"])?;
        tracing::debug!(feature = feature.as_str(), "checking affordability");
        let response = self
            .authorize(self.client.get(url))
            .query(&[("featureType", feature.as_str())])
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn start_attempt(&self, test_id: &TestId) -> Result<AttemptId, ApiError> {
        let url = self.config.endpoint(&["tests", test_id.as_str(), "attempts"])?;
        tracing::debug!(%test_id, "starting attempt");
        let response = self.authorize(self.client.post(url)).send().await?;
        let body: StartAttemptResponse = Self::read_json(response).await?;
        Ok(body.attempt_id)
    }

    async fn submit_question(
        &self,
        attempt_id: &AttemptId,
        question: QuestionNumber,
        audio: &AudioClip,
    ) -> Result<(), ApiError> {
        let number = question.to_string();
        let url = self.config.endpoint(&[
            "attempts",
            attempt_id.as_str(),
            "questions",
            number.as_str(),
        ])?;
        let part = Part::bytes(audio.bytes().to_vec())
            .file_name(format!("question_{number}"))
            .mime_str(audio.mime_type())?;
        let form = Form::new()
            .text("questionNumber", number.clone())
            .part("audio", part);

        tracing::debug!(%attempt_id, question = %number, bytes = audio.len(), "uploading answer");
        let response = self
            .authorize(self.client.post(url))
            .multipart(form)
            .send()
            .await?;
        let body: SuccessResponse = Self::read_json(response).await?;
        Self::ensure_success(body, "answer upload")
    }

    async fn finish_attempt(&self, attempt_id: &AttemptId) -> Result<(), ApiError> {
        let url = self
            .config
            .endpoint(&["attempts", attempt_id.as_str(), "finish"])?;
        tracing::debug!(%attempt_id, "finishing attempt");
        let response = self.authorize(self.client.post(url)).send().await?;
        let body: SuccessResponse = Self::read_json(response).await?;
        Self::ensure_success(body, "finish")
    }

    async fn submit_and_score(
        &self,
        test_id: &TestId,
        answers: &BTreeMap<String, String>,
    ) -> Result<ScoreReceipt, ApiError> {
        let url = self.config.endpoint(&["tests", test_id.as_str(), "submit"])?;
        tracing::debug!(%test_id, answers = answers.len(), "submitting answers for scoring");
        let response = self
            .authorize(self.client.post(url))
            .json(&SubmitAndScoreRequest { answers })
            .send()
            .await?;
        Self::read_json(response).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartAttemptResponse {
    attempt_id: AttemptId,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubmitAndScoreRequest<'a> {
    answers: &'a BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_escaped_segments() {
        let config = ApiConfig::new("https://api.example.test/v1").unwrap();
        assert_eq!(config.base_url.as_str(), "https://api.example.test/v1/");

        let url = config
            .endpoint(&["attempts", "att 1/2", "questions", "3"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.test/v1/attempts/att%201%2F2/questions/3"
        );
    }

    #[test]
    fn endpoint_on_root_base() {
        let config = ApiConfig::new("http://localhost:8080").unwrap();
        let url = config.endpoint(&["credits", "affordability"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/credits/affordability");
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(
            ApiConfig::new("not a url"),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            ApiConfig::new("mailto:someone@example.test"),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn affordability_decodes_camel_case() {
        let body = r#"{"canAfford":false,"requiredCredits":10,"currentCredits":3}"#;
        let parsed: Affordability = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed,
            Affordability {
                can_afford: false,
                required_credits: 10,
                current_credits: 3,
            }
        );
    }

    #[test]
    fn rejected_success_flag_carries_server_message() {
        let body = SuccessResponse {
            success: false,
            message: Some("attempt already closed".into()),
        };
        let err = HttpExamApi::ensure_success(body, "finish").unwrap_err();
        assert_eq!(err.to_string(), "exam api rejected the request: attempt already closed");
    }

    #[test]
    fn submit_request_wraps_answers() {
        let mut answers = BTreeMap::new();
        answers.insert("question_1".to_string(), "Dear team".to_string());
        let value = serde_json::to_value(SubmitAndScoreRequest { answers: &answers }).unwrap();
        assert_eq!(value["answers"]["question_1"], "Dear team");
    }
}
