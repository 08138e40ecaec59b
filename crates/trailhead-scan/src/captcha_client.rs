use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::scan_types::ScanError;

/// Settings for the Anti-Captcha solver account
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// Solver API base URL
    pub api_base: String,

    /// Account key for the solver API
    pub client_key: String,

    /// Seconds between solution polls
    pub poll_interval_secs: u64,

    /// How many polls before giving up on a task
    pub max_polls: u32,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.anti-captcha.com".to_string(),
            client_key: String::new(),
            poll_interval_secs: 5,
            max_polls: 24,
        }
    }
}

/// Client for the Anti-Captcha task API
pub struct AntiCaptchaClient {
    client: Client,
    config: CaptchaConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest<'a> {
    client_key: &'a str,
    task: RecaptchaTask<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecaptchaTask<'a> {
    #[serde(rename = "type")]
    task_type: &'static str,
    #[serde(rename = "websiteURL")]
    website_url: &'a str,
    website_key: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    error_id: i64,
    task_id: Option<i64>,
    error_code: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultRequest<'a> {
    client_key: &'a str,
    task_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultResponse {
    error_id: i64,
    status: Option<String>,
    solution: Option<RecaptchaSolution>,
    error_code: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecaptchaSolution {
    g_recaptcha_response: String,
}

impl AntiCaptchaClient {
    /// Create a solver client. The account key is checked at solve time, so
    /// runs that reuse cached session cookies never need one.
    pub fn new(config: CaptchaConfig) -> Result<Self, ScanError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ScanError::ApiError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Solve the recaptcha on `website_url`, returning the response token
    /// to hand off upstream.
    pub async fn solve_recaptcha(
        &self,
        website_url: &str,
        site_key: &str,
    ) -> Result<String, ScanError> {
        if self.config.client_key.is_empty() {
            return Err(ScanError::ConfigError(
                "Anti-Captcha client key is not configured".to_string(),
            ));
        }

        let task_id = self.create_task(website_url, site_key).await?;
        info!("Created captcha task {}", task_id);

        for poll in 0..self.config.max_polls {
            sleep(Duration::from_secs(self.config.poll_interval_secs)).await;

            match self.task_result(task_id).await? {
                Some(token) => {
                    debug!("Captcha task {} solved after {} polls", task_id, poll + 1);
                    return Ok(token);
                }
                None => debug!("Captcha task {} still processing", task_id),
            }
        }

        Err(ScanError::Captcha(format!(
            "Task {task_id} was not solved within {} polls",
            self.config.max_polls
        )))
    }

    async fn create_task(&self, website_url: &str, site_key: &str) -> Result<i64, ScanError> {
        let request = CreateTaskRequest {
            client_key: &self.config.client_key,
            task: RecaptchaTask {
                task_type: "NoCaptchaTaskProxyless",
                website_url,
                website_key: site_key,
            },
        };

        let response = self
            .client
            .post(format!("{}/createTask", self.config.api_base))
            .json(&request)
            .send()
            .await
            .map_err(|e| ScanError::Network(format!("Captcha task creation failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ScanError::ApiError(format!("HTTP {}", response.status())));
        }

        let created: CreateTaskResponse = response
            .json()
            .await
            .map_err(|e| ScanError::DataFormat(format!("Unreadable createTask response: {e}")))?;

        if created.error_id != 0 {
            return Err(ScanError::Captcha(describe_error(
                created.error_code,
                created.error_description,
            )));
        }
        created
            .task_id
            .ok_or_else(|| ScanError::Captcha("createTask returned no task id".to_string()))
    }

    async fn task_result(&self, task_id: i64) -> Result<Option<String>, ScanError> {
        let request = TaskResultRequest {
            client_key: &self.config.client_key,
            task_id,
        };

        let response = self
            .client
            .post(format!("{}/getTaskResult", self.config.api_base))
            .json(&request)
            .send()
            .await
            .map_err(|e| ScanError::Network(format!("Captcha poll failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ScanError::ApiError(format!("HTTP {}", response.status())));
        }

        let result: TaskResultResponse = response
            .json()
            .await
            .map_err(|e| ScanError::DataFormat(format!("Unreadable getTaskResult response: {e}")))?;

        if result.error_id != 0 {
            return Err(ScanError::Captcha(describe_error(
                result.error_code,
                result.error_description,
            )));
        }

        if result.status.as_deref() == Some("ready") {
            let solution = result
                .solution
                .ok_or_else(|| ScanError::Captcha("Ready task carried no solution".to_string()))?;
            return Ok(Some(solution.g_recaptcha_response));
        }
        Ok(None)
    }
}

fn describe_error(code: Option<String>, description: Option<String>) -> String {
    match (code, description) {
        (Some(code), Some(description)) => format!("{code}: {description}"),
        (Some(code), None) => code,
        (None, Some(description)) => description,
        (None, None) => "unspecified solver error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> CaptchaConfig {
        CaptchaConfig {
            api_base: server.uri(),
            client_key: "test-key".to_string(),
            poll_interval_secs: 0,
            max_polls: 3,
        }
    }

    #[tokio::test]
    async fn test_solve_polls_until_ready() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/createTask"))
            .and(body_partial_json(json!({
                "clientKey": "test-key",
                "task": {
                    "type": "NoCaptchaTaskProxyless",
                    "websiteURL": "https://example.org/permits",
                    "websiteKey": "site-key"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errorId": 0,
                "taskId": 7
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/getTaskResult"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errorId": 0,
                "status": "processing"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/getTaskResult"))
            .and(body_partial_json(json!({ "clientKey": "test-key", "taskId": 7 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errorId": 0,
                "status": "ready",
                "solution": { "gRecaptchaResponse": "solved-token" }
            })))
            .mount(&server)
            .await;

        let solver = AntiCaptchaClient::new(test_config(&server)).unwrap();
        let token = solver
            .solve_recaptcha("https://example.org/permits", "site-key")
            .await
            .unwrap();
        assert_eq!(token, "solved-token");
    }

    #[tokio::test]
    async fn test_solver_error_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/createTask"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errorId": 1,
                "errorCode": "ERROR_KEY_DOES_NOT_EXIST",
                "errorDescription": "Account authorization key not found in the system"
            })))
            .mount(&server)
            .await;

        let solver = AntiCaptchaClient::new(test_config(&server)).unwrap();
        let err = solver
            .solve_recaptcha("https://example.org/permits", "site-key")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Captcha(msg) if msg.contains("ERROR_KEY_DOES_NOT_EXIST")));
    }

    #[tokio::test]
    async fn test_unsolved_task_gives_up() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/createTask"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errorId": 0,
                "taskId": 9
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/getTaskResult"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errorId": 0,
                "status": "processing"
            })))
            .expect(3)
            .mount(&server)
            .await;

        let solver = AntiCaptchaClient::new(test_config(&server)).unwrap();
        let err = solver
            .solve_recaptcha("https://example.org/permits", "site-key")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Captcha(_)));
    }

    #[tokio::test]
    async fn test_missing_client_key_is_config_error() {
        let solver = AntiCaptchaClient::new(CaptchaConfig::default()).unwrap();
        let err = solver
            .solve_recaptcha("https://example.org/permits", "site-key")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ConfigError(_)));
    }
}
