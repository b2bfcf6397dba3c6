//! Execution provider backed by the sandbox service's HTTP API.
//!
//! Remote failures of every kind come back as failed [`ExecutionResult`]
//! values so the caller can relay them; the only hard error is an empty
//! prompt.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sandbox_relay_core::traits::ExecutionError;
use sandbox_relay_core::{ExecutionContext, ExecutionProvider, ExecutionRequest, ExecutionResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Added on top of the configured execution timeout so the service can
/// report its own timeout before the HTTP request gives up.
const EXEC_TIMEOUT_HEADROOM: Duration = Duration::from_secs(5);

/// Context creation is quick compared to execution.
const CREATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Runtime image requested for new contexts.
const DEFAULT_RUNTIME: &str = "node22";

/// Relayed when execution is requested but no credentials are configured.
const MISSING_TOKEN_ERROR: &str =
    "missing sandbox credentials: set SANDBOX_TOKEN to enable execution";

/// Connection details and resource limits for the sandbox service.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Base URL of the service, without a trailing slash.
    pub api_url: String,
    /// Bearer token; `None` turns every execution into a relayed failure.
    pub token: Option<String>,
    /// Optional project to bill new contexts against.
    pub project_id: Option<String>,
    /// Optional team to bill new contexts against.
    pub team_id: Option<String>,
    /// Per-execution timeout in milliseconds.
    pub timeout_ms: u64,
    /// Memory limit for new contexts, in megabytes.
    pub max_memory_mb: u64,
    /// CPU limit for new contexts.
    pub max_cpus: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("project_id", &self.project_id)
            .field("team_id", &self.team_id)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_memory_mb", &self.max_memory_mb)
            .field("max_cpus", &self.max_cpus)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct CreateContextRequest<'a> {
    runtime: &'a str,
    timeout_ms: u64,
    memory_mb: u64,
    cpus: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreateContextResponse {
    session_id: String,
    sandbox_id: String,
}

#[derive(Debug, Serialize)]
struct ExecRequest<'a> {
    prompt: &'a str,
    sandbox_id: &'a str,
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ExecResponse {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    exit_code: i32,
}

/// [`ExecutionProvider`] talking to the sandbox service over HTTP.
pub struct SandboxProvider {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl SandboxProvider {
    /// Create a provider for the configured service.
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        let request_timeout = Duration::from_millis(config.timeout_ms) + EXEC_TIMEOUT_HEADROOM;
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, config }
    }

    /// Provision a fresh context and run the prompt in it.
    async fn exec_fresh(&self, token: &str, prompt: &str, started: Instant) -> ExecutionResult {
        let context = match self.create_context(token).await {
            Ok(context) => context,
            Err(error) => {
                warn!(error = %error, "context provisioning failed");
                return failure_result(None, started, &error);
            }
        };
        debug!(
            session_id = %context.session_id,
            sandbox_id = %context.sandbox_id,
            "provisioned sandbox context"
        );
        self.exec_in_context(token, &context, prompt, started).await
    }

    async fn create_context(&self, token: &str) -> Result<ExecutionContext, String> {
        let url = format!("{}/v1/sessions", self.config.api_url);
        let body = CreateContextRequest {
            runtime: DEFAULT_RUNTIME,
            timeout_ms: self.config.timeout_ms,
            memory_mb: self.config.max_memory_mb,
            cpus: self.config.max_cpus,
            project_id: self.config.project_id.as_deref(),
            team_id: self.config.team_id.as_deref(),
        };

        let response = self
            .http
            .post(&url)
            .timeout(CREATE_TIMEOUT)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("sandbox service unreachable: {e}"))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(format!("context creation failed: HTTP {status}: {text}"));
        }

        let created: CreateContextResponse = serde_json::from_str(&text)
            .map_err(|e| format!("malformed context creation response: {e}"))?;
        Ok(ExecutionContext {
            session_id: created.session_id,
            sandbox_id: created.sandbox_id,
        })
    }

    /// Run the prompt against an existing context.
    ///
    /// A 404 means the service dropped the context; that is reported as a
    /// failure instead of provisioning a replacement, so the caller never
    /// loses a conversation silently.
    async fn exec_in_context(
        &self,
        token: &str,
        context: &ExecutionContext,
        prompt: &str,
        started: Instant,
    ) -> ExecutionResult {
        let url = format!(
            "{}/v1/sessions/{}/exec",
            self.config.api_url, context.session_id
        );
        let body = ExecRequest {
            prompt,
            sandbox_id: &context.sandbox_id,
            timeout_ms: self.config.timeout_ms,
        };

        let response = match self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return failure_result(
                    Some(context),
                    started,
                    &format!("sandbox service unreachable: {e}"),
                );
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            warn!(session_id = %context.session_id, "context no longer exists on the service");
            return failure_result(
                Some(context),
                started,
                &format!(
                    "context not found: session {} no longer exists",
                    context.session_id
                ),
            );
        }
        if !status.is_success() {
            return failure_result(
                Some(context),
                started,
                &format!("execution failed: HTTP {status}: {text}"),
            );
        }

        match serde_json::from_str::<ExecResponse>(&text) {
            Ok(exec) => map_exec_response(context, exec, started.elapsed()),
            Err(e) => failure_result(
                Some(context),
                started,
                &format!("malformed execution response: {e}"),
            ),
        }
    }
}

#[async_trait]
impl ExecutionProvider for SandboxProvider {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, ExecutionError> {
        if request.prompt.trim().is_empty() {
            return Err(ExecutionError::EmptyPrompt);
        }
        let started = Instant::now();

        let Some(token) = self.config.token.clone() else {
            warn!("execution requested without sandbox credentials");
            return Ok(failure_result(
                request.context.as_ref(),
                started,
                MISSING_TOKEN_ERROR,
            ));
        };

        let result = match &request.context {
            Some(context) => {
                self.exec_in_context(&token, context, &request.prompt, started)
                    .await
            }
            None => self.exec_fresh(&token, &request.prompt, started).await,
        };
        Ok(result)
    }
}

/// Translate the service's exec response into an [`ExecutionResult`].
fn map_exec_response(
    context: &ExecutionContext,
    response: ExecResponse,
    elapsed: Duration,
) -> ExecutionResult {
    let duration_ms = elapsed.as_millis() as u64;
    if response.exit_code == 0 {
        ExecutionResult::completed(
            context.session_id.as_str(),
            context.sandbox_id.as_str(),
            response.stdout,
            duration_ms,
        )
    } else {
        let error = if response.stderr.trim().is_empty() {
            format!("command exited with status {}", response.exit_code)
        } else {
            response.stderr
        };
        ExecutionResult::failed(
            context.session_id.as_str(),
            context.sandbox_id.as_str(),
            response.stdout,
            duration_ms,
            error,
        )
    }
}

/// Failed result carrying whatever context ids are known.
fn failure_result(
    context: Option<&ExecutionContext>,
    started: Instant,
    error: &str,
) -> ExecutionResult {
    let (session_id, sandbox_id) = match context {
        Some(context) => (context.session_id.as_str(), context.sandbox_id.as_str()),
        None => ("", ""),
    };
    ExecutionResult::failed(
        session_id,
        sandbox_id,
        "",
        started.elapsed().as_millis() as u64,
        error,
    )
}
