//! Response generators.
//!
//! Both generators report every failure as [`RagError::Generation`]
//! carrying the exact text to show the user, so the query command always
//! prints a response.
//!
//! [`check_cli_available`] runs once at startup for the `gemini-cli`
//! provider so a missing executable fails fast instead of per query.

use std::io::Write;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use codebase_rag_core::retrieve::Generator;
use codebase_rag_core::RagError;

use crate::config::{self, GenerationConfig, API_KEY_ENV};
use crate::embedding::{http_client, send_with_retry, GEMINI_API_BASE};

pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "gemini" => Ok(Box::new(GeminiGenerator::new(config)?)),
        "gemini-cli" => Ok(Box::new(GeminiCliGenerator::new(config))),
        other => anyhow::bail!("Unknown generation provider: {}", other),
    }
}

fn api_error(e: impl std::fmt::Display) -> RagError {
    RagError::Generation(format!("Error generating response: {}", e))
}

// ============ Gemini API ============

pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config::api_key()
            .ok_or_else(|| anyhow!("{} environment variable not set", API_KEY_ENV))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client(Some(config.timeout_secs))?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_API_BASE.to_string()),
            model: config.model_or_default(),
            api_key,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let json = send_with_retry(&self.client, &url, Some(&self.api_key), &body, 0, "Gemini")
            .await
            .map_err(|e| api_error(format!("{:#}", e)))?;
        parse_generated_text(&json).map_err(api_error)
    }
}

/// Concatenates the text parts of the first candidate.
fn parse_generated_text(json: &Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: no candidates"))?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

// ============ Local Gemini CLI ============

/// Runs `<cli_command> --version` when the `gemini-cli` provider is
/// configured. Any other provider passes without spawning anything.
pub async fn check_cli_available(config: &GenerationConfig) -> Result<(), RagError> {
    if config.provider != "gemini-cli" {
        return Ok(());
    }

    let output = tokio::process::Command::new(&config.cli_command)
        .arg("--version")
        .kill_on_drop(true)
        .output();

    let not_available = |detail: String| {
        RagError::Config(format!(
            "Gemini CLI '{}' is not available ({}). Install it or set [generation] cli_command.",
            config.cli_command, detail
        ))
    };

    match tokio::time::timeout(Duration::from_secs(config.timeout_secs), output).await {
        Err(_) => Err(not_available("--version timed out".to_string())),
        Ok(Err(e)) => Err(not_available(e.to_string())),
        Ok(Ok(out)) if !out.status.success() => {
            Err(not_available(format!("--version exited with {}", out.status)))
        }
        Ok(Ok(out)) => {
            tracing::debug!(
                version = %String::from_utf8_lossy(&out.stdout).trim(),
                "found {}",
                config.cli_command
            );
            Ok(())
        }
    }
}

/// Runs `<cli_command> --prompt @<file>` with the prompt written to a
/// temporary file. The file is removed when the call returns.
pub struct GeminiCliGenerator {
    command: String,
    timeout: Duration,
}

impl GeminiCliGenerator {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            command: config.cli_command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl Generator for GeminiCliGenerator {
    fn name(&self) -> &str {
        &self.command
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let mut file = tempfile::Builder::new()
            .prefix("rag-prompt-")
            .suffix(".txt")
            .tempfile()
            .map_err(api_error)?;
        file.write_all(prompt.as_bytes()).map_err(api_error)?;
        file.flush().map_err(api_error)?;

        let child = tokio::process::Command::new(&self.command)
            .arg("--prompt")
            .arg(format!("@{}", file.path().display()))
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Err(_) => {
                return Err(RagError::Generation(
                    "Error: Gemini CLI call timed out".to_string(),
                ))
            }
            Ok(result) => result.map_err(api_error)?,
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(RagError::Generation(format!(
                "Error calling local Gemini CLI: {}",
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(command: &str) -> GeminiCliGenerator {
        GeminiCliGenerator::new(&GenerationConfig {
            provider: "gemini-cli".to_string(),
            cli_command: command.to_string(),
            ..GenerationConfig::default()
        })
    }

    #[test]
    fn test_parse_generated_text() {
        let json = json!({
            "candidates": [{ "content": { "parts": [{ "text": "foo " }, { "text": "returns 1" }] } }]
        });
        assert_eq!(parse_generated_text(&json).unwrap(), "foo returns 1");
        assert!(parse_generated_text(&json!({ "candidates": [] })).is_err());
    }

    #[tokio::test]
    async fn test_missing_cli_reports_error_text() {
        let err = cli("rag-test-no-such-binary").generate("hi").await.unwrap_err();
        match err {
            RagError::Generation(msg) => assert!(msg.starts_with("Error generating response: ")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cli_receives_prompt_file_argument() {
        let out = cli("echo").generate("hi").await.unwrap();
        assert!(out.starts_with("--prompt @"));
        assert!(out.ends_with(".txt"));
    }

    #[tokio::test]
    async fn test_unreachable_api_error_hides_key() {
        let config = GenerationConfig {
            url: Some("http://127.0.0.1:9/v1beta".to_string()),
            timeout_secs: 5,
            ..GenerationConfig::default()
        };
        let generator = GeminiGenerator::with_api_key(&config, "AIza-secret".to_string()).unwrap();
        match generator.generate("hi").await.unwrap_err() {
            RagError::Generation(msg) => {
                assert!(msg.starts_with("Error generating response: "), "msg={}", msg);
                assert!(!msg.contains("AIza-secret"), "msg={}", msg);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_check_cli_skips_api_provider() {
        let config = GenerationConfig {
            cli_command: "rag-test-no-such-binary".to_string(),
            ..GenerationConfig::default()
        };
        assert!(check_cli_available(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_cli_rejects_missing_binary() {
        let config = GenerationConfig {
            provider: "gemini-cli".to_string(),
            cli_command: "rag-test-no-such-binary".to_string(),
            ..GenerationConfig::default()
        };
        let err = check_cli_available(&config).await.unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
        assert!(err.to_string().contains("rag-test-no-such-binary"));
        assert_eq!(err.exit_code(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_check_cli_accepts_working_binary() {
        let config = GenerationConfig {
            provider: "gemini-cli".to_string(),
            cli_command: "true".to_string(),
            ..GenerationConfig::default()
        };
        assert!(check_cli_available(&config).await.is_ok());
        let failing = GenerationConfig {
            cli_command: "false".to_string(),
            ..config
        };
        assert!(check_cli_available(&failing).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cli_failure_is_reported() {
        let err = cli("false").generate("hi").await.unwrap_err();
        assert!(err.to_string().contains("Error calling local Gemini CLI: "));
    }
}
