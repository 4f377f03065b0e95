use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::capabilities::capabilities_for;
use crate::llm::{ChatCompletion, ChatModel, ChatRequest, ModelCallError, Usage};

pub const DEFAULT_MODEL: &str = "gpt-5-mini";

#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: String, api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build OpenAI HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request body for `/chat/completions`, keeping only the parameters the model accepts.
    pub fn build_payload(&self, request: &ChatRequest) -> Value {
        let caps = capabilities_for(&self.model);

        let mut payload = json!({
            "model": self.model,
            "messages": request.messages,
        });
        payload[caps.output_limit.field_name()] = json!(request.max_output_tokens);
        if let Some(temperature) = request.temperature {
            if caps.temperature {
                payload["temperature"] = json!(temperature);
            } else {
                debug!(model = %self.model, "Dropping temperature unsupported by model");
            }
        }
        payload
    }
}

impl ChatModel for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ModelCallError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.build_payload(&request);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(classify_http_error(status, retry_after_secs, &body));
        }

        parse_chat_response(&body)
    }
}

fn transport_error(err: reqwest::Error) -> ModelCallError {
    if err.is_timeout() {
        ModelCallError::Timeout
    } else {
        ModelCallError::Transport(err.to_string())
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    param: Option<String>,
}

pub fn classify_http_error(
    status: StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
) -> ModelCallError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);

    match status.as_u16() {
        429 => ModelCallError::RateLimited { retry_after_secs },
        408 | 504 => ModelCallError::Timeout,
        400 => match parsed {
            Some(err)
                if matches!(
                    err.code.as_deref(),
                    Some("unsupported_parameter") | Some("unsupported_value")
                ) =>
            {
                ModelCallError::UnsupportedParameter(err.param.unwrap_or(err.message))
            }
            Some(err) => ModelCallError::Http {
                status: 400,
                message: err.message,
            },
            None => ModelCallError::Http {
                status: 400,
                message: body.chars().take(200).collect(),
            },
        },
        code => ModelCallError::Http {
            status: code,
            message: parsed
                .map(|e| e.message)
                .unwrap_or_else(|| body.chars().take(200).collect()),
        },
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    usage: Option<UsageBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct UsageBody {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

pub fn parse_chat_response(body: &str) -> Result<ChatCompletion, ModelCallError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| ModelCallError::Malformed(e.to_string()))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(ModelCallError::EmptyResponse)?;

    Ok(ChatCompletion {
        text: choice.message.content.unwrap_or_default(),
        model: response.model,
        usage: response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
        finish_reason: choice.finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    fn client(model: &str) -> OpenAiClient {
        OpenAiClient::new(
            "https://api.openai.com/v1/".to_string(),
            "sk-test".to_string(),
            model.to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::system("ctx"), ChatMessage::user("prompt")],
            max_output_tokens: 16_000,
            temperature: Some(0.3),
        }
    }

    #[test]
    fn test_payload_for_reasoning_model() {
        let payload = client("gpt-5-mini").build_payload(&request());

        assert_eq!(payload["model"], "gpt-5-mini");
        assert_eq!(payload["max_completion_tokens"], 16_000);
        assert!(payload.get("max_tokens").is_none());
        assert!(payload.get("temperature").is_none());
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "prompt");
    }

    #[test]
    fn test_payload_for_legacy_model() {
        let payload = client("gpt-4-turbo").build_payload(&request());

        assert_eq!(payload["max_tokens"], 16_000);
        assert!(payload.get("max_completion_tokens").is_none());
        assert!((payload["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_parse_success() {
        let body = r#"{
            "model": "gpt-5-mini-2025-08-07",
            "choices": [{"message": {"role": "assistant", "content": "report"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 80, "total_tokens": 200}
        }"#;

        let completion = parse_chat_response(body).unwrap();
        assert_eq!(completion.text, "report");
        assert_eq!(completion.model, "gpt-5-mini-2025-08-07");
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
        assert_eq!(completion.usage.unwrap().total_tokens, Some(200));
    }

    #[test]
    fn test_parse_null_content_and_garbage() {
        let body = r#"{"choices": [{"message": {"content": null}, "finish_reason": "length"}]}"#;
        let completion = parse_chat_response(body).unwrap();
        assert!(completion.text.is_empty());
        assert_eq!(completion.finish_reason.as_deref(), Some("length"));

        assert!(matches!(
            parse_chat_response("<html>"),
            Err(ModelCallError::Malformed(_))
        ));
        assert_eq!(
            parse_chat_response(r#"{"choices": []}"#),
            Err(ModelCallError::EmptyResponse)
        );
    }

    #[test]
    fn test_classify_http_errors() {
        assert_eq!(
            classify_http_error(StatusCode::TOO_MANY_REQUESTS, Some(7), ""),
            ModelCallError::RateLimited { retry_after_secs: Some(7) }
        );
        assert_eq!(
            classify_http_error(StatusCode::GATEWAY_TIMEOUT, None, ""),
            ModelCallError::Timeout
        );

        let unsupported = r#"{"error": {"message": "Unsupported parameter: 'max_tokens'", "code": "unsupported_parameter", "param": "max_tokens"}}"#;
        assert_eq!(
            classify_http_error(StatusCode::BAD_REQUEST, None, unsupported),
            ModelCallError::UnsupportedParameter("max_tokens".to_string())
        );

        let auth = r#"{"error": {"message": "Incorrect API key provided"}}"#;
        assert_eq!(
            classify_http_error(StatusCode::UNAUTHORIZED, None, auth),
            ModelCallError::Http {
                status: 401,
                message: "Incorrect API key provided".to_string()
            }
        );
    }
}
