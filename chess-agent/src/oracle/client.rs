//! OpenAI chat completion 客户端
//!
//! 通过 REST API 发送提示并获取回复，支持 logit 偏置与对数概率。

use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::OracleError;
use crate::logging::SearchLog;
use crate::oracle::tokens::OracleModel;
use crate::oracle::types::{ChatMessage, ChatOptions, ChatOracle, Choice, ChoiceMessage, TokenLogprob};

/// API key 环境变量
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// 组织 ID 环境变量
const ORGANIZATION_ENV: &str = "OPENAI_ORG_ID";

/// 客户端配置
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key
    pub api_key: String,
    /// 组织 ID
    pub organization: Option<String>,
    /// API 地址
    pub base_url: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    /// 从环境变量读取配置（仅这两个变量，没有其他配置项）
    pub fn from_env() -> Result<Self, OracleError> {
        let api_key = env::var(API_KEY_ENV).map_err(|_| OracleError::MissingApiKey)?;
        let organization = env::var(ORGANIZATION_ENV).ok();

        Ok(Self {
            api_key,
            organization,
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
        })
    }
}

/// chat completion 请求体
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    /// API 要求字符串形式的 token id 键
    #[serde(skip_serializing_if = "Option::is_none")]
    logit_bias: Option<HashMap<String, i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logprobs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_logprobs: Option<u32>,
}

/// chat completion 响应体
#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: ChoiceMessage,
    logprobs: Option<WireLogprobs>,
}

#[derive(Deserialize)]
struct WireLogprobs {
    content: Option<Vec<TokenLogprob>>,
}

/// OpenAI 客户端
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::Client,
    log: SearchLog,
}

impl OpenAiClient {
    /// 创建新客户端
    pub fn new(config: OpenAiConfig) -> Result<Self, OracleError> {
        Self::with_log(config, SearchLog::disabled())
    }

    /// 创建带 oracle 调用日志的客户端
    pub fn with_log(config: OpenAiConfig, log: SearchLog) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client, log })
    }

    /// 获取当前配置
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl ChatOracle for OpenAiClient {
    async fn chat(
        &self,
        model: OracleModel,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Vec<Choice>, OracleError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let request = ChatCompletionRequest {
            model: model.api_name(),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            n: options.n,
            stop: options.stop.as_ref(),
            frequency_penalty: options.frequency_penalty,
            presence_penalty: options.presence_penalty,
            logit_bias: options
                .logit_bias
                .as_ref()
                .map(|bias| bias.iter().map(|(id, b)| (id.to_string(), *b)).collect()),
            logprobs: options.logprobs,
            top_logprobs: options.top_logprobs,
        };
        let request_json = serde_json::to_value(&request)
            .map_err(|e| OracleError::Response(format!("failed to encode request: {e}")))?;

        debug!(
            "Sending chat request: model={}, messages={}, max_tokens={:?}",
            model,
            messages.len(),
            options.max_tokens
        );

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request);
        if let Some(organization) = &self.config.organization {
            builder = builder.header("OpenAI-Organization", organization);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let preview: String = body.chars().take(500).collect();
            warn!("Chat request failed: status={}, body={}", status, preview);
            return Err(OracleError::Response(format!(
                "status {status}: {preview}"
            )));
        }

        let response_json: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| OracleError::Response(format!("invalid JSON: {e}")))?;
        self.log.oracle_call(model.api_name(), &request_json, &response_json);

        let parsed: ChatCompletionResponse = serde_json::from_value(response_json)
            .map_err(|e| OracleError::Response(format!("unexpected shape: {e}")))?;

        if parsed.choices.is_empty() {
            return Err(OracleError::Response("response carried no choices".into()));
        }

        info!("Chat response: {} choice(s)", parsed.choices.len());

        Ok(parsed
            .choices
            .into_iter()
            .map(|c| Choice {
                message: c.message,
                logprobs: c.logprobs.and_then(|lp| lp.content),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OpenAiConfig {
        OpenAiConfig {
            api_key: "sk-test".to_string(),
            organization: None,
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
        }
    }

    #[test]
    fn test_client_creation() {
        let client = OpenAiClient::new(test_config());
        assert!(client.is_ok());
    }

    #[test]
    fn test_request_skips_absent_options() {
        let request = ChatCompletionRequest {
            model: "gpt-4",
            messages: &[],
            max_tokens: None,
            temperature: None,
            n: None,
            stop: None,
            frequency_penalty: None,
            presence_penalty: None,
            logit_bias: None,
            logprobs: None,
            top_logprobs: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("logit_bias").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": "white"},
                "logprobs": {
                    "content": [{
                        "token": "white",
                        "logprob": -0.1,
                        "top_logprobs": [
                            {"token": "white", "logprob": -0.1},
                            {"token": "black", "logprob": -2.5}
                        ]
                    }]
                }
            }]
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        let logprobs = parsed.choices[0].logprobs.as_ref().unwrap();
        let tokens = logprobs.content.as_ref().unwrap();
        assert_eq!(tokens[0].top_logprobs.len(), 2);
    }
}
