//! Oracle 消息与选项类型

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::oracle::tokens::OracleModel;

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 聊天消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// 创建 system 消息
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// 创建 user 消息
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// 聊天调用选项
///
/// `logit_bias` 的键是 tokenizer 的 token id，值为加性偏置。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub n: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub logit_bias: Option<HashMap<u32, i32>>,
    pub logprobs: Option<bool>,
    pub top_logprobs: Option<u32>,
}

/// 候选 token 的对数概率
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopLogprob {
    pub token: String,
    pub logprob: f64,
}

/// 单个生成 token 的对数概率信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenLogprob {
    pub token: String,
    pub logprob: f64,
    #[serde(default)]
    pub top_logprobs: Vec<TopLogprob>,
}

/// 助手回复消息（content 可能为空）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: Role,
    pub content: Option<String>,
}

/// 一条生成结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    /// 每个生成 token 的对数概率（请求开启 logprobs 时存在）
    pub logprobs: Option<Vec<TokenLogprob>>,
}

impl Choice {
    /// 回复正文
    pub fn content(&self) -> Option<&str> {
        self.message.content.as_deref()
    }
}

/// Chat oracle 能力抽象
///
/// 实现方负责瞬时故障的内部重试；这里把任何失败当作整次调用
/// 失败，由上层的重试循环处理。
#[async_trait]
pub trait ChatOracle: Send + Sync {
    /// 发送一次 chat completion 请求
    async fn chat(
        &self,
        model: OracleModel,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Vec<Choice>, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::system("be brief");
        assert_eq!(msg.role, Role::System);
        assert_eq!(msg.content, "be brief");

        let msg = ChatMessage::user("hello");
        assert_eq!(msg.role, Role::User);
    }

    #[test]
    fn test_options_default_is_empty() {
        let options = ChatOptions::default();
        assert!(options.max_tokens.is_none());
        assert!(options.logit_bias.is_none());
        assert!(options.logprobs.is_none());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
