//! 代理注册表与入口
//!
//! 每个极小极大描述符对应一个带独立缓存的代理实例；注册表是
//! 显式构造、显式持有的资源，生命周期由调用方掌控。

use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::info;

use chess_rules::{GameState, Move, MoveGenerator};

use crate::agent::LlmAgent;
use crate::error::{OracleError, SearchError};
use crate::logging::SearchLog;
use crate::oracle::{ChatOracle, OpenAiClient, OpenAiConfig, OracleModel};
use crate::search::{CompressedMinimax, CostSetup};

/// 代理描述符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentDescriptor {
    /// 人类（引擎不能代走）
    Human,
    /// 均匀随机合法走法
    Random,
    /// 极小极大 + gpt-3.5-turbo
    MinimaxGpt35,
    /// 极小极大 + gpt-4
    MinimaxGpt4,
}

/// 代理注册表
pub struct AgentRegistry {
    gpt35: CompressedMinimax<LlmAgent>,
    gpt4: CompressedMinimax<LlmAgent>,
}

impl AgentRegistry {
    /// 用给定的 oracle 构建注册表（默认成本配置）
    pub fn new(oracle: Arc<dyn ChatOracle>, log: SearchLog) -> Self {
        Self::with_cost(oracle, log, CostSetup::default())
    }

    /// 用给定的成本配置构建注册表
    pub fn with_cost(oracle: Arc<dyn ChatOracle>, log: SearchLog, cost: CostSetup) -> Self {
        let build = |model: OracleModel| {
            CompressedMinimax::with_options(
                LlmAgent::new(oracle.clone(), model),
                cost.clone(),
                true,
                log.clone(),
            )
        };
        Self {
            gpt35: build(OracleModel::Gpt35),
            gpt4: build(OracleModel::Gpt4),
        }
    }

    /// 从环境变量构建（OPENAI_API_KEY / OPENAI_ORG_ID）
    pub fn from_env(log: SearchLog) -> Result<Self, OracleError> {
        let config = OpenAiConfig::from_env()?;
        let client = OpenAiClient::with_log(config, log.clone())?;
        Ok(Self::new(Arc::new(client), log))
    }

    /// 入口：按描述符为当前局面选择走法
    pub async fn call_agent(
        &self,
        state: &GameState,
        descriptor: AgentDescriptor,
    ) -> Result<Move, SearchError> {
        match descriptor {
            AgentDescriptor::Human => Err(SearchError::HumanNotPlayable),
            AgentDescriptor::Random => {
                let legal = MoveGenerator::legal_moves(state, state.side_to_move);
                legal
                    .choose(&mut rand::thread_rng())
                    .cloned()
                    .ok_or(SearchError::NoSuccessors)
            }
            AgentDescriptor::MinimaxGpt35 => {
                info!("Running minimax search with gpt-3.5-turbo");
                self.gpt35.choose_move(state).await
            }
            AgentDescriptor::MinimaxGpt4 => {
                info!("Running minimax search with gpt-4");
                self.gpt4.choose_move(state).await
            }
        }
    }

    /// 清空两个代理的全部缓存
    pub fn reset(&self) {
        self.gpt35.reset();
        self.gpt35.backend().clear_descriptions();
        self.gpt4.reset();
        self.gpt4.backend().clear_descriptions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chess_rules::Color;

    use crate::oracle::{ChatMessage, ChatOptions, Choice, ChoiceMessage, Role};

    /// 最小可用的 stub oracle：后继固定，评估固定
    struct StubOracle;

    #[async_trait]
    impl ChatOracle for StubOracle {
        async fn chat(
            &self,
            _model: OracleModel,
            messages: &[ChatMessage],
            options: &ChatOptions,
        ) -> Result<Vec<Choice>, OracleError> {
            let prompt = &messages[messages.len() - 1].content;
            let content = if options.max_tokens == Some(1) {
                "white".to_string()
            } else if prompt.contains("Moves: ") {
                "Moves: e4, d4".to_string()
            } else {
                "- a quiet position".to_string()
            };
            Ok(vec![Choice {
                message: ChoiceMessage {
                    role: Role::Assistant,
                    content: Some(content),
                },
                logprobs: None,
            }])
        }
    }

    #[tokio::test]
    async fn test_human_descriptor_is_rejected() {
        let registry = AgentRegistry::new(Arc::new(StubOracle), SearchLog::disabled());
        let state = GameState::initial();
        let result = registry.call_agent(&state, AgentDescriptor::Human).await;
        assert_eq!(result, Err(SearchError::HumanNotPlayable));
    }

    #[tokio::test]
    async fn test_random_descriptor_returns_legal_move() {
        let registry = AgentRegistry::new(Arc::new(StubOracle), SearchLog::disabled());
        let state = GameState::initial();
        let mv = registry
            .call_agent(&state, AgentDescriptor::Random)
            .await
            .unwrap();

        let legal = MoveGenerator::legal_moves(&state, Color::White);
        assert!(legal.iter().any(|m| m.algebraic == mv.algebraic));
    }

    #[tokio::test]
    async fn test_minimax_descriptor_picks_proposed_move() {
        let registry = AgentRegistry::new(Arc::new(StubOracle), SearchLog::disabled());
        let state = GameState::initial();
        let mv = registry
            .call_agent(&state, AgentDescriptor::MinimaxGpt4)
            .await
            .unwrap();
        // stub 提议 e4/d4，评估为文本回退（恒 1.0），max 平值保留先出现者
        assert_eq!(mv.algebraic, "e4");
    }

    #[test]
    fn test_descriptor_serialization() {
        assert_eq!(
            serde_json::to_string(&AgentDescriptor::MinimaxGpt4).unwrap(),
            "\"minimax-gpt4\""
        );
        assert_eq!(
            serde_json::to_string(&AgentDescriptor::Human).unwrap(),
            "\"human\""
        );
    }
}
