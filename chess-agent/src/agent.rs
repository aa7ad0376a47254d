//! LLM 极小极大代理
//!
//! 在 oracle 之上实现三个任务：
//! - 描述（缓存）：自由文本
//! - 评估：1-token 分类，logit 偏置 + 对数概率 softmax
//! - 后继生成：自由文本 + 正则提取 + 合法性过滤
//!
//! 实现搜索核心的 `SearchBackend`，由 `CompressedMinimax` 驱动。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use chess_rules::{state_hash, GameState, Move, MoveGenerator};

use crate::cache::{FlightCache, Probe};
use crate::error::SearchError;
use crate::oracle::{ChatMessage, ChatOptions, ChatOracle, Choice, OracleModel};
use crate::prompt::PromptBuilder;
use crate::search::{SearchBackend, Successor};

/// 单个任务的最大 LLM 尝试次数
const MAX_LLM_TRIES: u32 = 5;

/// 后继提示的目标走法数
const TARGET_SUCCESSORS: usize = 8;

/// 描述任务的 token 上限
const DESCRIBE_MAX_TOKENS: u32 = 500;

/// 后继任务的 token 上限
const SUCCESSORS_MAX_TOKENS: u32 = 300;

/// 评估任务请求的候选对数概率数量
const EVALUATE_TOP_LOGPROBS: u32 = 12;

/// 评估任务对 `white` / `black` 施加的 logit 偏置
const EVALUATE_LOGIT_BIAS: i32 = 100;

/// LLM 代理
pub struct LlmAgent {
    oracle: Arc<dyn ChatOracle>,
    model: OracleModel,
    /// 状态哈希 → 对局描述（单飞）
    descriptions: FlightCache<String>,
    /// `Moves: ...` 行的提取模式
    moves_pattern: Regex,
}

impl LlmAgent {
    /// 创建代理
    pub fn new(oracle: Arc<dyn ChatOracle>, model: OracleModel) -> Self {
        Self {
            oracle,
            model,
            descriptions: FlightCache::new(),
            // 字面模式，编译不会失败
            moves_pattern: Regex::new(r"Moves:\s*(.*)").expect("static pattern"),
        }
    }

    /// 代理使用的模型
    pub fn model(&self) -> OracleModel {
        self.model
    }

    /// 清空描述缓存
    pub fn clear_descriptions(&self) {
        self.descriptions.clear();
    }

    /// 获取对局描述（单飞缓存）
    ///
    /// 缓存未命中时先发布在途槽位再发起调用，同一状态的并发
    /// 请求共享一次 LLM 调用。
    pub async fn describe(&self, state: &GameState) -> Result<String, SearchError> {
        let hash = state_hash(state);
        match self.descriptions.begin(&hash) {
            Probe::Wait(shared) => shared.await,
            Probe::Compute(promise) => {
                let result = self.describe_uncached(state).await;
                promise.resolve(result.clone());
                result
            }
        }
    }

    async fn describe_uncached(&self, state: &GameState) -> Result<String, SearchError> {
        let context = PromptBuilder::context_block(state);
        let messages = [
            ChatMessage::system(PromptBuilder::system_prompt()),
            ChatMessage::user(PromptBuilder::describe_prompt(&context)),
        ];
        let options = ChatOptions {
            max_tokens: Some(DESCRIBE_MAX_TOKENS),
            ..ChatOptions::default()
        };

        for attempt in 1..=MAX_LLM_TRIES {
            match self.oracle.chat(self.model, &messages, &options).await {
                Ok(choices) => {
                    if let Some(description) = choices.first().and_then(|c| c.content()) {
                        debug!("Description obtained ({} chars)", description.len());
                        return Ok(description.to_string());
                    }
                    warn!("Description response had no content (attempt {})", attempt);
                }
                Err(e) => {
                    warn!("Description request failed (attempt {}): {}", attempt, e);
                }
            }
        }

        Err(SearchError::OracleExhausted {
            attempts: MAX_LLM_TRIES,
        })
    }

    /// 从评估响应计算 P(white)
    ///
    /// `P(white) = exp(lp_white) / Σ exp(lp_t)`，t 取返回的候选
    /// 对数概率集合。没有对数概率时回退到文本字面量（±1）。
    fn parse_evaluation(&self, choice: &Choice) -> Result<f64, SearchError> {
        if let Some(first_token) = choice
            .logprobs
            .as_ref()
            .and_then(|tokens| tokens.first())
            .filter(|t| !t.top_logprobs.is_empty())
        {
            let denominator: f64 = first_token
                .top_logprobs
                .iter()
                .map(|t| t.logprob.exp())
                .sum();
            let white: f64 = first_token
                .top_logprobs
                .iter()
                .find(|t| t.token.trim().eq_ignore_ascii_case("white"))
                .map(|t| t.logprob.exp())
                .unwrap_or(0.0);
            return Ok(white / denominator);
        }

        // 回退：模型给出了文本答案但没有对数概率
        match choice.content().map(|c| c.trim().to_ascii_lowercase()) {
            Some(answer) if answer == "white" => Ok(1.0),
            Some(answer) if answer == "black" => Ok(-1.0),
            _ => Err(SearchError::MissingLogprobs),
        }
    }

    /// 把响应文本解析为合法走法列表
    ///
    /// 取最后一个 `Moves: ` 行，逗号切分，每个 token 做模糊匹配。
    fn parse_successor_moves<'a>(&self, response: &str, legal: &'a [Move]) -> Vec<&'a Move> {
        let line = match self
            .moves_pattern
            .captures_iter(response)
            .last()
            .and_then(|c| c.get(1))
        {
            Some(m) => m.as_str(),
            None => {
                warn!("Response carried no `Moves:` line");
                return Vec::new();
            }
        };

        let mut seen: HashSet<&str> = HashSet::new();
        let mut moves = Vec::new();
        for token in line.split(',') {
            match Self::match_legal(token, legal) {
                Some(mv) => {
                    if seen.insert(mv.algebraic.as_str()) {
                        moves.push(mv);
                    }
                }
                None => {
                    let token = token.trim();
                    if !token.is_empty() {
                        debug!("Dropping unrecognized move token: {}", token);
                    }
                }
            }
        }
        moves
    }

    /// 按代数记谱匹配合法走法，带三种常见修复
    fn match_legal<'a>(token: &str, legal: &'a [Move]) -> Option<&'a Move> {
        let token = token.trim();
        let by_algebraic = |s: &str| legal.iter().find(move |m| m.algebraic == s);

        if let Some(mv) = by_algebraic(token) {
            return Some(mv);
        }
        // 兵走法带了 P 前缀
        if let Some(stripped) = token.strip_prefix('P').or_else(|| token.strip_prefix('p')) {
            if let Some(mv) = by_algebraic(stripped) {
                return Some(mv);
            }
        }
        // 字母 O 风格的易位记法
        match token {
            "O-O" => by_algebraic("0-0"),
            "O-O-O" => by_algebraic("0-0-0"),
            _ => None,
        }
    }
}

#[async_trait]
impl SearchBackend for LlmAgent {
    async fn evaluate(&self, state: &GameState) -> Result<f64, SearchError> {
        let description = self.describe(state).await?;
        let context = PromptBuilder::context_block(state);
        let messages = [
            ChatMessage::system(PromptBuilder::system_prompt()),
            ChatMessage::user(PromptBuilder::evaluate_prompt(&context, &description)),
        ];

        let table = self.model.token_table();
        let mut logit_bias = HashMap::new();
        logit_bias.insert(table.white, EVALUATE_LOGIT_BIAS);
        logit_bias.insert(table.black, EVALUATE_LOGIT_BIAS);
        let options = ChatOptions {
            max_tokens: Some(1),
            temperature: Some(0.0),
            logit_bias: Some(logit_bias),
            logprobs: Some(true),
            top_logprobs: Some(EVALUATE_TOP_LOGPROBS),
            ..ChatOptions::default()
        };

        for attempt in 1..=MAX_LLM_TRIES {
            match self.oracle.chat(self.model, &messages, &options).await {
                Ok(choices) => {
                    let choice = choices.first().ok_or_else(|| {
                        SearchError::Oracle("evaluation carried no choices".to_string())
                    })?;
                    let value = self.parse_evaluation(choice)?;
                    debug!("Evaluation P(white) = {:.4}", value);
                    return Ok(value);
                }
                Err(e) => {
                    warn!("Evaluation request failed (attempt {}): {}", attempt, e);
                }
            }
        }

        Err(SearchError::OracleExhausted {
            attempts: MAX_LLM_TRIES,
        })
    }

    async fn successors(&self, state: &GameState) -> Result<Vec<Successor>, SearchError> {
        let legal = MoveGenerator::legal_moves(state, state.side_to_move);
        if legal.is_empty() {
            return Err(SearchError::NoSuccessors);
        }

        let description = self.describe(state).await?;
        let context = PromptBuilder::context_block(state);
        let messages = [
            ChatMessage::system(PromptBuilder::system_prompt()),
            ChatMessage::user(PromptBuilder::successors_prompt(
                &context,
                &description,
                state.side_to_move,
                &legal,
                TARGET_SUCCESSORS,
            )),
        ];
        let options = ChatOptions {
            max_tokens: Some(SUCCESSORS_MAX_TOKENS),
            temperature: Some(1.0),
            ..ChatOptions::default()
        };

        for attempt in 1..=MAX_LLM_TRIES {
            let response = match self.oracle.chat(self.model, &messages, &options).await {
                Ok(choices) => choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default(),
                Err(e) => {
                    warn!("Successor request failed (attempt {}): {}", attempt, e);
                    continue;
                }
            };

            let picked = self.parse_successor_moves(&response, &legal);
            if picked.is_empty() {
                // 解析失败计为一次尝试
                warn!(
                    "No legal moves survived parsing (attempt {}): {}",
                    attempt,
                    response.chars().take(200).collect::<String>()
                );
                continue;
            }

            let probability = 1.0 / picked.len() as f64;
            let mut successors = Vec::with_capacity(picked.len());
            for mv in picked {
                successors.push(Successor {
                    next_state: state.apply(mv)?,
                    mv: mv.clone(),
                    probability,
                });
            }
            info!(
                "Oracle proposed {} successor(s) for {} to move",
                successors.len(),
                state.side_to_move
            );
            return Ok(successors);
        }

        Err(SearchError::OracleExhausted {
            attempts: MAX_LLM_TRIES,
        })
    }

    fn estimated_successors(&self) -> usize {
        TARGET_SUCCESSORS
    }
}
