//! Oracle 集成模块
//!
//! 抽象一个支持 chat completion 的 LLM，包括 logit 偏置与
//! 对数概率两条调用路径。

mod client;
mod tokens;
mod types;

pub use client::{OpenAiClient, OpenAiConfig};
pub use tokens::{OracleModel, TokenTable};
pub use types::{ChatMessage, ChatOptions, ChatOracle, Choice, ChoiceMessage, Role, TokenLogprob, TopLogprob};
