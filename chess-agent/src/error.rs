//! 错误类型定义

use thiserror::Error;

use chess_rules::ChessError;

/// Oracle 单次调用错误（HTTP 层）
#[derive(Error, Debug)]
pub enum OracleError {
    /// HTTP 请求失败
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// 响应格式异常
    #[error("Unexpected oracle response: {0}")]
    Response(String),

    /// 缺少 API key 环境变量
    #[error("Missing OPENAI_API_KEY environment variable")]
    MissingApiKey,
}

/// 搜索错误
///
/// 必须实现 Clone：同一个结果会通过共享 future 分发给多个等待者。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// human 描述符不能由引擎代走
    #[error("The human descriptor cannot be played by the engine")]
    HumanNotPlayable,

    /// Oracle 重试耗尽
    #[error("Oracle produced no usable answer after {attempts} attempts")]
    OracleExhausted { attempts: u32 },

    /// 非终局状态没有可用后继
    #[error("State yielded no successors")]
    NoSuccessors,

    /// 评估响应既无 logprobs 也无 black/white 字面量
    #[error("Evaluation returned neither logprobs nor a black/white answer")]
    MissingLogprobs,

    /// 在途计算被放弃（promise 被丢弃）
    #[error("In-flight computation was abandoned")]
    Abandoned,

    /// Oracle 调用失败
    #[error("Oracle call failed: {0}")]
    Oracle(String),

    /// 规则引擎错误
    #[error("Rules error: {0}")]
    Rules(#[from] ChessError),
}

impl From<OracleError> for SearchError {
    fn from(err: OracleError) -> Self {
        SearchError::Oracle(err.to_string())
    }
}
