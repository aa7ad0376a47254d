//! Oracle 模型与 token id 表

use serde::{Deserialize, Serialize};

/// 打包的 oracle 模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OracleModel {
    /// gpt-3.5-turbo
    Gpt35,
    /// gpt-4
    Gpt4,
}

impl OracleModel {
    /// API 请求使用的模型名
    pub fn api_name(&self) -> &'static str {
        match self {
            OracleModel::Gpt35 => "gpt-3.5-turbo",
            OracleModel::Gpt4 => "gpt-4",
        }
    }

    /// 该模型 tokenizer 对应的 token id 表
    ///
    /// 两个模型都使用 cl100k_base，共享同一张表。
    pub fn token_table(&self) -> &'static TokenTable {
        &CL100K_BASE_TOKENS
    }
}

impl std::fmt::Display for OracleModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_name())
    }
}

/// 字面 token 的 id 表
///
/// logit 偏置和对数概率查询需要按 token id 引用这些字面量。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTable {
    pub white: u32,
    pub black: u32,
    pub yes: u32,
    pub no: u32,
}

/// cl100k_base 下 `white` / `black` / `yes` / `no` 的 token id
pub const CL100K_BASE_TOKENS: TokenTable = TokenTable {
    white: 5902,
    black: 11708,
    yes: 9891,
    no: 2201,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_names() {
        assert_eq!(OracleModel::Gpt35.api_name(), "gpt-3.5-turbo");
        assert_eq!(OracleModel::Gpt4.api_name(), "gpt-4");
    }

    #[test]
    fn test_models_share_token_table() {
        assert_eq!(OracleModel::Gpt35.token_table(), OracleModel::Gpt4.token_table());
    }
}
