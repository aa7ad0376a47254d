//! 错误类型定义

use thiserror::Error;

/// 象棋规则错误
///
/// 规则引擎的不变量被破坏时（起点无子、走错回合）返回，
/// 上层不做恢复，直接向调用方传播。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChessError {
    /// 起点没有棋子
    #[error("No piece at square {square}")]
    NoPiece { square: String },

    /// 不是该方的回合
    #[error("Not {color}'s turn to move")]
    NotYourTurn { color: String },
}
