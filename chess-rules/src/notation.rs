//! 代数记谱标注
//!
//! 格式：棋子字母（兵为空）+ 吃子标记 `x` + 目标格，升变加 `=Q` 后缀。
//! 王车易位记为 `0-0`（王翼）或 `0-0-0`（后翼）。
//! 不输出歧义消除后缀：消费方按模糊匹配接受。

use crate::board::Board;
use crate::piece::{PieceType, Square};

/// 代数记谱
pub struct Notation;

impl Notation {
    /// 从走子前的棋盘推导走法的代数记谱
    pub fn annotate(
        board: &Board,
        from: Square,
        to: Square,
        promotion: Option<PieceType>,
        en_passant: bool,
        castling: bool,
    ) -> String {
        if castling {
            return if to.col == 6 {
                "0-0".to_string()
            } else {
                "0-0-0".to_string()
            };
        }

        let letter = board
            .get(from)
            .map(|p| p.piece_type.letter())
            .unwrap_or("");
        let capture = if en_passant || board.get(to).is_some() {
            "x"
        } else {
            ""
        };
        let suffix = promotion
            .map(|p| format!("={}", p.letter()))
            .unwrap_or_default();

        format!("{}{}{}{}", letter, capture, to.to_algebraic(), suffix)
    }
}
