//! 规则常量定义

/// 棋盘边长（行数 = 列数）
pub const BOARD_SIZE: usize = 8;

/// 白方底线行号（行 0）
pub const WHITE_BACK_RANK: u8 = 0;

/// 黑方底线行号（行 7）
pub const BLACK_BACK_RANK: u8 = 7;

/// 白方兵的起始行
pub const WHITE_PAWN_RANK: u8 = 1;

/// 黑方兵的起始行
pub const BLACK_PAWN_RANK: u8 = 6;
