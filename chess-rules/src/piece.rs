//! 棋子定义

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;

/// 棋子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceType {
    /// 兵
    Pawn,
    /// 车
    Rook,
    /// 马
    Knight,
    /// 象
    Bishop,
    /// 后
    Queen,
    /// 王
    King,
}

impl PieceType {
    /// 代数记谱使用的棋子字母（兵为空）
    pub fn letter(&self) -> &'static str {
        match self {
            PieceType::Pawn => "",
            PieceType::Rook => "R",
            PieceType::Knight => "N",
            PieceType::Bishop => "B",
            PieceType::Queen => "Q",
            PieceType::King => "K",
        }
    }

    /// ASCII 棋盘显示字符（白方大写，黑方小写）
    pub fn to_ascii_char(&self, color: Color) -> char {
        let c = match self {
            PieceType::Pawn => 'p',
            PieceType::Rook => 'r',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        };
        match color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    /// 状态哈希使用的小写名称
    pub fn tag(&self) -> &'static str {
        match self {
            PieceType::Pawn => "pawn",
            PieceType::Rook => "rook",
            PieceType::Knight => "knight",
            PieceType::Bishop => "bishop",
            PieceType::Queen => "queen",
            PieceType::King => "king",
        }
    }
}

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// 白方（先手，行 0-1 起始）
    White,
    /// 黑方（后手，行 6-7 起始）
    Black,
}

impl Color {
    /// 获取对方阵营
    pub fn opponent(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// 小写名称（哈希与提示中使用）
    pub fn name(&self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }

    /// 兵的前进方向（行增量）
    pub fn pawn_direction(&self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 棋子
///
/// `just_moved_two` 只对兵有意义，且只在"刚走完两格"后的一个回合内
/// 为真，用于授权吃过路兵。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub piece_type: PieceType,
    pub color: Color,
    /// 该棋子是否移动过（王车易位资格）
    pub has_moved: bool,
    /// 兵是否刚走了两格（吃过路兵窗口）
    pub just_moved_two: bool,
}

impl Piece {
    /// 创建未移动过的新棋子
    pub fn new(piece_type: PieceType, color: Color) -> Self {
        Self {
            piece_type,
            color,
            has_moved: false,
            just_moved_two: false,
        }
    }

    /// ASCII 显示字符
    pub fn to_ascii_char(&self) -> char {
        self.piece_type.to_ascii_char(self.color)
    }
}

/// 棋盘格子
///
/// 行 0 是白方底线，行 7 是黑方底线；列 0 对应 a 线。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Square {
    /// 行 (0-7)
    pub row: u8,
    /// 列 (0-7)
    pub col: u8,
}

impl Square {
    /// 创建新格子
    pub fn new(row: u8, col: u8) -> Option<Self> {
        if (row as usize) < BOARD_SIZE && (col as usize) < BOARD_SIZE {
            Some(Self { row, col })
        } else {
            None
        }
    }

    /// 创建新格子（不检查边界，内部使用）
    pub const fn new_unchecked(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// 检查格子是否在棋盘内
    pub fn is_valid(&self) -> bool {
        (self.row as usize) < BOARD_SIZE && (self.col as usize) < BOARD_SIZE
    }

    /// 获取偏移后的格子
    pub fn offset(&self, dr: i8, dc: i8) -> Option<Square> {
        let new_row = self.row as i8 + dr;
        let new_col = self.col as i8 + dc;
        if new_row >= 0
            && (new_row as usize) < BOARD_SIZE
            && new_col >= 0
            && (new_col as usize) < BOARD_SIZE
        {
            Some(Square {
                row: new_row as u8,
                col: new_col as u8,
            })
        } else {
            None
        }
    }

    /// 转换为代数坐标（如 e4）
    pub fn to_algebraic(&self) -> String {
        let file = (b'a' + self.col) as char;
        let rank = self.row + 1;
        format!("{}{}", file, rank)
    }

    /// 转换为数组索引
    pub fn to_index(&self) -> usize {
        self.row as usize * BOARD_SIZE + self.col as usize
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_algebraic())
    }
}
