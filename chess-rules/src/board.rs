//! 棋盘与对局状态

use serde::{Deserialize, Serialize};

use crate::constants::{BLACK_BACK_RANK, BLACK_PAWN_RANK, BOARD_SIZE, WHITE_BACK_RANK, WHITE_PAWN_RANK};
use crate::error::ChessError;
use crate::moves::Move;
use crate::piece::{Color, Piece, PieceType, Square};

/// 棋盘
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// 8x8 棋盘，索引为 row * 8 + col，使用 Vec 以支持 serde
    squares: Vec<Option<Piece>>,
}

/// 底线棋子排列（a 线到 h 线）
const BACK_RANK: [PieceType; BOARD_SIZE] = [
    PieceType::Rook,
    PieceType::Knight,
    PieceType::Bishop,
    PieceType::Queen,
    PieceType::King,
    PieceType::Bishop,
    PieceType::Knight,
    PieceType::Rook,
];

impl Board {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self {
            squares: vec![None; BOARD_SIZE * BOARD_SIZE],
        }
    }

    /// 创建初始棋盘
    pub fn initial() -> Self {
        let mut board = Self::empty();

        for (col, &piece_type) in BACK_RANK.iter().enumerate() {
            let col = col as u8;
            board.set(
                Square::new_unchecked(WHITE_BACK_RANK, col),
                Some(Piece::new(piece_type, Color::White)),
            );
            board.set(
                Square::new_unchecked(BLACK_BACK_RANK, col),
                Some(Piece::new(piece_type, Color::Black)),
            );
            board.set(
                Square::new_unchecked(WHITE_PAWN_RANK, col),
                Some(Piece::new(PieceType::Pawn, Color::White)),
            );
            board.set(
                Square::new_unchecked(BLACK_PAWN_RANK, col),
                Some(Piece::new(PieceType::Pawn, Color::Black)),
            );
        }

        board
    }

    /// 获取指定格子的棋子
    pub fn get(&self, square: Square) -> Option<Piece> {
        if square.is_valid() {
            self.squares[square.to_index()]
        } else {
            None
        }
    }

    /// 设置指定格子的棋子
    pub fn set(&mut self, square: Square, piece: Option<Piece>) {
        if square.is_valid() {
            self.squares[square.to_index()] = piece;
        }
    }

    /// 查找指定阵营的王
    pub fn find_king(&self, color: Color) -> Option<Square> {
        self.all_pieces()
            .into_iter()
            .find(|(_, p)| p.piece_type == PieceType::King && p.color == color)
            .map(|(sq, _)| sq)
    }

    /// 获取指定阵营的所有棋子位置
    pub fn pieces(&self, color: Color) -> Vec<(Square, Piece)> {
        self.all_pieces()
            .into_iter()
            .filter(|(_, p)| p.color == color)
            .collect()
    }

    /// 获取所有棋子（行优先顺序）
    pub fn all_pieces(&self) -> Vec<(Square, Piece)> {
        let mut result = Vec::new();
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                let sq = Square::new_unchecked(row as u8, col as u8);
                if let Some(piece) = self.get(sq) {
                    result.push((sq, piece));
                }
            }
        }
        result
    }

    /// 清除所有兵的"刚走两格"标志
    ///
    /// 吃过路兵的窗口只有一个回合，每次走子前调用。
    pub fn clear_just_moved_two(&mut self) {
        for slot in self.squares.iter_mut() {
            if let Some(piece) = slot {
                piece.just_moved_two = false;
            }
        }
    }

    /// 统计双方棋子数量
    pub fn piece_census(&self) -> PieceCensus {
        let mut census = PieceCensus::default();
        for (_, piece) in self.all_pieces() {
            let side = match piece.color {
                Color::White => &mut census.white,
                Color::Black => &mut census.black,
            };
            match piece.piece_type {
                PieceType::Pawn => side.pawn += 1,
                PieceType::Rook => side.rook += 1,
                PieceType::Knight => side.knight += 1,
                PieceType::Bishop => side.bishop += 1,
                PieceType::Queen => side.queen += 1,
                PieceType::King => side.king += 1,
            }
        }
        census
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

/// 单方棋子统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideCensus {
    pub pawn: usize,
    pub rook: usize,
    pub knight: usize,
    pub bishop: usize,
    pub queen: usize,
    pub king: usize,
}

/// 双方棋子统计（提示构建时序列化为 JSON）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceCensus {
    pub white: SideCensus,
    pub black: SideCensus,
}

/// 完整的对局状态（棋盘 + 走子方 + 历史）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// 棋盘
    pub board: Board,
    /// 当前走子方
    pub side_to_move: Color,
    /// 走法历史（有序）
    pub history: Vec<Move>,
}

impl GameState {
    /// 创建初始状态
    pub fn initial() -> Self {
        Self {
            board: Board::initial(),
            side_to_move: Color::White,
            history: Vec::new(),
        }
    }

    /// 从棋盘创建状态
    pub fn from_board(board: Board, side_to_move: Color) -> Self {
        Self {
            board,
            side_to_move,
            history: Vec::new(),
        }
    }

    /// 应用走法，返回新状态（不修改自身）
    ///
    /// 处理吃过路兵、王车易位的车移动、升变以及过路兵窗口的维护。
    pub fn apply(&self, mv: &Move) -> Result<GameState, ChessError> {
        let piece = self.board.get(mv.from).ok_or_else(|| ChessError::NoPiece {
            square: mv.from.to_algebraic(),
        })?;
        if piece.color != self.side_to_move {
            return Err(ChessError::NotYourTurn {
                color: piece.color.name().to_string(),
            });
        }

        let mut board = self.board.clone();
        board.clear_just_moved_two();

        // 吃过路兵：被吃的兵在起点同行、终点同列
        if mv.en_passant {
            board.set(Square::new_unchecked(mv.from.row, mv.to.col), None);
        }

        let mut moved = piece;
        moved.has_moved = true;
        moved.just_moved_two = mv.is_pawn_moving_two;
        if let Some(promotion) = mv.promotion {
            moved.piece_type = promotion;
        }
        board.set(mv.from, None);
        board.set(mv.to, Some(moved));

        // 王车易位：同步移动对应的车
        if mv.castling {
            let row = mv.from.row;
            let (rook_from, rook_to) = if mv.to.col == 6 { (7u8, 5u8) } else { (0u8, 3u8) };
            if let Some(mut rook) = board.get(Square::new_unchecked(row, rook_from)) {
                rook.has_moved = true;
                board.set(Square::new_unchecked(row, rook_from), None);
                board.set(Square::new_unchecked(row, rook_to), Some(rook));
            }
        }

        let mut history = self.history.clone();
        history.push(mv.clone());

        Ok(GameState {
            board,
            side_to_move: self.side_to_move.opponent(),
            history,
        })
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::initial()
    }
}
