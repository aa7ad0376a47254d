//! 走法生成和终局判定

use serde::{Deserialize, Serialize};

use crate::board::{Board, GameState};
use crate::constants::{BLACK_PAWN_RANK, WHITE_PAWN_RANK};
use crate::notation::Notation;
use crate::piece::{Color, Piece, PieceType, Square};

/// 走法
///
/// 自描述：代数记谱在生成时从走子前的棋盘推导，之后无需额外
/// 上下文即可记录或显示。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// 起始格子
    pub from: Square,
    /// 目标格子
    pub to: Square,
    /// 代数记谱（如 e4、Nxf3、0-0、e8=Q）
    pub algebraic: String,
    /// 是否吃过路兵
    pub en_passant: bool,
    /// 是否王车易位
    pub castling: bool,
    /// 兵是否前进两格（开启吃过路兵窗口）
    pub is_pawn_moving_two: bool,
    /// 升变目标棋子类型
    pub promotion: Option<PieceType>,
}

impl Move {
    /// 创建普通走法
    pub fn new(board: &Board, from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            algebraic: Notation::annotate(board, from, to, None, false, false),
            en_passant: false,
            castling: false,
            is_pawn_moving_two: false,
            promotion: None,
        }
    }

    /// 创建兵进两格的走法
    pub fn pawn_double(board: &Board, from: Square, to: Square) -> Self {
        let mut mv = Self::new(board, from, to);
        mv.is_pawn_moving_two = true;
        mv
    }

    /// 创建吃过路兵的走法
    pub fn en_passant_capture(board: &Board, from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            algebraic: Notation::annotate(board, from, to, None, true, false),
            en_passant: true,
            castling: false,
            is_pawn_moving_two: false,
            promotion: None,
        }
    }

    /// 创建升变走法
    pub fn with_promotion(board: &Board, from: Square, to: Square, promotion: PieceType) -> Self {
        Self {
            from,
            to,
            algebraic: Notation::annotate(board, from, to, Some(promotion), false, false),
            en_passant: false,
            castling: false,
            is_pawn_moving_two: false,
            promotion: Some(promotion),
        }
    }

    /// 创建王车易位走法
    pub fn castle(board: &Board, from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            algebraic: Notation::annotate(board, from, to, None, false, true),
            en_passant: false,
            castling: true,
            is_pawn_moving_two: false,
            promotion: None,
        }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.algebraic)
    }
}

/// 终局状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endgame {
    /// 对局进行中
    InProgress,
    /// 指定阵营被将死
    Checkmate(Color),
    /// 和棋（逼和）
    Draw,
}

/// 马的 8 个跳跃方向
const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (2, 1),
    (2, -1),
    (-2, 1),
    (-2, -1),
    (1, 2),
    (1, -2),
    (-1, 2),
    (-1, -2),
];

/// 车的滑行方向
const ROOK_DIRECTIONS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// 象的滑行方向
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// 王的 8 个相邻方向
const KING_OFFSETS: [(i8, i8); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// 走法生成器
pub struct MoveGenerator;

impl MoveGenerator {
    /// 生成指定阵营的所有合法走法（过滤掉会让己方王被将军的走法）
    pub fn legal_moves(state: &GameState, color: Color) -> Vec<Move> {
        let pseudo_legal = Self::pseudo_legal_moves(&state.board, color);

        pseudo_legal
            .into_iter()
            .filter(|mv| {
                let test_board = Self::simulate(&state.board, mv);
                !Self::is_in_check(&test_board, color)
            })
            .collect()
    }

    /// 生成指定阵营的所有伪合法走法（不考虑将军）
    pub fn pseudo_legal_moves(board: &Board, color: Color) -> Vec<Move> {
        let mut moves = Vec::with_capacity(48);

        for (square, piece) in board.pieces(color) {
            match piece.piece_type {
                PieceType::Pawn => Self::pawn_moves(board, square, color, &mut moves),
                PieceType::Knight => Self::knight_moves(board, square, color, &mut moves),
                PieceType::Rook => {
                    Self::sliding_moves(board, square, color, &ROOK_DIRECTIONS, &mut moves)
                }
                PieceType::Bishop => {
                    Self::sliding_moves(board, square, color, &BISHOP_DIRECTIONS, &mut moves)
                }
                PieceType::Queen => {
                    Self::sliding_moves(board, square, color, &ROOK_DIRECTIONS, &mut moves);
                    Self::sliding_moves(board, square, color, &BISHOP_DIRECTIONS, &mut moves);
                }
                PieceType::King => Self::king_moves(board, square, color, &mut moves),
            }
        }

        moves
    }

    /// 在副本棋盘上模拟走法（仅用于将军检测）
    fn simulate(board: &Board, mv: &Move) -> Board {
        let mut test = board.clone();
        if mv.en_passant {
            test.set(Square::new_unchecked(mv.from.row, mv.to.col), None);
        }
        let piece = test.get(mv.from);
        test.set(mv.from, None);
        test.set(mv.to, piece);
        if mv.castling {
            let row = mv.from.row;
            let (rook_from, rook_to) = if mv.to.col == 6 { (7u8, 5u8) } else { (0u8, 3u8) };
            let rook = test.get(Square::new_unchecked(row, rook_from));
            test.set(Square::new_unchecked(row, rook_from), None);
            test.set(Square::new_unchecked(row, rook_to), rook);
        }
        test
    }

    /// 生成兵的走法
    fn pawn_moves(board: &Board, square: Square, color: Color, moves: &mut Vec<Move>) {
        let dir = color.pawn_direction();
        let start_rank = match color {
            Color::White => WHITE_PAWN_RANK,
            Color::Black => BLACK_PAWN_RANK,
        };
        let promotion_rank = match color {
            Color::White => 7,
            Color::Black => 0,
        };

        // 前进一格
        if let Some(to) = square.offset(dir, 0) {
            if board.get(to).is_none() {
                if to.row == promotion_rank {
                    moves.push(Move::with_promotion(board, square, to, PieceType::Queen));
                } else {
                    moves.push(Move::new(board, square, to));
                }

                // 前进两格：仅限起始行，且两格都为空
                if square.row == start_rank {
                    if let Some(two) = square.offset(dir * 2, 0) {
                        if board.get(two).is_none() {
                            moves.push(Move::pawn_double(board, square, two));
                        }
                    }
                }
            }
        }

        // 斜吃
        for dc in [-1i8, 1i8] {
            if let Some(to) = square.offset(dir, dc) {
                if let Some(target) = board.get(to) {
                    if target.color != color {
                        if to.row == promotion_rank {
                            moves.push(Move::with_promotion(board, square, to, PieceType::Queen));
                        } else {
                            moves.push(Move::new(board, square, to));
                        }
                    }
                }
            }
        }

        // 吃过路兵：同行相邻的敌方兵刚走了两格
        for dc in [-1i8, 1i8] {
            if let Some(beside) = square.offset(0, dc) {
                if let Some(neighbor) = board.get(beside) {
                    if neighbor.color != color
                        && neighbor.piece_type == PieceType::Pawn
                        && neighbor.just_moved_two
                    {
                        if let Some(to) = square.offset(dir, dc) {
                            if board.get(to).is_none() {
                                moves.push(Move::en_passant_capture(board, square, to));
                            }
                        }
                    }
                }
            }
        }
    }

    /// 生成马的走法
    fn knight_moves(board: &Board, square: Square, color: Color, moves: &mut Vec<Move>) {
        for (dr, dc) in KNIGHT_OFFSETS {
            if let Some(to) = square.offset(dr, dc) {
                Self::try_add_move(board, square, to, color, moves);
            }
        }
    }

    /// 生成滑行棋子（车/象/后）的走法
    ///
    /// 沿每个方向前进直到越界或被阻挡，至多吃一个敌方棋子。
    fn sliding_moves(
        board: &Board,
        square: Square,
        color: Color,
        directions: &[(i8, i8)],
        moves: &mut Vec<Move>,
    ) {
        for &(dr, dc) in directions {
            let mut current = square;
            while let Some(to) = current.offset(dr, dc) {
                if let Some(target) = board.get(to) {
                    if target.color != color {
                        moves.push(Move::new(board, square, to));
                    }
                    break;
                }
                moves.push(Move::new(board, square, to));
                current = to;
            }
        }
    }

    /// 生成王的走法（含王车易位）
    fn king_moves(board: &Board, square: Square, color: Color, moves: &mut Vec<Move>) {
        for (dr, dc) in KING_OFFSETS {
            if let Some(to) = square.offset(dr, dc) {
                Self::try_add_move(board, square, to, color, moves);
            }
        }

        Self::castling_moves(board, square, color, moves);
    }

    /// 生成王车易位走法
    ///
    /// 要求王和对应车都未移动过、中间格子为空，且王的出发格、
    /// 经过格和到达格都不被攻击。
    fn castling_moves(board: &Board, square: Square, color: Color, moves: &mut Vec<Move>) {
        match board.get(square) {
            Some(p) if p.piece_type == PieceType::King && !p.has_moved => {}
            _ => return,
        }
        let row = square.row;
        let opponent = color.opponent();

        if Self::is_square_attacked(board, square, opponent) {
            return;
        }

        // (车所在列, 必须为空的列, 王经过列, 王到达列)
        let sides: [(u8, &[u8], u8, u8); 2] =
            [(7, &[5, 6], 5, 6), (0, &[1, 2, 3], 3, 2)];

        for (rook_col, empty_cols, transit_col, dest_col) in sides {
            let rook_sq = Square::new_unchecked(row, rook_col);
            match board.get(rook_sq) {
                Some(p) if p.piece_type == PieceType::Rook && p.color == color && !p.has_moved => {}
                _ => continue,
            }

            if empty_cols
                .iter()
                .any(|&c| board.get(Square::new_unchecked(row, c)).is_some())
            {
                continue;
            }

            let transit = Square::new_unchecked(row, transit_col);
            let dest = Square::new_unchecked(row, dest_col);
            if Self::is_square_attacked(board, transit, opponent)
                || Self::is_square_attacked(board, dest, opponent)
            {
                continue;
            }

            moves.push(Move::castle(board, square, dest));
        }
    }

    /// 尝试添加走法（目标为空或为敌方棋子时可走）
    fn try_add_move(board: &Board, from: Square, to: Square, color: Color, moves: &mut Vec<Move>) {
        match board.get(to) {
            Some(target) if target.color == color => {}
            _ => moves.push(Move::new(board, from, to)),
        }
    }

    /// 检查指定阵营是否被将军
    pub fn is_in_check(board: &Board, color: Color) -> bool {
        let king_sq = match board.find_king(color) {
            Some(sq) => sq,
            None => return false,
        };
        Self::is_square_attacked(board, king_sq, color.opponent())
    }

    /// 检查格子是否被指定阵营攻击
    ///
    /// 从目标格向外扫描：直线找车/后，斜线找象/后，马步找马，
    /// 相邻斜格找兵（方向取决于攻击方），相邻格找王。
    pub fn is_square_attacked(board: &Board, square: Square, by: Color) -> bool {
        // 直线滑行：车/后
        for &(dr, dc) in &ROOK_DIRECTIONS {
            if let Some(piece) = Self::first_piece_along(board, square, dr, dc) {
                if piece.color == by
                    && matches!(piece.piece_type, PieceType::Rook | PieceType::Queen)
                {
                    return true;
                }
            }
        }

        // 斜线滑行：象/后
        for &(dr, dc) in &BISHOP_DIRECTIONS {
            if let Some(piece) = Self::first_piece_along(board, square, dr, dc) {
                if piece.color == by
                    && matches!(piece.piece_type, PieceType::Bishop | PieceType::Queen)
                {
                    return true;
                }
            }
        }

        // 马
        for (dr, dc) in KNIGHT_OFFSETS {
            if let Some(sq) = square.offset(dr, dc) {
                if let Some(piece) = board.get(sq) {
                    if piece.color == by && piece.piece_type == PieceType::Knight {
                        return true;
                    }
                }
            }
        }

        // 兵：攻击方的兵位于目标格"后方"一行的相邻斜格
        let pawn_dir = by.pawn_direction();
        for dc in [-1i8, 1i8] {
            if let Some(sq) = square.offset(-pawn_dir, dc) {
                if let Some(piece) = board.get(sq) {
                    if piece.color == by && piece.piece_type == PieceType::Pawn {
                        return true;
                    }
                }
            }
        }

        // 王（防止双王相邻）
        for (dr, dc) in KING_OFFSETS {
            if let Some(sq) = square.offset(dr, dc) {
                if let Some(piece) = board.get(sq) {
                    if piece.color == by && piece.piece_type == PieceType::King {
                        return true;
                    }
                }
            }
        }

        false
    }

    /// 沿方向找到的第一个棋子
    fn first_piece_along(board: &Board, from: Square, dr: i8, dc: i8) -> Option<Piece> {
        let mut current = from;
        while let Some(next) = current.offset(dr, dc) {
            if let Some(piece) = board.get(next) {
                return Some(piece);
            }
            current = next;
        }
        None
    }

    /// 终局判定
    ///
    /// 当前走子方无合法走法时：被将军则为将死，否则为逼和。
    pub fn endgame(state: &GameState) -> Endgame {
        if !Self::legal_moves(state, state.side_to_move).is_empty() {
            return Endgame::InProgress;
        }
        if Self::is_in_check(&state.board, state.side_to_move) {
            Endgame::Checkmate(state.side_to_move)
        } else {
            Endgame::Draw
        }
    }
}
