//! 国际象棋规则引擎
//!
//! 包含:
//! - 棋子、棋盘、格子等核心数据结构
//! - 走法生成和规则验证（含王车易位、吃过路兵、升变）
//! - 终局判定（将死/逼和）
//! - 确定性状态哈希（用于置换检测）
//! - 代数记谱标注

mod board;
mod constants;
mod error;
mod hash;
mod moves;
mod notation;
mod piece;

pub use board::{Board, GameState, PieceCensus, SideCensus};
pub use constants::BOARD_SIZE;
pub use error::ChessError;
pub use hash::{state_hash, StateHash};
pub use moves::{Endgame, Move, MoveGenerator};
pub use notation::Notation;
pub use piece::{Color, Piece, PieceType, Square};
