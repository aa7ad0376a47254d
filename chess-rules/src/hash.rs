//! 确定性状态哈希
//!
//! 从走子方和每个格子的 `{颜色, 类型, has_moved, just_moved_two}`
//! 推导字符串哈希。两个状态哈希相等当且仅当它们的合法走法集合
//! 相同（含易位资格和过路兵窗口）。非密码学哈希，同进程内稳定。

use crate::board::GameState;
use crate::constants::BOARD_SIZE;
use crate::piece::Square;

/// 状态哈希（置换检测的键）
pub type StateHash = String;

/// 计算对局状态的确定性哈希
pub fn state_hash(state: &GameState) -> StateHash {
    let mut parts = Vec::with_capacity(BOARD_SIZE * BOARD_SIZE + 1);
    parts.push(state.side_to_move.name().to_string());

    for row in 0..BOARD_SIZE {
        for col in 0..BOARD_SIZE {
            let sq = Square::new_unchecked(row as u8, col as u8);
            let tag = match state.board.get(sq) {
                None => "empty".to_string(),
                Some(piece) => {
                    let mut tag = format!(
                        "{}_{}_{}",
                        piece.color.name(),
                        piece.piece_type.tag(),
                        piece.has_moved
                    );
                    if piece.just_moved_two {
                        tag.push_str("_just2");
                    }
                    tag
                }
            };
            parts.push(tag);
        }
    }

    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::MoveGenerator;
    use crate::piece::Color;

    #[test]
    fn test_hash_deterministic() {
        let state = GameState::initial();
        assert_eq!(state_hash(&state), state_hash(&state));
        assert_eq!(state_hash(&GameState::initial()), state_hash(&state));
    }

    #[test]
    fn test_hash_stable_under_apply() {
        let state = GameState::initial();
        let moves = MoveGenerator::legal_moves(&state, Color::White);
        for mv in &moves {
            let a = state.apply(mv).unwrap();
            let b = state.apply(mv).unwrap();
            assert_eq!(state_hash(&a), state_hash(&b));
        }
    }

    #[test]
    fn test_hash_differs_per_move() {
        let state = GameState::initial();
        let moves = MoveGenerator::legal_moves(&state, Color::White);
        let mut hashes: Vec<StateHash> = moves
            .iter()
            .map(|mv| state_hash(&state.apply(mv).unwrap()))
            .collect();
        hashes.sort();
        hashes.dedup();
        assert_eq!(hashes.len(), moves.len());
    }

    #[test]
    fn test_hash_tracks_side_to_move() {
        let state = GameState::initial();
        let mut flipped = state.clone();
        flipped.side_to_move = Color::Black;
        assert_ne!(state_hash(&state), state_hash(&flipped));
    }

    #[test]
    fn test_hash_tracks_en_passant_window() {
        // e2-e4 后的局面与"同样摆位但窗口已关闭"的局面哈希不同
        let state = GameState::initial();
        let moves = MoveGenerator::legal_moves(&state, Color::White);
        let e4 = moves.iter().find(|m| m.algebraic == "e4").unwrap();
        let after = state.apply(e4).unwrap();

        let mut window_closed = after.clone();
        window_closed.board.clear_just_moved_two();
        assert_ne!(state_hash(&after), state_hash(&window_closed));
    }
}
