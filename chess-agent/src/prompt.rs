//! LLM 提示模板
//!
//! 把对局状态渲染为规范的文本上下文（ASCII 棋盘、棋子统计、
//! 位置清单、走法历史、轮次说明），并在其上构建三个任务提示：
//! 描述、评估、后继走法。

use chess_rules::{Color, GameState, Move, Square, BOARD_SIZE};

/// 提示模板
pub struct PromptBuilder;

impl PromptBuilder {
    /// 系统提示：设定 LLM 作为国际象棋专家的角色
    pub fn system_prompt() -> &'static str {
        "You are a chess expert. You analyse positions carefully and \
         always answer in exactly the format that is requested."
    }

    /// 共享上下文块：棋盘、图例、统计、位置、历史、轮次
    pub fn context_block(state: &GameState) -> String {
        let mut context = String::new();

        context.push_str("Current board:\n\n");
        context.push_str(&Self::visualize_board(state));
        context.push('\n');

        context.push_str(
            "Legend: uppercase letters are white pieces, lowercase letters are \
             black pieces, '.' is an empty square. P/p = pawn, R/r = rook, \
             N/n = knight, B/b = bishop, Q/q = queen, K/k = king.\n\n",
        );

        context.push_str("Piece count:\n");
        let census = state.board.piece_census();
        match serde_json::to_string_pretty(&census) {
            Ok(json) => context.push_str(&json),
            Err(_) => context.push_str("(unavailable)"),
        }
        context.push_str("\n\n");

        context.push_str(&format!(
            "White pieces: {}\n",
            Self::piece_positions(state, Color::White)
        ));
        context.push_str(&format!(
            "Black pieces: {}\n\n",
            Self::piece_positions(state, Color::Black)
        ));

        if state.history.is_empty() {
            context.push_str("No moves have been played yet.\n");
        } else {
            let history: Vec<&str> = state.history.iter().map(|m| m.algebraic.as_str()).collect();
            context.push_str(&format!("Moves so far: {}\n", history.join(" ")));
        }

        context.push_str(&format!(
            "It is the {} player's turn to move.\n",
            state.side_to_move
        ));

        context
    }

    /// ASCII 棋盘（两侧都带线路字母与行号）
    pub fn visualize_board(state: &GameState) -> String {
        let files = "  a b c d e f g h\n";
        let mut board = String::new();

        board.push_str(files);
        for row in (0..BOARD_SIZE).rev() {
            let rank = row + 1;
            board.push_str(&format!("{} ", rank));
            for col in 0..BOARD_SIZE {
                let sq = Square::new_unchecked(row as u8, col as u8);
                let ch = match state.board.get(sq) {
                    Some(piece) => piece.to_ascii_char(),
                    None => '.',
                };
                board.push(ch);
                board.push(' ');
            }
            board.push_str(&format!("{}\n", rank));
        }
        board.push_str(files);

        board
    }

    /// 单方所有棋子的位置清单（如 `K e1, Q d1, P e4`）
    fn piece_positions(state: &GameState, color: Color) -> String {
        state
            .board
            .pieces(color)
            .into_iter()
            .map(|(sq, piece)| format!("{} {}", piece.to_ascii_char(), sq.to_algebraic()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 描述任务提示
    pub fn describe_prompt(context: &str) -> String {
        format!(
            "{context}\n\
             Describe the game state: the important pieces, any danger, the \
             tactics in play, and the implications for both players. Format \
             your answer as three short sets of bullet points."
        )
    }

    /// 评估任务提示（配合 1-token 上限与 logit 偏置使用）
    pub fn evaluate_prompt(context: &str, description: &str) -> String {
        format!(
            "{context}\n{description}\n\
             Who is more likely to win this game? Do not explain. Just answer \
             `black` or `white`, in lowercase."
        )
    }

    /// 后继走法任务提示：候选清单是完整的合法走法集
    pub fn successors_prompt(
        context: &str,
        description: &str,
        side: Color,
        legal_moves: &[Move],
        target_count: usize,
    ) -> String {
        let candidates: Vec<&str> = legal_moves.iter().map(|m| m.algebraic.as_str()).collect();
        format!(
            "{context}\n{description}\n\
             What moves is the {side} player likely to make next? Select \
             around {target_count} of the most promising moves. Finish your \
             answer with `Moves: ` followed by the selected moves in \
             algebraic notation, separated by commas. Choose from the \
             following moves: {}",
            candidates.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_rules::MoveGenerator;

    #[test]
    fn test_visualize_initial_board() {
        let state = GameState::initial();
        let board = PromptBuilder::visualize_board(&state);

        let lines: Vec<&str> = board.lines().collect();
        assert_eq!(lines[0], "  a b c d e f g h");
        assert_eq!(lines[1], "8 r n b q k b n r 8");
        assert_eq!(lines[4], "5 . . . . . . . . 5");
        assert_eq!(lines[8], "1 R N B Q K B N R 1");
        assert_eq!(lines[9], "  a b c d e f g h");
    }

    #[test]
    fn test_context_block_sections() {
        let state = GameState::initial();
        let context = PromptBuilder::context_block(&state);

        assert!(context.contains("Current board:"));
        assert!(context.contains("Legend:"));
        assert!(context.contains("Piece count:"));
        assert!(context.contains("\"pawn\": 8"));
        assert!(context.contains("White pieces: R a1"));
        assert!(context.contains("K e1"));
        assert!(context.contains("No moves have been played yet."));
        assert!(context.contains("It is the white player's turn to move."));
    }

    #[test]
    fn test_context_block_history() {
        let state = GameState::initial();
        let e4 = MoveGenerator::legal_moves(&state, Color::White)
            .into_iter()
            .find(|m| m.algebraic == "e4")
            .unwrap();
        let state = state.apply(&e4).unwrap();

        let context = PromptBuilder::context_block(&state);
        assert!(context.contains("Moves so far: e4"));
        assert!(context.contains("It is the black player's turn to move."));
    }

    #[test]
    fn test_successors_prompt_lists_candidates() {
        let state = GameState::initial();
        let legal = MoveGenerator::legal_moves(&state, Color::White);
        let context = PromptBuilder::context_block(&state);
        let prompt =
            PromptBuilder::successors_prompt(&context, "(description)", Color::White, &legal, 8);

        assert!(prompt.contains("the white player"));
        assert!(prompt.contains("around 8"));
        assert!(prompt.contains("Moves: "));
        assert!(prompt.contains("e4"));
        assert!(prompt.contains("Nf3"));
    }

    #[test]
    fn test_evaluate_prompt_wording() {
        let prompt = PromptBuilder::evaluate_prompt("(context)", "(description)");
        assert!(prompt.contains("Who is more likely to win"));
        assert!(prompt.contains("`black` or `white`"));
    }
}
