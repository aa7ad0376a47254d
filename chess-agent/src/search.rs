//! 压缩极小极大搜索核心
//!
//! 预算化的搜索：每个节点按后继概率切分剩余预算，深度随局面的
//! 前景自适应。极小极大值与后继列表都经过单飞缓存，置换局面
//! 不会重复计算。

use async_trait::async_trait;
use futures::future::join_all;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use chess_rules::{state_hash, Color, Endgame, GameState, Move, MoveGenerator};

use crate::cache::{FlightCache, MinimaxCache, Probe};
use crate::error::SearchError;
use crate::logging::SearchLog;

/// 后继局面：候选走法及 oracle 赋予的概率
#[derive(Debug, Clone, PartialEq)]
pub struct Successor {
    pub next_state: GameState,
    pub mv: Move,
    pub probability: f64,
}

/// 搜索成本配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSetup {
    /// 最大搜索深度
    pub max_depth: u32,
    /// 根节点的总预算
    pub total_budget: f64,
    /// 一次叶子评估的成本
    pub state_evaluation_cost: f64,
    /// 一次后继生成的成本
    pub get_successors_cost: f64,
    /// 每个节点的固定成本
    pub basic_minimax_cost: f64,
}

impl Default for CostSetup {
    fn default() -> Self {
        Self {
            max_depth: 1,
            total_budget: 500.0,
            state_evaluation_cost: 10.0,
            get_successors_cost: 10.0,
            basic_minimax_cost: 1.0,
        }
    }
}

/// 搜索后端：两个昂贵的异步 oracle
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// 叶子评估
    async fn evaluate(&self, state: &GameState) -> Result<f64, SearchError>;

    /// 后继生成（概率之和为 1）
    async fn successors(&self, state: &GameState) -> Result<Vec<Successor>, SearchError>;

    /// 后继列表未缓存时对其长度的估计
    fn estimated_successors(&self) -> usize {
        10
    }
}

/// 单个节点的搜索结果
#[derive(Debug, Clone, Copy)]
struct NodeOutcome {
    value: f64,
    used_budget: f64,
}

/// 压缩极小极大引擎
pub struct CompressedMinimax<B: SearchBackend> {
    backend: B,
    cost: CostSetup,
    /// 并行展开子节点；关闭后串行并启用 alpha-beta 剪枝
    parallel: bool,
    values: MinimaxCache,
    successors: FlightCache<Vec<Successor>>,
    log: SearchLog,
}

impl<B: SearchBackend> CompressedMinimax<B> {
    /// 创建引擎（默认并行展开，日志关闭）
    pub fn new(backend: B, cost: CostSetup) -> Self {
        Self::with_options(backend, cost, true, SearchLog::disabled())
    }

    /// 创建引擎并指定展开模式与日志
    pub fn with_options(backend: B, cost: CostSetup, parallel: bool, log: SearchLog) -> Self {
        Self {
            backend,
            cost,
            parallel,
            values: MinimaxCache::new(),
            successors: FlightCache::new(),
            log,
        }
    }

    /// 访问后端
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 当前成本配置
    pub fn cost(&self) -> &CostSetup {
        &self.cost
    }

    /// 清空两个缓存（从零开始的确定性重搜索）
    pub fn reset(&self) {
        self.values.clear();
        self.successors.clear();
    }

    /// 根节点：为当前走子方选择走法
    ///
    /// 根永远并行展开全部子树。白方取 arg-max，黑方取 arg-min；
    /// 平值时 max 保留先出现的子节点，min 保留后出现的子节点。
    pub async fn choose_move(&self, state: &GameState) -> Result<Move, SearchError> {
        let maximizing = state.side_to_move == Color::White;
        let root_hash = state_hash(state);
        let cached_root = self.successors.contains(&root_hash);

        let successors = self.successors_for(state).await?;
        if successors.is_empty() {
            return Err(SearchError::NoSuccessors);
        }

        let child_searches: Vec<_> = successors
            .iter()
            .map(|s| {
                self.minimax(
                    1,
                    s.next_state.clone(),
                    self.cost.total_budget * s.probability,
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                    !maximizing,
                )
            })
            .collect();
        let outcomes = join_all(child_searches).await;

        let mut used_budget = if cached_root { 0.0 } else { self.cost.get_successors_cost };
        let mut best: Option<(f64, &Successor)> = None;
        for (successor, outcome) in successors.iter().zip(outcomes) {
            let outcome = outcome?;
            used_budget += outcome.used_budget;
            best = Some(match best {
                None => (outcome.value, successor),
                Some((best_value, best_successor)) => {
                    let replace = if maximizing {
                        outcome.value > best_value
                    } else {
                        outcome.value <= best_value
                    };
                    if replace {
                        (outcome.value, successor)
                    } else {
                        (best_value, best_successor)
                    }
                }
            });
        }

        // 后继非空，best 必然已赋值
        let (value, successor) = best.ok_or(SearchError::NoSuccessors)?;
        self.log.minimax_iter(0, value, used_budget);
        debug!(
            "Root chose {} (value={:.4}, used_budget={:.1})",
            successor.mv.algebraic, value, used_budget
        );

        Ok(successor.mv.clone())
    }

    /// 递归节点
    ///
    /// 缓存命中直接复用（usedBudget 记 0）；否则原子地发布在途
    /// 槽位后计算，所有返回路径都会履约该槽位。
    fn minimax(
        &self,
        depth: u32,
        state: GameState,
        budget: f64,
        alpha: f64,
        beta: f64,
        maximizing: bool,
    ) -> BoxFuture<'_, Result<NodeOutcome, SearchError>> {
        async move {
            let hash = state_hash(&state);
            let promise = match self.values.begin(&hash, budget) {
                Probe::Wait(shared) => {
                    let value = shared.await?;
                    return Ok(NodeOutcome {
                        value,
                        used_budget: 0.0,
                    });
                }
                Probe::Compute(promise) => promise,
            };

            let outcome = self
                .search_node(depth, &state, &hash, budget, alpha, beta, maximizing)
                .await;
            match &outcome {
                Ok(node) => promise.resolve(Ok(node.value)),
                Err(e) => promise.resolve(Err(e.clone())),
            }
            outcome
        }
        .boxed()
    }

    /// 终局探测、叶子判定与展开
    #[allow(clippy::too_many_arguments)]
    async fn search_node(
        &self,
        depth: u32,
        state: &GameState,
        hash: &str,
        budget: f64,
        alpha: f64,
        beta: f64,
        maximizing: bool,
    ) -> Result<NodeOutcome, SearchError> {
        let mut used_budget = self.cost.basic_minimax_cost;

        match MoveGenerator::endgame(state) {
            Endgame::Checkmate(Color::White) => {
                self.log.minimax_iter(depth, -1.0, used_budget);
                return Ok(NodeOutcome {
                    value: -1.0,
                    used_budget,
                });
            }
            Endgame::Checkmate(Color::Black) => {
                self.log.minimax_iter(depth, 1.0, used_budget);
                return Ok(NodeOutcome {
                    value: 1.0,
                    used_budget,
                });
            }
            // 和棋按叶子处理，交给评估
            Endgame::Draw => return self.evaluate_leaf(depth, state, used_budget).await,
            Endgame::InProgress => {}
        }

        // 叶子判定：深度用尽，或预算不足以覆盖后继生成与全部子评估
        let realized_successors_cost = if self.successors.contains(hash) {
            0.0
        } else {
            self.cost.get_successors_cost
        };
        let estimated_successors = self
            .successors
            .resolved(hash)
            .and_then(|cached| cached.ok())
            .map(|cached| cached.len())
            .unwrap_or_else(|| self.backend.estimated_successors());
        let projected = used_budget
            + realized_successors_cost
            + estimated_successors as f64 * self.cost.state_evaluation_cost;

        if depth >= self.cost.max_depth || budget < projected {
            return self.evaluate_leaf(depth, state, used_budget).await;
        }

        used_budget += realized_successors_cost;
        let successors = self.successors_for(state).await?;
        if successors.is_empty() {
            return Err(SearchError::NoSuccessors);
        }

        // 剩余预算按概率切分给子节点
        let remaining = budget - used_budget;
        let value = if self.parallel {
            let child_searches: Vec<_> = successors
                .iter()
                .map(|s| {
                    self.minimax(
                        depth + 1,
                        s.next_state.clone(),
                        remaining * s.probability,
                        f64::NEG_INFINITY,
                        f64::INFINITY,
                        !maximizing,
                    )
                })
                .collect();
            let outcomes = join_all(child_searches).await;

            let mut value = if maximizing {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
            for outcome in outcomes {
                let outcome = outcome?;
                used_budget += outcome.used_budget;
                value = if maximizing {
                    value.max(outcome.value)
                } else {
                    value.min(outcome.value)
                };
            }
            value
        } else {
            let mut alpha = alpha;
            let mut beta = beta;
            let mut value = if maximizing {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
            for successor in &successors {
                let outcome = self
                    .minimax(
                        depth + 1,
                        successor.next_state.clone(),
                        remaining * successor.probability,
                        alpha,
                        beta,
                        !maximizing,
                    )
                    .await?;
                used_budget += outcome.used_budget;
                if maximizing {
                    value = value.max(outcome.value);
                    alpha = alpha.max(value);
                } else {
                    value = value.min(outcome.value);
                    beta = beta.min(value);
                }
                if beta <= alpha {
                    break;
                }
            }
            value
        };

        self.log.minimax_iter(depth, value, used_budget);
        Ok(NodeOutcome { value, used_budget })
    }

    /// 叶子：收取评估成本并调用后端
    async fn evaluate_leaf(
        &self,
        depth: u32,
        state: &GameState,
        used_budget: f64,
    ) -> Result<NodeOutcome, SearchError> {
        let used_budget = used_budget + self.cost.state_evaluation_cost;
        let value = self.backend.evaluate(state).await?;
        self.log.state_evaluation(depth, value, used_budget);
        Ok(NodeOutcome { value, used_budget })
    }

    /// 通过单飞缓存获取后继列表
    async fn successors_for(&self, state: &GameState) -> Result<Vec<Successor>, SearchError> {
        let hash = state_hash(state);
        match self.successors.begin(&hash) {
            Probe::Wait(shared) => shared.await,
            Probe::Compute(promise) => {
                let result = self.backend.successors(state).await;
                promise.resolve(result.clone());
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// 计数的确定性后端：后继取前两个合法走法，评估返回固定值
    struct StubBackend {
        evaluations: Arc<AtomicUsize>,
        successor_calls: Arc<AtomicUsize>,
        value: f64,
    }

    impl StubBackend {
        fn new(value: f64) -> Self {
            Self {
                evaluations: Arc::new(AtomicUsize::new(0)),
                successor_calls: Arc::new(AtomicUsize::new(0)),
                value,
            }
        }
    }

    #[async_trait]
    impl SearchBackend for StubBackend {
        async fn evaluate(&self, _state: &GameState) -> Result<f64, SearchError> {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            Ok(self.value)
        }

        async fn successors(&self, state: &GameState) -> Result<Vec<Successor>, SearchError> {
            self.successor_calls.fetch_add(1, Ordering::SeqCst);
            let legal = MoveGenerator::legal_moves(state, state.side_to_move);
            let picked: Vec<&Move> = legal.iter().take(2).collect();
            let probability = 1.0 / picked.len() as f64;
            picked
                .into_iter()
                .map(|mv| {
                    Ok(Successor {
                        next_state: state.apply(mv)?,
                        mv: mv.clone(),
                        probability,
                    })
                })
                .collect()
        }

        fn estimated_successors(&self) -> usize {
            8
        }
    }

    fn depth_two_setup() -> CostSetup {
        CostSetup {
            max_depth: 2,
            total_budget: 500.0,
            ..CostSetup::default()
        }
    }

    #[tokio::test]
    async fn test_choose_move_returns_legal_move() {
        let engine = CompressedMinimax::new(StubBackend::new(0.6), CostSetup::default());
        let state = GameState::initial();
        let mv = engine.choose_move(&state).await.unwrap();
        let legal = MoveGenerator::legal_moves(&state, Color::White);
        assert!(legal.iter().any(|m| m.algebraic == mv.algebraic));
    }

    #[tokio::test]
    async fn test_root_is_deterministic() {
        let state = GameState::initial();
        let mut seen = Vec::new();
        for _ in 0..3 {
            let engine = CompressedMinimax::new(StubBackend::new(0.6), CostSetup::default());
            seen.push(engine.choose_move(&state).await.unwrap().algebraic);
        }
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_budget_aware_depth() {
        // 预算 500：根展开，子节点各展开一次，孙节点全部成为叶子
        let engine = CompressedMinimax::new(StubBackend::new(0.6), depth_two_setup());
        let state = GameState::initial();
        engine.choose_move(&state).await.unwrap();

        let backend = engine.backend();
        // 根 + 2 个子节点，各返回 2 个后继
        assert_eq!(backend.successor_calls.load(Ordering::SeqCst), 3);
        // 4 个孙节点叶子评估
        assert_eq!(backend.evaluations.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_starved_budget_keeps_children_as_leaves() {
        // 预算 50：子节点预算 25 < 1 + 10 + 8×10，全部成为叶子
        let cost = CostSetup {
            total_budget: 50.0,
            ..depth_two_setup()
        };
        let engine = CompressedMinimax::new(StubBackend::new(0.6), cost);
        let state = GameState::initial();
        engine.choose_move(&state).await.unwrap();

        let backend = engine.backend();
        assert_eq!(backend.successor_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.evaluations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cached_budget_skips_oracle() {
        let engine = CompressedMinimax::new(StubBackend::new(0.6), CostSetup::default());
        let state = GameState::initial();

        engine.choose_move(&state).await.unwrap();
        let evaluations = engine.backend().evaluations.load(Ordering::SeqCst);
        let successor_calls = engine.backend().successor_calls.load(Ordering::SeqCst);

        // 同一预算重搜：全部从缓存命中，没有新的 oracle 调用
        engine.choose_move(&state).await.unwrap();
        assert_eq!(engine.backend().evaluations.load(Ordering::SeqCst), evaluations);
        assert_eq!(
            engine.backend().successor_calls.load(Ordering::SeqCst),
            successor_calls
        );
    }

    #[tokio::test]
    async fn test_concurrent_searches_single_flight() {
        let engine = Arc::new(CompressedMinimax::new(
            StubBackend::new(0.6),
            CostSetup::default(),
        ));
        let state = GameState::initial();

        let searches: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                let state = state.clone();
                async move { engine.choose_move(&state).await }
            })
            .collect();
        let moves = join_all(searches).await;

        let first = moves[0].as_ref().unwrap().algebraic.clone();
        for mv in &moves {
            assert_eq!(mv.as_ref().unwrap().algebraic, first);
        }

        // 每个不同状态的后继与评估各只算一次
        assert_eq!(engine.backend().successor_calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.backend().evaluations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_checkmate_preferred_without_evaluation() {
        use chess_rules::{Board, Piece, PieceType, Square};

        // 白车 a1 可走 a8 形成底线将杀；黑王 h8 被 g7/h7 兵困住
        let mut board = Board::empty();
        board.set(Square::new_unchecked(0, 4), Some(Piece::new(PieceType::King, Color::White)));
        board.set(Square::new_unchecked(0, 0), Some(Piece::new(PieceType::Rook, Color::White)));
        board.set(Square::new_unchecked(7, 7), Some(Piece::new(PieceType::King, Color::Black)));
        board.set(Square::new_unchecked(6, 6), Some(Piece::new(PieceType::Pawn, Color::Black)));
        board.set(Square::new_unchecked(6, 7), Some(Piece::new(PieceType::Pawn, Color::Black)));
        let state = GameState::from_board(board, Color::White);

        /// 将杀走法与一个平庸走法各占一半概率
        struct MatePicker;

        #[async_trait]
        impl SearchBackend for MatePicker {
            async fn evaluate(&self, _state: &GameState) -> Result<f64, SearchError> {
                Ok(0.6)
            }

            async fn successors(&self, state: &GameState) -> Result<Vec<Successor>, SearchError> {
                let legal = MoveGenerator::legal_moves(state, state.side_to_move);
                let mate = legal.iter().find(|m| m.algebraic == "Ra8").cloned();
                let quiet = legal.iter().find(|m| m.algebraic == "Ra2").cloned();
                let picked: Vec<Move> = [quiet, mate].into_iter().flatten().collect();
                let probability = 1.0 / picked.len() as f64;
                picked
                    .into_iter()
                    .map(|mv| {
                        Ok(Successor {
                            next_state: state.apply(&mv)?,
                            mv,
                            probability,
                        })
                    })
                    .collect()
            }

            fn estimated_successors(&self) -> usize {
                8
            }
        }

        let engine = CompressedMinimax::new(MatePicker, CostSetup::default());
        let mv = engine.choose_move(&state).await.unwrap();
        // 将杀子树的终局值 +1 胜过评估值 0.6
        assert_eq!(mv.algebraic, "Ra8");
    }

    #[tokio::test]
    async fn test_serial_mode_matches_parallel_value() {
        let state = GameState::initial();

        let parallel = CompressedMinimax::new(StubBackend::new(0.6), depth_two_setup());
        let serial = CompressedMinimax::with_options(
            StubBackend::new(0.6),
            depth_two_setup(),
            false,
            SearchLog::disabled(),
        );

        let a = parallel.choose_move(&state).await.unwrap();
        let b = serial.choose_move(&state).await.unwrap();
        assert_eq!(a.algebraic, b.algebraic);
    }

    #[tokio::test]
    async fn test_reset_clears_caches() {
        let engine = CompressedMinimax::new(StubBackend::new(0.6), CostSetup::default());
        let state = GameState::initial();

        engine.choose_move(&state).await.unwrap();
        let first = engine.backend().successor_calls.load(Ordering::SeqCst);

        engine.reset();
        engine.choose_move(&state).await.unwrap();
        assert_eq!(
            engine.backend().successor_calls.load(Ordering::SeqCst),
            first * 2
        );
    }
}
