//! 引擎走子示例
//!
//! 运行方式:
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! export OPENAI_ORG_ID=org-...
//! cargo run -p chess-agent --example play
//! ```

use chess_agent::{AgentDescriptor, AgentRegistry, JsonlLogger, PromptBuilder, SearchLog};
use chess_rules::GameState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== LLM chess agent ===\n");

    // 两条 JSONL 日志流：oracle 调用与搜索事件
    let log = SearchLog::new(
        JsonlLogger::open("oracle-calls.jsonl")?,
        JsonlLogger::open("search-events.jsonl")?,
    );

    let registry = AgentRegistry::from_env(log)?;
    let state = GameState::initial();

    println!("{}", PromptBuilder::visualize_board(&state));
    println!("Asking gpt-3.5-turbo to choose a move for white...\n");

    match registry
        .call_agent(&state, AgentDescriptor::MinimaxGpt35)
        .await
    {
        Ok(mv) => {
            println!("Engine plays: {}", mv.algebraic);
            let next = state.apply(&mv)?;
            println!("\n{}", PromptBuilder::visualize_board(&next));
        }
        Err(e) => {
            println!("Engine could not move: {}", e);
        }
    }

    Ok(())
}
