//! JSON-lines 事件日志
//!
//! 两条只追加的日志流：oracle 调用记录与极小极大迭代事件。
//! 写入走无界通道到后台任务，从不阻塞搜索。

use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::warn;

/// 单条 JSONL 日志流
///
/// `append` 把记录投递给后台写入任务后立即返回；投递失败时
/// 静默丢弃（fire-and-forget）。
#[derive(Clone)]
pub struct JsonlLogger {
    tx: mpsc::UnboundedSender<String>,
}

impl JsonlLogger {
    /// 打开（或创建）日志文件并启动后台写入任务
    ///
    /// 需要在 tokio 运行时内调用。
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut file = tokio::fs::File::from_std(file);
            while let Some(mut line) = rx.recv().await {
                line.push('\n');
                if let Err(e) = file.write_all(line.as_bytes()).await {
                    warn!("JSONL log write failed: {}", e);
                    break;
                }
            }
        });

        Ok(Self { tx })
    }

    /// 追加一条记录
    pub fn append(&self, record: Value) {
        match serde_json::to_string(&record) {
            Ok(line) => {
                let _ = self.tx.send(line);
            }
            Err(e) => warn!("JSONL record serialization failed: {}", e),
        }
    }
}

/// 搜索日志句柄
///
/// 捆绑两条可选的日志流，可廉价克隆后分发给 oracle 客户端与
/// 搜索核心。默认关闭。
#[derive(Clone, Default)]
pub struct SearchLog {
    oracle: Option<JsonlLogger>,
    search: Option<JsonlLogger>,
}

impl SearchLog {
    /// 关闭全部日志
    pub fn disabled() -> Self {
        Self::default()
    }

    /// 启用两条日志流
    pub fn new(oracle: JsonlLogger, search: JsonlLogger) -> Self {
        Self {
            oracle: Some(oracle),
            search: Some(search),
        }
    }

    /// 记录一次 oracle 调用（请求参数与完整响应）
    pub fn oracle_call(&self, model: &str, request: &Value, response: &Value) {
        if let Some(logger) = &self.oracle {
            logger.append(json!({
                "at": Utc::now().to_rfc3339(),
                "model": model,
                "request": request,
                "response": response,
            }));
        }
    }

    /// 记录一次叶子评估
    pub fn state_evaluation(&self, depth: u32, value: f64, used_budget: f64) {
        self.search_event("stateEvaluation", depth, value, used_budget);
    }

    /// 记录一次节点迭代
    pub fn minimax_iter(&self, depth: u32, value: f64, used_budget: f64) {
        self.search_event("minimaxIter", depth, value, used_budget);
    }

    fn search_event(&self, event: &str, depth: u32, value: f64, used_budget: f64) {
        if let Some(logger) = &self.search {
            logger.append(json!({
                "at": Utc::now().to_rfc3339(),
                "event": event,
                "depth": depth,
                "value": value,
                "usedBudget": used_budget,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_jsonl_logger_appends_lines() {
        let path = std::env::temp_dir().join(format!(
            "chess-agent-log-test-{}.jsonl",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        {
            let logger = JsonlLogger::open(&path).unwrap();
            logger.append(json!({"event": "first"}));
            logger.append(json!({"event": "second"}));
        }

        // 后台任务异步落盘，稍等片刻
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("first"));
        assert!(lines[1].contains("second"));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_disabled_log_is_noop() {
        let log = SearchLog::disabled();
        log.state_evaluation(1, 0.5, 10.0);
        log.minimax_iter(1, 0.5, 21.0);
        log.oracle_call("gpt-4", &json!({}), &json!({}));
    }
}
