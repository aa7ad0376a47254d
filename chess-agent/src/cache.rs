//! 单飞缓存（single-flight）
//!
//! 缓存槽位是一个共享 future：计算开始的那一刻（而非完成后）就
//! 发布待定槽位，同一 key 的并发请求全部挂到同一个 future 上，
//! 昂贵的计算永远不会并发重复。探测与发布在同一把锁内完成，
//! 保证"第一个 await 之前已可见"。
//!
//! 槽位状态机：`absent → pending → resolved`；极小极大缓存额外
//! 支持预算升级（`pending → pending'`），旧等待者仍会从旧 future
//! 得到较弱的结果。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::oneshot;

use crate::error::SearchError;

/// 极小极大缓存的预算容差
pub const BUDGET_CACHE_TOLERANCE: f64 = 0.1;

/// 共享的延迟值：任意多个等待者可克隆并 await
pub type SharedValue<T> = Shared<BoxFuture<'static, Result<T, SearchError>>>;

/// 待定槽位的履约端
///
/// 被丢弃而未 resolve 时，等待者收到 `SearchError::Abandoned`。
pub struct Promise<T> {
    tx: oneshot::Sender<Result<T, SearchError>>,
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// 发布计算结果，唤醒所有等待者
    pub fn resolve(self, result: Result<T, SearchError>) {
        let _ = self.tx.send(result);
    }
}

/// 创建一对 (履约端, 共享 future)
pub fn deferred<T: Clone + Send + Sync + 'static>() -> (Promise<T>, SharedValue<T>) {
    let (tx, rx) = oneshot::channel::<Result<T, SearchError>>();
    let fut: BoxFuture<'static, Result<T, SearchError>> = async move {
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Abandoned),
        }
    }
    .boxed();
    (Promise { tx }, fut.shared())
}

/// 探测结果
pub enum Probe<T> {
    /// 已有在途或完成的条目：await 它
    Wait(SharedValue<T>),
    /// 本调用者负责计算并履约
    Compute(Promise<T>),
}

/// 按 key 单飞的缓存
pub struct FlightCache<T> {
    slots: Mutex<HashMap<String, SharedValue<T>>>,
}

fn lock_slots<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Clone + Send + Sync + 'static> FlightCache<T> {
    /// 创建空缓存
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// 探测并在缺失时原子地发布待定槽位
    pub fn begin(&self, key: &str) -> Probe<T> {
        let mut slots = lock_slots(&self.slots);
        if let Some(slot) = slots.get(key) {
            return Probe::Wait(slot.clone());
        }
        let (promise, shared) = deferred();
        slots.insert(key.to_string(), shared);
        Probe::Compute(promise)
    }

    /// 是否存在条目（含在途）
    pub fn contains(&self, key: &str) -> bool {
        lock_slots(&self.slots).contains_key(key)
    }

    /// 已完成条目的值
    pub fn resolved(&self, key: &str) -> Option<Result<T, SearchError>> {
        lock_slots(&self.slots)
            .get(key)
            .and_then(|slot| slot.peek().cloned())
    }

    /// 条目数
    pub fn len(&self) -> usize {
        lock_slots(&self.slots).len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        lock_slots(&self.slots).is_empty()
    }

    /// 清空缓存
    pub fn clear(&self) {
        lock_slots(&self.slots).clear();
    }
}

impl<T: Clone + Send + Sync + 'static> Default for FlightCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 带预算的极小极大缓存条目
struct BudgetEntry {
    budget: f64,
    value: SharedValue<f64>,
}

/// 极小极大值缓存
///
/// 条目携带计算时的预算；预算不低于请求（或在容差内）的条目
/// 直接复用，更大预算的请求替换条目（升级）。
pub struct MinimaxCache {
    slots: Mutex<HashMap<String, BudgetEntry>>,
}

impl MinimaxCache {
    /// 创建空缓存
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// 探测；条目预算不足时发布升级后的新槽位
    ///
    /// 升级丢弃旧的共享 future（旧等待者仍会收到较弱的结果），
    /// 升级发起者与后续请求挂到新 future 上。
    pub fn begin(&self, key: &str, budget: f64) -> Probe<f64> {
        let mut slots = lock_slots(&self.slots);
        if let Some(entry) = slots.get(key) {
            if entry.budget >= budget || (entry.budget - budget).abs() < BUDGET_CACHE_TOLERANCE {
                return Probe::Wait(entry.value.clone());
            }
        }
        let (promise, shared) = deferred();
        slots.insert(key.to_string(), BudgetEntry { budget, value: shared });
        Probe::Compute(promise)
    }

    /// 条目数
    pub fn len(&self) -> usize {
        lock_slots(&self.slots).len()
    }

    /// 清空缓存
    pub fn clear(&self) {
        lock_slots(&self.slots).clear();
    }
}

impl Default for MinimaxCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_single_flight_shares_one_computation() {
        let cache = Arc::new(FlightCache::<u32>::new());
        let computations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let computations = computations.clone();
            handles.push(async move {
                match cache.begin("k") {
                    Probe::Wait(fut) => fut.await,
                    Probe::Compute(promise) => {
                        computations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        promise.resolve(Ok(7));
                        Ok(7)
                    }
                }
            });
        }

        let results = futures::future::join_all(handles).await;
        assert_eq!(computations.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), 7);
        }
    }

    #[tokio::test]
    async fn test_pending_entry_visible_before_await() {
        let cache = FlightCache::<u32>::new();
        let probe = cache.begin("k");
        assert!(cache.contains("k"));
        assert!(cache.resolved("k").is_none());

        match probe {
            Probe::Compute(promise) => promise.resolve(Ok(1)),
            Probe::Wait(_) => panic!("first probe must compute"),
        }
        assert_eq!(cache.resolved("k"), Some(Ok(1)));
    }

    #[tokio::test]
    async fn test_abandoned_promise_fails_waiters() {
        let cache = FlightCache::<u32>::new();
        let probe = cache.begin("k");
        let waiter = match cache.begin("k") {
            Probe::Wait(fut) => fut,
            Probe::Compute(_) => panic!("second probe must wait"),
        };
        drop(probe);
        assert_eq!(waiter.await, Err(SearchError::Abandoned));
    }

    #[tokio::test]
    async fn test_error_is_shared_with_waiters() {
        let cache = FlightCache::<u32>::new();
        let promise = match cache.begin("k") {
            Probe::Compute(p) => p,
            Probe::Wait(_) => panic!(),
        };
        let waiter = match cache.begin("k") {
            Probe::Wait(fut) => fut,
            Probe::Compute(_) => panic!(),
        };
        promise.resolve(Err(SearchError::NoSuccessors));
        assert_eq!(waiter.await, Err(SearchError::NoSuccessors));
    }

    #[tokio::test]
    async fn test_budget_reuse_and_upgrade() {
        let cache = MinimaxCache::new();

        let promise = match cache.begin("k", 100.0) {
            Probe::Compute(p) => p,
            Probe::Wait(_) => panic!(),
        };
        promise.resolve(Ok(0.5));

        // 相同或更小的预算：复用
        assert!(matches!(cache.begin("k", 100.0), Probe::Wait(_)));
        assert!(matches!(cache.begin("k", 40.0), Probe::Wait(_)));
        // 容差内的略大预算：复用
        assert!(matches!(cache.begin("k", 100.05), Probe::Wait(_)));
        // 明显更大的预算：升级重算
        assert!(matches!(cache.begin("k", 200.0), Probe::Compute(_)));
    }

    #[tokio::test]
    async fn test_upgrade_keeps_old_waiters_alive() {
        let cache = MinimaxCache::new();

        let weak_promise = match cache.begin("k", 10.0) {
            Probe::Compute(p) => p,
            Probe::Wait(_) => panic!(),
        };
        let weak_waiter = match cache.begin("k", 5.0) {
            Probe::Wait(fut) => fut,
            Probe::Compute(_) => panic!(),
        };

        // 升级换入新槽位
        let strong_promise = match cache.begin("k", 50.0) {
            Probe::Compute(p) => p,
            Probe::Wait(_) => panic!(),
        };

        // 旧等待者仍从旧 future 得到较弱的结果
        weak_promise.resolve(Ok(0.2));
        assert_eq!(weak_waiter.await, Ok(0.2));

        strong_promise.resolve(Ok(0.8));
        let fresh = match cache.begin("k", 50.0) {
            Probe::Wait(fut) => fut,
            Probe::Compute(_) => panic!(),
        };
        assert_eq!(fresh.await, Ok(0.8));
    }
}
