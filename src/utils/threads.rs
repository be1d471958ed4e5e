use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// 以受限并发度执行一组 future，结果按输入顺序返回
///
/// 所有 future 都在当前任务内协作式推进，函数返回即为汇合点。
pub async fn do_parallel_with_limit<F, T>(futures: Vec<F>, max_concurrent: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

    let controlled_futures = futures.into_iter().map(|fut| {
        let semaphore = semaphore.clone();
        async move {
            // 信号量从不关闭，acquire 只会成功
            let _permit = semaphore.acquire().await;
            fut.await
        }
    });

    join_all(controlled_futures).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let futures: Vec<_> = (0..5u64)
            .map(|i| async move {
                tokio::time::sleep(Duration::from_millis(10 * (5 - i))).await;
                i
            })
            .collect();

        let results = do_parallel_with_limit(futures, 2).await;
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let futures: Vec<_> = (0..8)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .collect();

        do_parallel_with_limit(futures, 3).await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_zero_limit_still_runs() {
        let futures: Vec<_> = (0..3).map(|i| async move { i * 2 }).collect();
        let results = do_parallel_with_limit(futures, 0).await;
        assert_eq!(results, vec![0, 2, 4]);
    }
}
