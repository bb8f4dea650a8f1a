use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rocket::tokio::{
    self,
    sync::Notify,
    task::{JoinError, JoinHandle},
    time::Duration,
};

/// A task scheduled to run after a delay.
/// It can be cancelled or triggered early, and is aborted when dropped, so
/// its lifetime never exceeds that of its owner.
pub struct ScheduledTask<T> {
    task_handle: JoinHandle<T>,
    wait_handle: JoinHandle<()>,
    signal: Arc<Notify>,
}

impl<T> ScheduledTask<T>
where
    T: Send + 'static,
{
    /// Schedule the given task to execute after `delay`.
    /// A zero delay executes it as soon as the runtime gets to it.
    pub fn after<Fut>(task: Fut, delay: Duration) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        // Create the synchronisation signal.
        let signal = Arc::new(Notify::new());

        // Schedule the task to wait on the signal.
        let task_signal = signal.clone();
        let task_handle = tokio::spawn(async move {
            task_signal.notified().await;
            task.await
        });

        // Spawn another task to give the signal at the appropriate time.
        let wait_signal = signal.clone();
        let wait_handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            wait_signal.notify_one();
        });

        Self {
            task_handle,
            wait_handle,
            signal,
        }
    }

    /// Cancel the task. Returns true iff it had already completed before we could cancel it.
    pub async fn cancel(mut self) -> bool {
        self.task_handle.abort();
        self.wait_handle.abort();
        (&mut self.task_handle).await.is_ok()
    }

    /// Trigger the task now instead of waiting till the original time.
    pub fn trigger_now(&self) {
        self.wait_handle.abort();
        self.signal.notify_one();
    }

    /// Has the task run to completion (or been aborted)?
    pub fn is_finished(&self) -> bool {
        self.task_handle.is_finished()
    }
}

impl ScheduledTask<()> {
    /// Run `step` once per `period`, starting one period from now, until it
    /// returns [`ControlFlow::Break`].
    ///
    /// # Panics
    ///
    /// If `period` is zero.
    pub fn every<F, Fut>(period: Duration, mut step: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        assert!(!period.is_zero(), "`every` needs a non-zero period");
        let repeat = async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                if step().await.is_break() {
                    break;
                }
            }
        };
        Self::after(repeat, Duration::ZERO)
    }
}

/// Implement `Future` for `ScheduledTask` so we can directly `await` it.
impl<T> Future for ScheduledTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task_handle).poll(cx)
    }
}

impl<T> Drop for ScheduledTask<T> {
    fn drop(&mut self) {
        self.task_handle.abort();
        self.wait_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn runs_after_the_delay() {
        let task = ScheduledTask::after(async { 7 }, Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(!task.is_finished());
        assert_eq!(7, task.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_task_never_runs() {
        let ran = Arc::new(AtomicU32::new(0));
        let task_ran = ran.clone();
        let task = ScheduledTask::after(
            async move {
                task_ran.fetch_add(1, Ordering::SeqCst);
            },
            Duration::from_secs(5),
        );
        assert!(!task.cancel().await);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(0, ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_task_aborts_it() {
        let ran = Arc::new(AtomicU32::new(0));
        let task_ran = ran.clone();
        let task = ScheduledTask::after(
            async move {
                task_ran.fetch_add(1, Ordering::SeqCst);
            },
            Duration::from_secs(5),
        );
        drop(task);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(0, ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_now_skips_the_wait() {
        let task = ScheduledTask::after(async { "done" }, Duration::from_secs(3600));
        task.trigger_now();
        let started = tokio::time::Instant::now();
        assert_eq!("done", task.await.unwrap());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn repeats_until_break() {
        let count = Arc::new(AtomicU32::new(0));
        let step_count = count.clone();
        let task = ScheduledTask::every(Duration::from_secs(1), move || {
            let count = step_count.clone();
            async move {
                if count.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        });
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(2, count.load(Ordering::SeqCst));
        task.await.unwrap();
        assert_eq!(3, count.load(Ordering::SeqCst));
    }

    #[tokio::test]
    #[should_panic(expected = "non-zero period")]
    async fn zero_period_is_refused_up_front() {
        let _task = ScheduledTask::every(Duration::ZERO, || async { ControlFlow::Break(()) });
    }
}
