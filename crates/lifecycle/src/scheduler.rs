//! Fixed-period execution of a named unit of work.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, error, info};

use mailman_observability::OperationContext;

use crate::panic::panic_message;
use crate::shutdown::ShutdownHandle;

/// Runs a function periodically until shutdown.
///
/// The operation name is used for logging and as the operation name of the
/// [`OperationContext`] every execution receives. A failing execution (error
/// or panic) is logged and the schedule carries on.
pub struct Scheduler<F> {
    operation_name: String,
    todo: Arc<F>,
}

impl<F, Fut, E> Scheduler<F>
where
    F: Fn(OperationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    pub fn new(operation_name: impl Into<String>, todo: F) -> Self {
        Self {
            operation_name: operation_name.into(),
            todo: Arc::new(todo),
        }
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// Run the function every `period` until `handle` is cancelled, then notify it.
    ///
    /// The first execution happens after one full period. Executions never
    /// overlap: a slow one delays the following ticks instead of skipping them.
    pub async fn run_periodically(&self, handle: ShutdownHandle, period: Duration) {
        if period.is_zero() {
            error!(
                operation = %self.operation_name,
                "scheduling period must be positive, not starting scheduled execution"
            );
            handle.notify();
            return;
        }

        info!(operation = %self.operation_name, ?period, "starting scheduled execution");
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = handle.done() => {
                    info!(operation = %self.operation_name, "shutdown requested, stopping scheduled execution");
                    break;
                }
                _ = ticker.tick() => self.execute().await,
            }
        }

        handle.notify();
    }

    /// One execution on a fresh operation context.
    async fn execute(&self) {
        let ctx = OperationContext::new().with_operation_name(self.operation_name.clone());
        let span = ctx.span();
        debug!(parent: &span, "starting scheduled execution");

        let todo = Arc::clone(&self.todo);
        // A separate task, so a panic surfaces as a JoinError instead of unwinding the loop.
        let outcome = tokio::spawn(async move { (*todo)(ctx).await }.instrument(span.clone())).await;

        match outcome {
            Ok(Ok(())) => debug!(parent: &span, "scheduled execution completed with success"),
            Ok(Err(err)) => error!(
                parent: &span,
                operation = %self.operation_name,
                error = %err,
                "scheduled execution ended with error"
            ),
            Err(join_err) if join_err.is_panic() => {
                let payload = join_err.into_panic();
                error!(
                    parent: &span,
                    operation = %self.operation_name,
                    panic = panic_message(&*payload),
                    "recovered from panic in scheduled execution"
                );
            }
            Err(join_err) => error!(
                parent: &span,
                operation = %self.operation_name,
                error = %join_err,
                "scheduled execution was aborted"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    use crate::shutdown::ShutdownCoordinator;

    const PERIOD: Duration = Duration::from_secs(10);

    fn counting_scheduler(
        counter: Arc<AtomicUsize>,
    ) -> Scheduler<impl Fn(OperationContext) -> std::future::Ready<Result<(), anyhow::Error>> + Send + Sync + 'static>
    {
        Scheduler::new("counting", move |_ctx: OperationContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(()))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn first_execution_waits_one_full_period() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let handle = coordinator.new_handle("counting job").unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = counting_scheduler(counter.clone());
        let job = tokio::spawn(async move { scheduler.run_periodically(handle, PERIOD).await });

        sleep(Duration::from_millis(9_500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0, "executed before the first period elapsed");

        sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        sleep(PERIOD).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        sleep(PERIOD * 3).await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);

        coordinator.cancel().await;
        job.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_tick_does_not_stop_the_schedule() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let handle = coordinator.new_handle("panicking job").unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = counter.clone();
        let scheduler = Scheduler::new("panicking", move |_ctx: OperationContext| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    panic!("first tick blows up");
                }
                Ok::<(), anyhow::Error>(())
            }
        });
        let job = tokio::spawn(async move { scheduler.run_periodically(handle, PERIOD).await });

        sleep(PERIOD * 2 + Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2, "second tick should still run");

        coordinator.cancel().await;
        // The panic must not have reached the task driving the schedule.
        job.await.expect("scheduler task must not propagate the panic");
    }

    #[tokio::test(start_paused = true)]
    async fn failing_tick_does_not_stop_the_schedule() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let handle = coordinator.new_handle("failing job").unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = counter.clone();
        let scheduler = Scheduler::new("failing", move |_ctx: OperationContext| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err::<(), _>(anyhow::anyhow!("database unavailable")))
        });
        let job = tokio::spawn(async move { scheduler.run_periodically(handle, PERIOD).await });

        sleep(PERIOD * 3 + Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        coordinator.cancel().await;
        job.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_and_notifies_on_shutdown() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let handle = coordinator.new_handle("counting job").unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = counting_scheduler(counter.clone());
        let observed = handle.clone();
        let job = tokio::spawn(async move { scheduler.run_periodically(handle, PERIOD).await });

        sleep(PERIOD + Duration::from_millis(500)).await;
        let started = Instant::now();
        coordinator.cancel().await;
        assert!(started.elapsed() < Duration::from_secs(1), "scheduler did not notify promptly");

        job.await.unwrap();
        assert!(observed.has_notified());

        sleep(PERIOD * 5).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1, "no executions after shutdown");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_executions_never_overlap() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(60));
        let handle = coordinator.new_handle("slow job").unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let (r, m, c) = (running.clone(), max_running.clone(), completed.clone());
        let scheduler = Scheduler::new("slow", move |_ctx: OperationContext| {
            let (r, m, c) = (r.clone(), m.clone(), c.clone());
            async move {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                sleep(PERIOD + PERIOD / 2).await;
                r.fetch_sub(1, Ordering::SeqCst);
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<(), anyhow::Error>(())
            }
        });
        let job = tokio::spawn(async move { scheduler.run_periodically(handle, PERIOD).await });

        sleep(PERIOD * 6).await;
        coordinator.cancel().await;
        job.await.unwrap();

        assert_eq!(max_running.load(Ordering::SeqCst), 1);
        assert!(completed.load(Ordering::SeqCst) >= 3, "slow ticks were delayed, not dropped");
    }

    #[tokio::test]
    async fn zero_period_is_rejected() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let handle = coordinator.new_handle("misconfigured job").unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = counting_scheduler(counter.clone());

        scheduler.run_periodically(handle.clone(), Duration::ZERO).await;

        assert!(handle.has_notified());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn every_tick_gets_a_named_context() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let handle = coordinator.new_handle("ctx job").unwrap();
        let seen = Arc::new(std::sync::Mutex::new(Vec::<OperationContext>::new()));
        let sink = seen.clone();
        let scheduler = Scheduler::new("stale mailing entry cleanup", move |ctx: OperationContext| {
            sink.lock().unwrap().push(ctx);
            std::future::ready(Ok::<(), anyhow::Error>(()))
        });

        let period = Duration::from_secs(1);
        let job = tokio::spawn(async move { scheduler.run_periodically(handle, period).await });
        sleep(period * 3 + Duration::from_millis(500)).await;
        coordinator.cancel().await;
        job.await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|c| c.operation_name() == Some("stale mailing entry cleanup")));
        assert_ne!(seen[0].operation_id(), seen[1].operation_id());
    }
}
