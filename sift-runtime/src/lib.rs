use anyhow::Result;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct SiftHandle {
    inner: Handle,
    cancel: Arc<CancellationToken>,
}

pub struct SiftRuntime {
    runtime: Runtime,
    cancel: Arc<CancellationToken>,
}

impl SiftRuntime {
    /// Build a multi-threaded Tokio runtime for the `sift` binary.
    ///
    /// ```
    /// use sift_runtime::SiftRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = SiftRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        let cancel = Arc::new(CancellationToken::new());
        Ok(Self { runtime, cancel })
    }

    /// Obtain a cloned handle for spawning tasks and sharing cancellation.
    ///
    /// ```
    /// use sift_runtime::SiftRuntime;
    ///
    /// let runtime = SiftRuntime::build("handle-example", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// assert!(!handle.cancellation().is_cancelled());
    /// ```
    pub fn handle(&self) -> SiftHandle {
        SiftHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel outstanding work and shut the runtime down gracefully.
    pub fn shutdown(self, graceful: std::time::Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl SiftHandle {
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    pub fn cancellation(&self) -> Arc<CancellationToken> {
        self.cancel.clone()
    }

    /// Cancel the shared token on the first Ctrl-C. The returned task ends
    /// quietly if the token is cancelled some other way first.
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        self.inner.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => tracing::warn!("runtime.ctrl_c"),
                        Err(e) => tracing::error!(error = %e, "runtime.ctrl_c.listen_failed"),
                    }
                    cancel.cancel();
                }
            }
        })
    }
}
