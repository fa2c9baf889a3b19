use super::Engine;

use std::thread;

/// Builder for configuring and creating an [`Engine`].
///
/// # Examples
///
/// ```rust,ignore
/// let engine = EngineBuilder::new()
///     .worker_threads(4)
///     .thread_name("planner")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    /// Number of worker threads.
    worker_threads: usize,

    /// Prefix of every thread the engine spawns.
    thread_name: String,
}

impl EngineBuilder {
    /// Creates a builder with default configuration.
    ///
    /// By default, the number of worker threads is the number of available
    /// logical CPUs, falling back to `1` if unavailable.
    pub fn new() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            worker_threads,
            thread_name: "strand-worker".to_string(),
        }
    }

    /// Sets the number of worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.worker_threads = n;
        self
    }

    /// Sets the name prefix of the engine's threads.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Builds the engine, starting its worker and timer threads.
    pub fn build(self) -> Engine {
        Engine::new(self.worker_threads, self.thread_name)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "worker_threads must be > 0")]
    fn zero_workers_is_rejected() {
        let _ = EngineBuilder::new().worker_threads(0);
    }

    #[test]
    fn builds_with_custom_configuration() {
        let engine = EngineBuilder::new()
            .worker_threads(2)
            .thread_name("custom")
            .build();

        assert!(!engine.is_shutdown());
        engine.shutdown();
        assert!(engine.is_shutdown());
    }
}
