//! Ordered start and stop of the process components.
//!
//! Hooks are started by ascending priority, hooks with the same priority in registration order.
//! Stopping happens in reverse.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error};

#[async_trait]
pub trait Hook: Send {
    fn name(&self) -> &str;

    /// Lower priorities are started earlier and stopped later
    fn priority(&self) -> i32 {
        return 0;
    }

    async fn start(&mut self) -> Result<()>;

    async fn stop(&mut self) -> Result<()>;
}

#[derive(Default)]
pub struct Lifecycle {
    hooks: Vec<Box<dyn Hook>>,

    /// Number of hooks in `hooks` that have been started
    started: usize,
}

impl Lifecycle {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn register(&mut self, hook: impl Hook + 'static) -> &mut Self {
        self.hooks.push(Box::new(hook));
        return self;
    }

    /// Starts all hooks.
    ///
    /// If a hook fails to start, all hooks started before are stopped again and the error is
    /// returned.
    pub async fn start(&mut self) -> Result<()> {
        if self.started == 0 {
            self.hooks.sort_by_key(|hook| hook.priority());
        }

        while self.started < self.hooks.len() {
            let hook = &mut self.hooks[self.started];
            debug!("Starting {} (priority {})", hook.name(), hook.priority());

            if let Err(err) = hook.start().await {
                let err = err.context(format!("Failed to start {}", hook.name()));

                if let Err(stop_err) = self.stop().await {
                    error!("Failed to stop after failed start: {:#}", stop_err);
                }

                return Err(err);
            }

            self.started += 1;
        }

        return Ok(());
    }

    /// Stops all started hooks.
    ///
    /// Every hook is stopped even if stopping another one failed. The first error is returned.
    pub async fn stop(&mut self) -> Result<()> {
        let mut result = Ok(());

        while self.started > 0 {
            self.started -= 1;

            let hook = &mut self.hooks[self.started];
            debug!("Stopping {}", hook.name());

            if let Err(err) = hook.stop().await {
                error!("Failed to stop {}: {:#}", hook.name(), err);
                if result.is_ok() {
                    result = Err(err.context(format!("Failed to stop {}", hook.name())));
                }
            }
        }

        return result;
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;

    use super::*;

    struct Recording {
        name: &'static str,
        priority: i32,
        fail_start: bool,
        fail_stop: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recording {
        fn new(name: &'static str, priority: i32, log: &Arc<Mutex<Vec<String>>>) -> Self {
            return Self {
                name,
                priority,
                fail_start: false,
                fail_stop: false,
                log: log.clone(),
            };
        }
    }

    #[async_trait]
    impl Hook for Recording {
        fn name(&self) -> &str {
            return self.name;
        }

        fn priority(&self) -> i32 {
            return self.priority;
        }

        async fn start(&mut self) -> Result<()> {
            if self.fail_start {
                return Err(anyhow!("{} refused to start", self.name));
            }

            self.log.lock().unwrap().push(format!("start {}", self.name));
            return Ok(());
        }

        async fn stop(&mut self) -> Result<()> {
            self.log.lock().unwrap().push(format!("stop {}", self.name));

            if self.fail_stop {
                return Err(anyhow!("{} refused to stop", self.name));
            }
            return Ok(());
        }
    }

    #[tokio::test]
    async fn test_order() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut lifecycle = Lifecycle::new();
        lifecycle
            .register(Recording::new("late", 100, &log))
            .register(Recording::new("early", 10, &log))
            .register(Recording::new("also-late", 100, &log))
            .register(Recording::new("default", 0, &log));

        lifecycle.start().await.unwrap();
        lifecycle.stop().await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec![
            "start default",
            "start early",
            "start late",
            "start also-late",
            "stop also-late",
            "stop late",
            "stop early",
            "stop default",
        ]);
    }

    #[tokio::test]
    async fn test_failed_start_stops_started_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut failing = Recording::new("failing", 2, &log);
        failing.fail_start = true;

        let mut lifecycle = Lifecycle::new();
        lifecycle
            .register(Recording::new("first", 1, &log))
            .register(failing)
            .register(Recording::new("never", 3, &log));

        let err = lifecycle.start().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to start failing");
        assert_eq!(err.root_cause().to_string(), "failing refused to start");

        assert_eq!(*log.lock().unwrap(), vec![
            "start first",
            "stop first",
        ]);

        // Nothing left to stop
        lifecycle.stop().await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_stop_stops_remaining_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut failing = Recording::new("failing", 2, &log);
        failing.fail_stop = true;

        let mut lifecycle = Lifecycle::new();
        lifecycle
            .register(Recording::new("first", 1, &log))
            .register(failing);

        lifecycle.start().await.unwrap();

        let err = lifecycle.stop().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to stop failing");

        assert_eq!(*log.lock().unwrap(), vec![
            "start first",
            "start failing",
            "stop failing",
            "stop first",
        ]);
    }
}
