/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The agent contract and host loop.
//!
//! Each subsystem runs as a single-threaded agent invoked by a host loop:
//! `do_work` performs a bounded slice of work and returns promptly with a
//! work count. No blocking calls, no suspension points; long operations are
//! chunked across invocations. The idle strategy backs off (spin, then
//! yield, then park) when agents report no work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

/// A cooperatively scheduled unit of the gateway.
pub trait Agent: Send {
    /// Short stable name for logging and thread naming.
    fn role_name(&self) -> &'static str;

    /// Performs one bounded slice of work.
    ///
    /// # Returns
    /// The number of units of work performed; 0 lets the idle strategy
    /// back off.
    fn do_work(&mut self) -> usize;

    /// Invoked once when the host loop ends, for final drains and flushes.
    fn on_close(&mut self) {}
}

/// Spin, yield, then park backoff for idle agent loops.
#[derive(Debug)]
pub struct BackoffIdleStrategy {
    max_spins: u32,
    max_yields: u32,
    park_duration: Duration,
    spins: u32,
    yields: u32,
}

impl BackoffIdleStrategy {
    /// Creates a strategy with the given escalation bounds.
    #[must_use]
    pub fn new(max_spins: u32, max_yields: u32, park_duration: Duration) -> Self {
        Self {
            max_spins,
            max_yields,
            park_duration,
            spins: 0,
            yields: 0,
        }
    }

    /// Reacts to one `do_work` result.
    pub fn idle(&mut self, work_count: usize) {
        if work_count > 0 {
            self.reset();
            return;
        }
        if self.spins < self.max_spins {
            self.spins += 1;
            std::hint::spin_loop();
        } else if self.yields < self.max_yields {
            self.yields += 1;
            std::thread::yield_now();
        } else {
            std::thread::park_timeout(self.park_duration);
        }
    }

    /// Returns to the hot spinning state.
    pub fn reset(&mut self) {
        self.spins = 0;
        self.yields = 0;
    }
}

impl Default for BackoffIdleStrategy {
    fn default() -> Self {
        // Sessions must be polled at least every 100 ms; park well below.
        Self::new(64, 16, Duration::from_millis(10))
    }
}

/// Hosts a fixed set of agents, one OS thread each.
#[derive(Debug)]
pub struct AgentRunner {
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl AgentRunner {
    /// Starts every agent on its own named thread.
    #[must_use]
    pub fn start(agents: Vec<Box<dyn Agent>>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let handles = agents
            .into_iter()
            .map(|mut agent| {
                let running = running.clone();
                std::thread::Builder::new()
                    .name(format!("quorumfix-{}", agent.role_name()))
                    .spawn(move || {
                        let mut idle = BackoffIdleStrategy::default();
                        info!(agent = agent.role_name(), "agent started");
                        while running.load(Ordering::Acquire) {
                            let work = agent.do_work();
                            idle.idle(work);
                        }
                        agent.on_close();
                        debug!(agent = agent.role_name(), "agent closed");
                    })
                    .expect("agent thread spawn")
            })
            .collect();

        Self { running, handles }
    }

    /// Signals every agent loop to finish and joins the threads.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Release);
        for handle in self.handles.drain(..) {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for AgentRunner {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        for handle in self.handles.drain(..) {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingAgent {
        invocations: Arc<AtomicUsize>,
        limit: usize,
        closed: Arc<AtomicBool>,
    }

    impl Agent for CountingAgent {
        fn role_name(&self) -> &'static str {
            "counting"
        }

        fn do_work(&mut self) -> usize {
            let n = self.invocations.fetch_add(1, Ordering::SeqCst);
            usize::from(n < self.limit)
        }

        fn on_close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_runner_drives_agent_and_closes() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        let runner = AgentRunner::start(vec![Box::new(CountingAgent {
            invocations: invocations.clone(),
            limit: 10,
            closed: closed.clone(),
        })]);

        while invocations.load(Ordering::SeqCst) < 10 {
            std::thread::yield_now();
        }
        runner.stop();

        assert!(closed.load(Ordering::SeqCst));
        assert!(invocations.load(Ordering::SeqCst) >= 10);
    }

    #[test]
    fn test_idle_strategy_escalates_and_resets() {
        let mut idle = BackoffIdleStrategy::new(2, 2, Duration::from_millis(1));
        for _ in 0..5 {
            idle.idle(0);
        }
        // After work arrives the strategy is hot again.
        idle.idle(3);
        assert_eq!(idle.spins, 0);
        assert_eq!(idle.yields, 0);
    }
}
