use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// Above this many tracked clients every call sweeps idle entries.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct Hits {
    clients: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

impl Hits {
    // drop clients with no hit inside the window
    fn sweep(&mut self, now: Instant, window: Duration) {
        self.clients.retain(|_, hits| {
            hits.back()
                .is_some_and(|&newest| now.duration_since(newest) < window)
        });
        self.last_sweep = now;
    }
}

/// Sliding-window request limiter keyed by client address.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    limit: usize,
    hits: Arc<Mutex<Hits>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            window,
            limit,
            hits: Arc::new(Mutex::new(Hits {
                clients: HashMap::new(),
                last_sweep: Instant::now(),
            })),
        }
    }

    pub fn per_minute(limit: usize) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    // Records a hit for `client` and reports whether it is within the limit.
    pub async fn allow(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().await;
        if now.duration_since(hits.last_sweep) >= self.window
            || hits.clients.len() >= SWEEP_THRESHOLD
        {
            hits.sweep(now, self.window);
        }

        let window = hits.clients.entry(client.to_string()).or_default();
        // purge old
        while let Some(&oldest) = window.front() {
            if now.duration_since(oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }
        let allowed = window.len() < self.limit;
        if allowed {
            window.push_back(now);
        }
        if window.is_empty() {
            hits.clients.remove(client);
        }
        allowed
    }
}
