use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Ten minutes.
pub const DEFAULT_OTP_TTL: Duration = Duration::from_secs(10 * 60);

/// Wrong guesses allowed before a code is discarded.
const MAX_ATTEMPTS: u32 = 5;

/// Result of checking a submitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    /// Code matched and has been consumed.
    Verified,
    /// Code did not match; the stored code remains usable.
    Mismatch,
    /// No live code for this key (never issued, expired, consumed or burned).
    Missing,
}

struct Entry {
    code: String,
    expires_at: Instant,
    attempts: u32,
}

/// In-process TTL cache for one-time codes, keyed by normalized email.
///
/// Created once at startup and shared through `AppState`; a background task
/// started with [`OtpCache::spawn_sweeper`] drops expired entries.
#[derive(Clone)]
pub struct OtpCache {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl Default for OtpCache {
    fn default() -> Self {
        Self::new(DEFAULT_OTP_TTL)
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

impl OtpCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `value` under `key` for `ttl`, replacing any previous code.
    pub fn put(&self, key: &str, value: impl Into<String>, ttl: Duration) {
        self.entries().insert(
            normalize(key),
            Entry {
                code: value.into(),
                expires_at: Instant::now() + ttl,
                attempts: 0,
            },
        );
    }

    /// Generate a fresh 6-digit code for `key` with the default TTL.
    pub fn issue(&self, key: &str) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        self.put(key, code.clone(), self.ttl);
        code
    }

    /// Check `code` against the live value for `key`, consuming it on success.
    pub fn verify(&self, key: &str, code: &str) -> OtpCheck {
        let key = normalize(key);
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(&key) else {
            return OtpCheck::Missing;
        };
        if Instant::now() >= entry.expires_at {
            entries.remove(&key);
            return OtpCheck::Missing;
        }
        if entry.code == code.trim() {
            entries.remove(&key);
            return OtpCheck::Verified;
        }
        entry.attempts += 1;
        if entry.attempts >= MAX_ATTEMPTS {
            entries.remove(&key);
        }
        OtpCheck::Mismatch
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    /// Run [`OtpCache::sweep`] every `interval` for the life of the process.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired one-time codes");
                }
            }
        })
    }
}
