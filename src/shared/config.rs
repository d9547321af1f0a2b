use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub debounce: DebounceConfig,
    pub remote: RemoteConfig,
    pub tasks: TaskLogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Quiet period between the last edit and the persist, in milliseconds.
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Upper bound on a single fetch/insert/update call, in milliseconds.
    /// Zero disables the timeout.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogConfig {
    pub capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DebounceConfig {
                delay_ms: 1500, // 1.5 seconds
            },
            remote: RemoteConfig {
                timeout_ms: 10_000, // 10 seconds
            },
            tasks: TaskLogConfig { capacity: 64 },
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("FIELDSYNC_DEBOUNCE_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.debounce.delay_ms = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("FIELDSYNC_REMOTE_TIMEOUT_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.remote.timeout_ms = value;
            }
        }
        if let Ok(v) = std::env::var("FIELDSYNC_TASK_LOG_CAPACITY") {
            if let Some(value) = parse_usize(&v) {
                cfg.tasks.capacity = value.max(1);
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.debounce.delay_ms == 0 {
            return Err("Debounce delay_ms must be greater than 0".to_string());
        }
        if self.tasks.capacity == 0 {
            return Err("Task log capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_usize(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok()
}
