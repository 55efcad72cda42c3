use clap::Args;
use flowqueue::DEFAULT_QUEUE;
use std::time::Duration;

/// Worker pool settings
#[derive(Debug, Clone, Args)]
pub struct WorkerConfig {
    /// Number of concurrent workers
    #[arg(long, env = "FLOW_WORKERS", default_value_t = 1)]
    pub workers: usize,

    /// Queue to consume tasks from
    #[arg(long, env = "FLOW_QUEUE", default_value = DEFAULT_QUEUE)]
    pub queue: String,

    /// How long one dequeue waits for a task
    #[arg(long, env = "FLOW_POLL_INTERVAL", default_value = "5s", value_parser = parse_duration)]
    pub poll_interval: Duration,

    /// Wall-clock budget for one run
    #[arg(long, env = "FLOW_EXECUTION_TIMEOUT", default_value = "30m", value_parser = parse_duration)]
    pub execution_timeout: Duration,

    /// How long shutdown waits for in-flight runs before cancelling them
    #[arg(long, env = "FLOW_SHUTDOWN_GRACE", default_value = "10s", value_parser = parse_duration)]
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            queue: DEFAULT_QUEUE.to_string(),
            poll_interval: Duration::from_secs(5),
            execution_timeout: Duration::from_secs(30 * 60),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Parse durations such as `500ms`, `5s`, `30m` or `1h30m`.
///
/// A bare number is read as seconds.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = text.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|e| e.to_string());
    }

    let mut nanos: u128 = 0;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {:?}", text))?;
        if digits == 0 {
            return Err(format!("invalid duration {:?}", text));
        }
        let amount = &rest[..digits];
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit: u64 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3600 * 1_000_000_000,
            other => return Err(format!("unknown unit {:?} in duration {:?}", other, text)),
        };
        rest = &rest[unit_len..];

        nanos += match amount.parse::<u64>() {
            Ok(whole) => u128::from(whole) * u128::from(unit),
            Err(_) => {
                let fraction: f64 = amount
                    .parse()
                    .map_err(|_| format!("invalid number in duration {:?}", text))?;
                (fraction * unit as f64) as u128
            }
        };
    }

    u64::try_from(nanos)
        .map(Duration::from_nanos)
        .map_err(|_| format!("duration {:?} is too large", text))
}
