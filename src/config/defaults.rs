// src/config/defaults.rs

/// Document written by [`crate::config::loader::load_or_init`] when no
/// schedule file exists yet.
pub const DEFAULT_CONFIG: &str = r#"# tickdag schedule
#
# Edit this file while tickdag is running; valid changes are picked up
# without a restart. Times are UTC.

[scheduler]
workers = 3
tick_interval_ms = 1000
poll_interval_secs = 5
state_dir = ".tickdag"
completion_retention_days = 7

[retry]
max_attempts = 3
base_delay_secs = 5
max_delay_secs = 300
jitter = true

[[job]]
id = "start_trading"
task = "log"
trigger = "cron"
cron = { hour = 9, minute = 0, second = 0 }
[job.payload]
message = "start trading"

[[job]]
id = "stop_trading"
task = "log"
trigger = "cron"
cron = { hour = 17, minute = 0, second = 0 }
[job.payload]
message = "stop trading"

[[job]]
id = "evaluate"
task = "log"
trigger = "interval"
interval = { minutes = 5 }
priority = 3
depends_on = ["start_trading"]
[job.payload]
message = "evaluate positions"

[[job]]
id = "report"
task = "log"
trigger = "interval"
interval = { hours = 1 }
[job.payload]
message = "hourly report"

[[job]]
id = "maintenance"
task = "log"
trigger = "cron"
cron = { hour = 23, minute = 0, second = 0 }
depends_on = ["stop_trading"]
[job.payload]
message = "nightly maintenance"

[[job]]
id = "health_check"
task = "log"
trigger = "interval"
interval = { minutes = 1 }
priority = 0
[job.payload]
message = "health check"
"#;
