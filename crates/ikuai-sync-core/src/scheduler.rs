//! Cron scheduler
//!
//! Every job gets its own timer task. When a job's cron expression fires,
//! the run is spawned as a separate task, so a slow run never delays the
//! next tick and runs of different jobs never wait on each other.
//!
//! Cron expressions may use the classic 5-field form (minute first) or the
//! 6/7-field form with a leading seconds field. Expressions are evaluated
//! in the configured timezone.
//!
//! Numeric weekdays follow the form in use: the 5-field form counts like
//! crontab (`0` and `7` are Sunday, `1` is Monday), the 6/7-field form
//! counts like the `cron` crate (`1` is Sunday, `7` is Saturday).

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::engine::{SyncEngine, SyncOutcome};
use crate::error::{Error, Result};
use crate::job::SyncJob;

/// Parse a cron expression
///
/// 5-field expressions get a `0` seconds field prepended and their numeric
/// weekdays translated from crontab numbering.
///
/// ```
/// use ikuai_sync_core::scheduler::parse_schedule;
///
/// assert!(parse_schedule("0 */6 * * *").is_ok());
/// assert!(parse_schedule("30 0 */6 * * *").is_ok());
/// assert!(parse_schedule("every hour").is_err());
/// ```
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    let fields = expr.split_whitespace().count();
    let normalized = match fields {
        5 => {
            let mut parts: Vec<String> = expr.split_whitespace().map(str::to_string).collect();
            parts[4] = crontab_weekdays(&parts[4])?;
            format!("0 {}", parts.join(" "))
        }
        6 | 7 => expr.trim().to_string(),
        _ => {
            return Err(Error::config(format!(
                "Cron expression must have 5, 6 or 7 fields, got {}: '{}'",
                fields, expr
            )));
        }
    };

    Schedule::from_str(&normalized)
        .map_err(|e| Error::config(format!("Invalid cron expression '{}': {}", expr, e)))
}

/// Translate a crontab day-of-week field (`0`-`7`, Sunday is `0` and `7`)
/// into `cron` crate numbering (`1`-`7`, Sunday is `1`)
///
/// Numeric ranges and steps are expanded into an explicit list so that a
/// range reaching Sunday (`7`) does not wrap. Wildcards and day names are
/// left as written.
fn crontab_weekdays(field: &str) -> Result<String> {
    let mut items = Vec::new();

    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (item, None),
        };

        if matches!(range, "*" | "?") || range.chars().any(|c| c.is_ascii_alphabetic()) {
            items.push(item.to_string());
            continue;
        }

        let invalid = || Error::config(format!("Invalid day of week '{}'", item));
        let day = |s: &str| s.parse::<u32>().ok().filter(|d| *d <= 7).ok_or_else(invalid);

        let (first, last) = match range.split_once('-') {
            Some((first, last)) => (day(first)?, day(last)?),
            None if step.is_some() => (day(range)?, 7),
            None => (day(range)?, day(range)?),
        };
        let step = match step {
            Some(step) => step.parse::<usize>().ok().filter(|s| *s > 0).ok_or_else(invalid)?,
            None => 1,
        };
        if first > last {
            return Err(invalid());
        }

        let days: BTreeSet<u32> = (first..=last).step_by(step).map(|d| d % 7 + 1).collect();
        items.extend(days.iter().map(u32::to_string));
    }

    Ok(items.join(","))
}

/// Timer-driven job runner
pub struct Scheduler {
    engine: SyncEngine,
    timezone: Tz,
    skip_start: bool,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(engine: SyncEngine, config: &SchedulerConfig) -> Result<Self> {
        Ok(Self {
            engine,
            timezone: config.timezone()?,
            skip_start: config.skip_start,
        })
    }

    /// Schedule `jobs` until `shutdown` fires
    ///
    /// Jobs with an invalid cron expression are logged and left out. If no
    /// job can be scheduled a configuration error is returned.
    ///
    /// In-flight runs are not awaited on shutdown.
    pub async fn run(&self, jobs: Vec<SyncJob>, shutdown: oneshot::Receiver<()>) -> Result<()> {
        let mut timers = JoinSet::new();

        for job in jobs {
            let schedule = match parse_schedule(job.schedule()) {
                Ok(schedule) => schedule,
                Err(e) => {
                    warn!("[{}] not scheduled: {}", job.tag(), e);
                    continue;
                }
            };

            info!("[{}] scheduled with '{}'", job.tag(), job.schedule());
            timers.spawn(drive(
                self.engine.clone(),
                Arc::new(job),
                schedule,
                self.timezone,
                self.skip_start,
            ));
        }

        if timers.is_empty() {
            return Err(Error::config("No job could be scheduled"));
        }

        info!(
            "Scheduler started with {} job(s) (timezone: {}, skip start: {})",
            timers.len(),
            self.timezone,
            self.skip_start
        );

        tokio::select! {
            _ = shutdown => {
                info!("Shutdown signal received, stopping scheduler");
            }
            _ = async { while timers.join_next().await.is_some() {} } => {
                info!("No upcoming runs left, stopping scheduler");
            }
        }

        timers.abort_all();
        Ok(())
    }
}

/// Timer loop of one job
async fn drive(
    engine: SyncEngine,
    job: Arc<SyncJob>,
    schedule: Schedule,
    tz: Tz,
    skip_start: bool,
) {
    if !skip_start {
        spawn_run(engine.clone(), Arc::clone(&job));
    }

    let mut cursor = Utc::now().with_timezone(&tz);
    loop {
        let Some(next) = schedule.after(&cursor).next() else {
            info!("[{}] no upcoming run", job.tag());
            return;
        };

        let wait = (next - Utc::now().with_timezone(&tz))
            .to_std()
            .unwrap_or_default();
        tokio::time::sleep(wait).await;

        spawn_run(engine.clone(), Arc::clone(&job));
        cursor = next;
    }
}

/// Run a job in its own task, logging the outcome
fn spawn_run(engine: SyncEngine, job: Arc<SyncJob>) {
    tokio::spawn(async move {
        match engine.run(&job).await {
            Ok(SyncOutcome::Synced(report)) => {
                info!(
                    "[{}] run finished: {} unique rows, duration: {:?}",
                    job.tag(),
                    report.unique_rows,
                    report.duration
                );
            }
            Ok(SyncOutcome::Skipped { failed_urls, .. }) => {
                info!(
                    "[{}] run skipped ({} of {} URLs failed)",
                    job.tag(),
                    failed_urls,
                    job.urls().len()
                );
            }
            Err(e) => {
                error!("Run failed: {}", e);
            }
        }
    });
}
