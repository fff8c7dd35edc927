// # ikuai-syncd - iKuai List Sync Daemon
//
// This daemon is a THIN integration layer:
// - All sync logic lives in ikuai-sync-core
// - Configuration is via environment variables ONLY
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the HTTP fetcher, the router client and the sync engine
// 4. Running the scheduler until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Router
// - `IKUAI_ADDR`: Router base URL (default: http://192.168.1.1)
// - `IKUAI_USERNAME`: Login user (default: admin)
// - `IKUAI_PASSWORD`: Login password (default: admin)
//
// ### Jobs
// - `IKUAI_CRON_CUSTOM_ISP_<n>`: `cron|name|url1,url2,...|comment?`
// - `IKUAI_CRON_STREAM_DOMAIN_<n>`: `cron|iface1,iface2,...|url1,url2,...|srcAddr?|comment?`
// - `IKUAI_CRON_IP_GROUP_<n>`: `cron|name|url1,url2,...|comment?`
// - `IKUAI_CRON_SKIP_START`: `true` to wait for the first cron tick (default: false)
// - `TZ`: Timezone for cron evaluation (default: Asia/Shanghai)
//
// ### HTTP
// - `HTTP_TIMEOUT`: Per-request timeout, e.g. `30s`, `1m30s`, `500ms` (default: 30s)
// - `HTTP_INSECURE_SKIP_VERIFY`: `true` to accept invalid TLS certificates (default: false)
//
// ### Engine
// - `IKUAI_CHUNK_SIZE`: Entries per add request (default: 5000)
// - `IKUAI_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export IKUAI_ADDR=http://10.0.0.1
// export IKUAI_PASSWORD=secret
// export IKUAI_CRON_IP_GROUP_1='0 */6 * * *|cn|https://example.com/cn.txt|china'
// export IKUAI_CRON_STREAM_DOMAIN_1='30 4 * * *|wan2|https://example.com/proxy.txt'
//
// ikuai-syncd
// ```

use anyhow::{Context, Result};
use ikuai_sync_core::config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_DEVICE_ADDR, DEFAULT_TIMEZONE, DeviceConfig, EngineConfig,
    HttpConfig, SchedulerConfig,
};
use ikuai_sync_core::{JobSet, Scheduler, SyncConfig, SyncEngine};
use ikuai_sync_device::IkuaiClient;
use ikuai_sync_fetch::HttpListFetcher;
use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    sync: SyncConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_vars(utf8_vars(env::vars_os()))
    }

    /// Load configuration from key/value pairs
    ///
    /// A variable that is set is used as-is, even when empty.
    fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let var = |key: &str, default: &str| -> String {
            vars.get(key).cloned().unwrap_or_else(|| default.to_string())
        };
        let flag = |key: &str| vars.get(key).is_some_and(|v| v == "true");

        let timeout = humantime::parse_duration(var("HTTP_TIMEOUT", "30s").trim())
            .context("HTTP_TIMEOUT is not a valid duration")?;

        let chunk_size = var("IKUAI_CHUNK_SIZE", &DEFAULT_CHUNK_SIZE.to_string())
            .trim()
            .parse::<usize>()
            .context("IKUAI_CHUNK_SIZE must be a positive integer")?;

        let sync = SyncConfig {
            device: DeviceConfig {
                addr: var("IKUAI_ADDR", DEFAULT_DEVICE_ADDR),
                username: var("IKUAI_USERNAME", "admin"),
                password: var("IKUAI_PASSWORD", "admin"),
            },
            http: HttpConfig {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                insecure_skip_verify: flag("HTTP_INSECURE_SKIP_VERIFY"),
            },
            engine: EngineConfig { chunk_size },
            scheduler: SchedulerConfig {
                timezone: var("TZ", DEFAULT_TIMEZONE),
                skip_start: flag("IKUAI_CRON_SKIP_START"),
            },
            jobs: JobSet::from_vars(&vars),
        };

        Ok(Self {
            sync,
            log_level: var("IKUAI_LOG_LEVEL", "info"),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.sync.validate()?;

        if self.sync.jobs.is_empty() {
            anyhow::bail!(
                "No job configured. \
                Set at least one of IKUAI_CRON_CUSTOM_ISP_<n>, \
                IKUAI_CRON_STREAM_DOMAIN_<n> or IKUAI_CRON_IP_GROUP_<n>"
            );
        }

        self.level()?;
        Ok(())
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "IKUAI_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

/// Keep the variables whose name and value are both valid UTF-8
///
/// Unrelated variables with non-UTF-8 content are skipped rather than
/// aborting startup.
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return SyncExitCode::ConfigError.into();
    }

    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    info!("Starting ikuai-syncd daemon");
    info!(
        "Configuration loaded: {} job(s), router {}",
        config.sync.jobs.len(),
        config.sync.device.addr
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(config.sync).await {
            Ok(()) => SyncExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                exit_code_for(&e)
            }
        }
    });

    code.into()
}

/// Map a daemon failure to its exit code
fn exit_code_for(err: &anyhow::Error) -> SyncExitCode {
    match err.downcast_ref::<ikuai_sync_core::Error>() {
        Some(ikuai_sync_core::Error::Config(_)) => SyncExitCode::ConfigError,
        _ => SyncExitCode::RuntimeError,
    }
}

/// Run the daemon
async fn run_daemon(config: SyncConfig) -> Result<()> {
    let fetcher = HttpListFetcher::new(&config.http)?;
    let device = IkuaiClient::new(&config.device, &config.http)?;
    info!("Router client ready: {:?}", device);

    let engine = SyncEngine::new(Arc::new(fetcher), Arc::new(device), &config.engine)?;
    let scheduler = Scheduler::new(engine, &config.scheduler)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let jobs = config.jobs.into_jobs();
    let mut scheduler_task = tokio::spawn(async move { scheduler.run(jobs, shutdown_rx).await });

    tokio::select! {
        received = wait_for_shutdown() => {
            info!("Received shutdown signal: {}", received?);
            // The scheduler may already have stopped on its own
            let _ = shutdown_tx.send(());
            scheduler_task.await??;
        }
        result = &mut scheduler_task => {
            result??;
        }
    }

    info!("Shutting down daemon");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(vars(&[(
            "IKUAI_CRON_IP_GROUP_1",
            "0 * * * *|geo|http://x/list.txt",
        )]))
        .expect("defaults load");

        assert_eq!(config.sync.device.addr, "http://192.168.1.1");
        assert_eq!(config.sync.device.username, "admin");
        assert_eq!(config.sync.http.timeout_ms, 30_000);
        assert!(!config.sync.http.insecure_skip_verify);
        assert_eq!(config.sync.scheduler.timezone, "Asia/Shanghai");
        assert!(!config.sync.scheduler.skip_start);
        assert_eq!(config.sync.engine.chunk_size, 5000);
        assert_eq!(config.sync.jobs.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_booleans_require_literal_true() {
        let config = Config::from_vars(vars(&[
            ("IKUAI_CRON_SKIP_START", "TRUE"),
            ("HTTP_INSECURE_SKIP_VERIFY", "true"),
        ]))
        .expect("config loads");

        assert!(!config.sync.scheduler.skip_start);
        assert!(config.sync.http.insecure_skip_verify);
    }

    #[test]
    fn test_http_timeout_parsing() {
        let config = Config::from_vars(vars(&[("HTTP_TIMEOUT", "1m30s")])).expect("config loads");
        assert_eq!(config.sync.http.timeout_ms, 90_000);

        let config = Config::from_vars(vars(&[("HTTP_TIMEOUT", " 500ms ")])).expect("config loads");
        assert_eq!(config.sync.http.timeout_ms, 500);

        assert!(Config::from_vars(vars(&[("HTTP_TIMEOUT", "thirty")])).is_err());
        assert!(Config::from_vars(vars(&[("HTTP_TIMEOUT", "")])).is_err());
    }

    #[test]
    fn test_http_timeout_overflow_is_an_error() {
        let result = Config::from_vars(vars(&[("HTTP_TIMEOUT", "99999999999999999999999h")]));
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let env = vec![
            (OsString::from("IKUAI_ADDR"), OsString::from("http://10.0.0.1")),
            (OsString::from("GARBAGE"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from_vec(vec![0x80]), OsString::from("value")),
        ];

        let config = Config::from_vars(utf8_vars(env)).expect("config loads");
        assert_eq!(config.sync.device.addr, "http://10.0.0.1");
    }

    #[test]
    fn test_invalid_chunk_size() {
        assert!(Config::from_vars(vars(&[("IKUAI_CHUNK_SIZE", "-1")])).is_err());

        let config = Config::from_vars(vars(&[
            ("IKUAI_CHUNK_SIZE", "0"),
            ("IKUAI_CRON_IP_GROUP_1", "0 * * * *|geo|http://x/list.txt"),
        ]))
        .expect("config loads");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let job = ("IKUAI_CRON_IP_GROUP_1", "0 * * * *|geo|http://x/list.txt");

        for bad in [
            ("TZ", "Mars/Olympus"),
            ("IKUAI_LOG_LEVEL", "verbose"),
            ("IKUAI_ADDR", "192.168.1.1"),
            ("HTTP_TIMEOUT", "0s"),
        ] {
            let config = Config::from_vars(vars(&[job, bad])).expect("config loads");
            assert!(config.validate().is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_no_jobs_is_a_config_error() {
        let config = Config::from_vars(vars(&[("IKUAI_CRON_IP_GROUP_1", "0 * * * *|onlyname")]))
            .expect("config loads");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_password_not_exposed_in_debug() {
        let config = Config::from_vars(vars(&[("IKUAI_PASSWORD", "hunter2-secret")]))
            .expect("config loads");
        assert!(!format!("{:?}", config).contains("hunter2-secret"));
    }

    #[test]
    fn test_exit_codes() {
        let config_err = anyhow::Error::new(ikuai_sync_core::Error::config("no job"));
        let runtime_err = anyhow::anyhow!("join error");

        assert_eq!(exit_code_for(&config_err), SyncExitCode::ConfigError);
        assert_eq!(exit_code_for(&runtime_err), SyncExitCode::RuntimeError);
        assert_eq!(SyncExitCode::CleanShutdown as u8, 0);
    }
}
