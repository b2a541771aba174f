use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Map the configured level name onto a tracing level directive
pub fn level_directive(log_level: &str) -> &'static str {
    match log_level.trim().to_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" | "FATAL" => "error",
        _ => "info",
    }
}

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(config: &AppConfig) -> String {
    let level = level_directive(&config.log_level);
    let mut directives = vec![
        level.to_string(),
        "hyper=warn".to_string(),
        "reqwest=warn".to_string(),
        "tower_http=warn".to_string(),
    ];

    if config.debug {
        directives.push("codex_rag=debug".to_string());
        directives.push("codex_cache=debug".to_string());
    }

    directives.join(",")
}

/// Install the global subscriber: stdout always, plus a file when `log_file` is set
pub fn init(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config)));

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(true);

    let file_layer = config.log_file.as_deref().map(|log_file| {
        let path = Path::new(log_file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app.log".to_string());
        let _ = std::fs::create_dir_all(dir);

        let file_appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);

        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
}
