use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};
use std::env;
use std::fs;
use std::io;

const LOG_FILE: &str = "log.txt";

fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(log_level);
        if let Ok(directive) = "vworld_rust=debug".parse() {
            filter = filter.add_directive(directive);
        }
        // Connection pool chatter from asset fetches
        for noisy in ["hyper_util=info", "reqwest=info"] {
            if let Ok(directive) = noisy.parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    })
}

/// Initialize logging: console plus a session log file
pub fn init_logging() {
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let enable_backtrace = env::var("RUST_BACKTRACE").unwrap_or_else(|_| "0".to_string()) == "1";

    // Remove existing log.txt file if it exists
    if let Err(e) = fs::remove_file(LOG_FILE) {
        if e.kind() != io::ErrorKind::NotFound {
            eprintln!("Warning: Failed to remove existing {}: {}", LOG_FILE, e);
        }
    }

    let file_layer = match fs::File::create(LOG_FILE) {
        Ok(log_file) => Some(
            fmt::layer()
                .with_writer(log_file)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .boxed(),
        ),
        Err(e) => {
            eprintln!("Warning: Failed to create {}, logging to console only: {}", LOG_FILE, e);
            None
        }
    };
    let file_logging = file_layer.is_some();

    let subscriber = tracing_subscriber::registry()
        .with(build_filter(&log_level))
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_ansi(true),
        )
        .with(file_layer);

    if let Err(e) = subscriber.try_init() {
        eprintln!("Warning: logging already initialized: {}", e);
        return;
    }

    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("Panic occurred: {}", panic_info);

        if let Some(location) = panic_info.location() {
            tracing::error!(
                "Panic location: {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }

        if enable_backtrace {
            tracing::error!("Backtrace:\n{:?}", std::backtrace::Backtrace::capture());
        }
    }));

    tracing::info!("Logging initialized with level: {}", log_level);
    tracing::info!("File logging enabled: {}", file_logging);
    tracing::info!("Backtrace enabled: {}", enable_backtrace);
}

/// Log system information for debugging
pub fn log_system_info() {
    tracing::info!("=== System Information ===");
    tracing::info!("OS: {}", env::consts::OS);
    tracing::info!("Architecture: {}", env::consts::ARCH);
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("========================");
}
