use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Session log written next to the working directory
pub const LOG_FILE: &str = "terrain3d.log";

/// Initialize console and file logging plus a panic hook that logs.
///
/// The log file is recreated on every start. If it cannot be created only
/// the console layer is installed. Calling this twice is harmless; the
/// second subscriber is rejected.
pub fn init_logging() {
    init_logging_to(Path::new(LOG_FILE));
}

pub fn init_logging_to(log_path: &Path) {
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let enable_backtrace = env::var("RUST_BACKTRACE").unwrap_or_else(|_| "0".to_string()) == "1";

    // Remove existing log file if it exists
    if let Err(e) = fs::remove_file(log_path) {
        if e.kind() != io::ErrorKind::NotFound {
            eprintln!("Warning: Failed to remove existing {}: {}", log_path.display(), e);
        }
    }
    let log_file = match fs::File::create(log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to create {}: {}", log_path.display(), e);
            None
        }
    };
    let file_logging = log_file.is_some();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let filter = EnvFilter::new(&log_level);
        match "terrain3d=debug".parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        }
    });

    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false) // No ANSI codes in file
    });

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_ansi(true),
        )
        .with(file_layer)
        .try_init()
        .is_ok();
    if !installed {
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
    if file_logging {
        tracing::info!(
            "File logging enabled: {} (session-based, cleaned on startup)",
            log_path.display()
        );
    }
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
