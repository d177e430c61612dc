use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};

pub fn log_level_from_env() -> LevelFilter {
    let mut level_string = match std::env::var("LOG_LEVEL") {
        Err(_) => {
            return LevelFilter::Warn;
        }
        Ok(s) => s,
    };

    level_string.make_ascii_lowercase();
    parse_level(&level_string)
}

fn parse_level(s: &str) -> LevelFilter {
    match s {
        "max" => LevelFilter::max(),
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

/// Starts terminal logging on stderr; stdout belongs to the IPC protocol.
///
/// Calling this twice is harmless, the second call only notes that a logger
/// was already installed.
pub fn init() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("attendd")
        .build();
    let res = TermLogger::init(
        log_level_from_env(),
        log_cfg,
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );

    match res {
        Ok(_) => log::info!("Logging started."),
        Err(_) => log::debug!("Logging already started."),
    }
}
