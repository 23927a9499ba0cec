use std::time::SystemTime;

use log::LevelFilter;

/// Sets up the global logger, writing timestamped lines to stdout.
/// Safe to call more than once; only the first call takes effect
pub fn init_logging() {
    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {message}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                record.level(),
                record.target()
            ))
        })
        .level(LevelFilter::Info)
        .chain(std::io::stdout())
        .apply();
    if result.is_err() {
        log::warn!("Attempted to initialize the logger twice");
    }
}

#[cfg(test)]
mod init_logging_tests {
    use super::init_logging;

    #[test]
    fn repeated_initialization_does_not_panic() {
        init_logging();
        init_logging();
    }
}
