//! Console logging: one colour-coded prefix per level, debug only when verbose

use std::io::Write;

use log::{Level, LevelFilter};

/// Colour-coded prefix printed in front of every record of `level`
pub fn level_prefix(level: Level) -> &'static str {
    match level {
        Level::Trace | Level::Debug => "[\x1b[90mDEBUG\x1B[0m]",
        Level::Info => "[\x1B[32mINFO\x1B[0m]",
        Level::Warn => "[\x1B[33mWARN\x1B[0m]",
        Level::Error => "[\x1B[31mERROR\x1B[0m]",
    }
}

pub fn level_filter(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Install the global logger. Calling it twice keeps the first logger.
pub fn init(verbose: bool) {
    let _ = env_logger::Builder::new()
        .filter_level(level_filter(verbose))
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            writeln!(buf, "{} {}", level_prefix(record.level()), record.args())
        })
        .try_init();
}
