//! Logging initialization

use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

/// Initialize the global logger at the given level
///
/// Safe to call more than once: later calls leave the first logger in
/// place and return `false`.
pub fn init_logging(level: LevelFilter) -> bool {
    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()
        .is_ok()
}
