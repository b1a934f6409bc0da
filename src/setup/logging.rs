use colored::Colorize;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::io::Write;

/// Sets up the logging configuration for the application.
///
/// Configures the logger to use colored output based on the log level and
/// writes to stderr, leaving stdout to responses. `RUST_LOG` overrides
/// `default_log_level`.
pub fn setup_log(default_log_level: LevelFilter) {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            let l = record.level();
            let colored_level = match l {
                log::Level::Error => l.to_string().red().bold(),
                log::Level::Warn => l.to_string().yellow().bold(),
                log::Level::Info => l.to_string().green().bold(),
                log::Level::Debug => l.to_string().blue().bold(),
                log::Level::Trace => l.to_string().purple().bold(),
            };
            writeln!(
                buf,
                "{} {} {}",
                colored_level,
                record.target().dimmed(),
                record.args()
            )
        })
        .target(Target::Stderr)
        .filter(None, default_log_level)
        .parse_default_env();

    // A second initialisation (e.g. from tests) keeps the first logger
    let _ = builder.try_init();
}

/// Maps `-v` repetitions onto a level, starting from `Info`
#[must_use]
pub const fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
