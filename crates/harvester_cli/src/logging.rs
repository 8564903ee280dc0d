//! Logger setup for the command line front end.
//!
//! Terminal output is always on; a timestamped `harvest_<time>.log` is added
//! under the output directory when file logging is requested.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

pub fn initialize(verbose: bool, log_dir: Option<&Path>) -> Option<PathBuf> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    let log_path = log_dir.and_then(|dir| {
        let path = dir.join(log_filename());
        match File::create(&path) {
            Ok(file) => {
                loggers.push(WriteLogger::new(level, config, file));
                Some(path)
            }
            Err(err) => {
                eprintln!("Warning: could not create log file at {:?}: {}", path, err);
                None
            }
        }
    });

    let _ = CombinedLogger::init(loggers);
    log_path
}

fn log_filename() -> String {
    format!("harvest_{}.log", Local::now().format("%Y%m%d_%H%M%S"))
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        // The HTTP stack is chatty at debug level.
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("rustls")
        .add_filter_ignore_str("reqwest")
        .build()
}
