use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Logger, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use std::path::PathBuf;

// Pattern: https://docs.rs/log4rs/*/log4rs/encode/pattern/index.html
const FILE_PATTERN: &str = "{d(%+)(utc)} [{f}:{L}] {h({l})} -> {m}{n}";
const CONSOLE_PATTERN: &str = "{d(%H:%M:%S)} {h({l})} {m}{n}";

/// Log file of one run: `<recoder_home>/<name>/<data_set>-<timestamp>.log`.
pub fn log_file_path(learner: &crate::core::Learner) -> anyhow::Result<PathBuf> {
    let dir = PathBuf::from(&learner.recoder_home).join(&learner.name);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    Ok(dir.join(format!("{:?}-{stamp}.log", learner.data_set).to_lowercase()))
}

/// Everything down to trace goes to the run's log file; stderr shows info,
/// or debug with `--verbose`. Image decoder crates are capped at warn.
pub fn build_log_config(learner: &crate::core::Learner) -> anyhow::Result<log4rs::Config> {
    let console_level = if learner.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();

    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
        .build(log_file_path(learner)?)?;

    let config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(console_level)))
                .build("stderr", Box::new(stderr)),
        )
        .logger(Logger::builder().build("png", log::LevelFilter::Warn))
        .logger(Logger::builder().build("tiff", log::LevelFilter::Warn))
        .build(
            Root::builder()
                .appender("logfile")
                .appender("stderr")
                .build(log::LevelFilter::Trace),
        )
        .map_err(|e| anyhow::anyhow!("invalid log config: {e}"))?;

    Ok(config)
}
