use std::sync::Once;

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S %Z)(utc)} [{h({l})}] {M} - {m}{n}";

#[cfg(target_os = "android")]
const TAG: &str = "pmshim";

static INIT: Once = Once::new();

fn console_config(level: LevelFilter) -> anyhow::Result<Config> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let root = Root::builder().appender("stdout").build(level);
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(root)?;
    Ok(config)
}

/// Installs the global logger. Safe to call more than once; only the first
/// call has an effect.
pub fn init_logger() {
    INIT.call_once(|| {
        if let Err(e) = install(LevelFilter::Debug) {
            eprintln!("Failed to initialise logger: {e}");
        }
    });
}

#[cfg(not(target_os = "android"))]
fn install(level: LevelFilter) -> anyhow::Result<()> {
    log4rs::init_config(console_config(level)?)?;
    Ok(())
}

#[cfg(target_os = "android")]
fn install(level: LevelFilter) -> anyhow::Result<()> {
    let config = android_logger::Config::default()
        .with_max_level(level)
        .with_tag(TAG);

    let android_logger = android_logger::AndroidLogger::new(config);
    let log4rs = log4rs::Logger::new(console_config(level)?);

    multi_log::MultiLogger::init(
        vec![Box::new(android_logger), Box::new(log4rs)],
        log::Level::Debug,
    )?;
    Ok(())
}
