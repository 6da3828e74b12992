use std::fs::File;
use std::path::Path;

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, TermLogger, TerminalMode, WriteLogger,
};

/// Terminal logging through `env_logger` (`RUST_LOG`, default `info`), or
/// terminal + full debug file when `log_file` is given.
pub fn init(log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = log_file else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_millis()
            .init();
        return Ok(());
    };
    let config = ConfigBuilder::new().set_thread_level(LevelFilter::Debug).build();
    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, config, File::create(path)?),
    ])?;
    Ok(())
}
