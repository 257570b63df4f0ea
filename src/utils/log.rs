use colog::format::CologStyle;
use env_logger::Builder;
use log::{Level, LevelFilter};

struct CustomLevelTokens;

impl CologStyle for CustomLevelTokens {
    fn level_token(&self, level: &Level) -> &str {
        match *level {
            Level::Error => "ERR",
            Level::Warn => "WRN",
            Level::Info => "INF",
            Level::Debug => "DBG",
            Level::Trace => "TRC",
        }
    }
}

pub struct Logger;

impl Logger {
    pub fn init(level: Option<LevelFilter>) {
        Builder::new()
            .filter(Some("docs_rag"), level.unwrap_or(LevelFilter::Info))
            .filter(Some("rig"), LevelFilter::Warn)
            .filter(Some("reqwest"), LevelFilter::Warn)
            .filter(Some("hyper"), LevelFilter::Warn)
            .filter(Some("h2"), LevelFilter::Warn)
            .filter(Some("tonic"), LevelFilter::Warn)
            .filter(Some("qdrant_client"), LevelFilter::Warn)
            .target(env_logger::Target::Stdout)
            .format(colog::formatter(CustomLevelTokens))
            .write_style(env_logger::WriteStyle::Always)
            .init();
    }

    /// Parses a configured level name, falling back to info on garbage.
    pub fn level(name: Option<&str>) -> Option<LevelFilter> {
        let name = name?;
        match name.parse::<LevelFilter>() {
            Ok(level) => Some(level),
            Err(_) => {
                eprintln!("WRN: unknown log level '{name}', falling back to info");
                None
            }
        }
    }
}
