use crate::config::GeneralConfig;
use simplelog::*;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

pub fn init(general: &GeneralConfig) -> anyhow::Result<()> {
    let log_dir = Path::new(&general.log_dir);
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let log_file = File::create(log_dir.join("pagepeek.log"))?;
    let level = level_from(&general.log_level);

    let mut loggers: Vec<Box<dyn SharedLogger>> =
        vec![WriteLogger::new(level, Config::default(), log_file)];
    if general.debug {
        loggers.push(TermLogger::new(
            level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }

    CombinedLogger::init(loggers)?;

    Ok(())
}

fn level_from(raw: &str) -> LevelFilter {
    LevelFilter::from_str(raw.trim()).unwrap_or(LevelFilter::Info)
}
