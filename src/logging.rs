use std::io::Write;

/// Installs the process-wide logger: `<timestamp> - <LEVEL> - <message>`.
///
/// `RUST_LOG`, when set, overrides `level`. Returns an error if a logger is
/// already installed.
pub fn init_logging(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .parse_default_env()
        .try_init()
}
