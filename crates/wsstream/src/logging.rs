use tracing::level_filters::LevelFilter;

/// The libraries only emit `debug!` and `trace!` events, so stderr stays
/// quiet unless `-v` is given.
pub fn verbosity_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Route `tracing` events to stderr; stdout carries command output.
pub fn init_logging(verbose: u8, json: bool) {
    let filter = verbosity_filter(verbose);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(filter)
        .with_ansi(false)
        .with_target(filter >= LevelFilter::TRACE);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(verbosity_filter(0), LevelFilter::WARN);
        assert_eq!(verbosity_filter(1), LevelFilter::DEBUG);
        assert_eq!(verbosity_filter(2), LevelFilter::TRACE);
        assert_eq!(verbosity_filter(9), LevelFilter::TRACE);
    }
}
