// Logging setup: a `tracing` fmt subscriber on stderr whose level is
// driven by the `-v` flag. No environment variables are consulted.

use tracing::Level;

/// Map the `-v` count to a level: warnings by default, then info, debug
/// and trace.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the fmt subscriber on stderr so it never mixes with tables on
/// stdout. Safe to call more than once; later calls are ignored.
pub fn init_logging(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level_for(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
