/// Receives the messages of errors raised while opening or decoding a raster.
pub trait ErrorReporter {
    fn report(&self, message: &str);
}

/// Prints raster errors straight to stderr, whatever the log filter says.
pub struct StderrReporter {}

impl ErrorReporter for StderrReporter {
    fn report(&self, message: &str) {
        eprintln!("{}", message);
    }
}
