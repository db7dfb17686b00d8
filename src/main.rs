use std::io::Write;
use std::path::Path;

use clap::{app_from_crate, arg, AppSettings};
use env_logger::{Builder, Env};

use crate::raster::StderrReporter;

mod convert;
mod dump;
mod error;
mod metadata;
mod raster;

#[cfg(test)]
mod test;

fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "# {}", record.args()))
        .init();

    let args: Vec<_> = std::env::args().collect();

    if let Err(e) = execute(&args) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn execute(input: &[String]) -> anyhow::Result<()> {
    let app = app_from_crate!()
        .global_setting(AppSettings::PropagateVersion)
        .arg(arg!(<INPUT> "Raster to dump; a .gz suffix means gzip compressed"))
        .arg(arg!([EXTRA] "Accepted for compatibility, ignored"));

    let matches = app.get_matches_from(input);
    let path = Path::new(matches.value_of("INPUT").unwrap_or_default());

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();

    convert::run(path, &mut stdin.lock(), &mut stdout.lock(), &StderrReporter {})?;

    Ok(())
}
