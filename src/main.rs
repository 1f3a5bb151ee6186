use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::process::ExitCode;

use blockdump::{BlockReader, Config, ErrorMode};
use dotenvy::dotenv;
use log::{error, info, warn};

fn main() -> ExitCode {
    let _ = dotenv();
    env_logger::init();

    let config = match Config::from_env(std::env::args().nth(1)) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("reading blocks from {}", config.block_file.display());
    let file = File::open(&config.block_file)?;
    let reader =
        BlockReader::new(config.framer(BufReader::new(file))).sign_policy(config.sign_policy);
    let limit = config.max_blocks.unwrap_or(usize::MAX);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let (mut written, mut skipped) = (0usize, 0usize);

    for result in reader.take(limit) {
        match result {
            Ok(record) => {
                serde_json::to_writer(&mut out, &record)?;
                out.write_all(b"\n")?;
                written += 1;
            }
            Err(e) if config.on_error == ErrorMode::Skip && !e.is_fatal() => {
                warn!("skipping: {e}");
                skipped += 1;
            }
            Err(e) => {
                out.flush()?;
                return Err(e.into());
            }
        }
    }
    out.flush()?;

    info!("done: {written} blocks written, {skipped} skipped");
    Ok(())
}
