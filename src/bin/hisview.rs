use clap::Parser;

use hisview::config::Configuration;
use hisview::format::render;
use hisview::orchestrator;
use hisview::reader::DrrHisReader;

fn main() -> std::process::ExitCode {
    match run() {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            eprintln!("Run --help for more information");
            std::process::ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), hisview::error::HistoError> {
    let config = Configuration::parse();
    if config.verbose {
        eprintln!("opening catalog at {}", config.base.display());
    }
    let reader = DrrHisReader::open(&config.base)?;
    let output = orchestrator::run(&config, &reader)?;
    print!("{}", render(&output));
    Ok(())
}
