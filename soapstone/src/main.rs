use std::{
    fs::File,
    io::{self, Write},
    time::Duration,
};

use structopt::StructOpt;
use thiserror::Error;
use tracing::Level;

use soapstone_wsdl::{error::FetchError, loader::Transport, Wsdl};

#[derive(Debug, Error)]
enum Error {
    #[error("Error loading WSDL")]
    LoadError(#[from] soapstone_wsdl::Error),

    #[error("Unable to set up transport")]
    TransportError(#[from] FetchError),

    #[error("Error writing output")]
    IoError(#[from] io::Error),
}

#[derive(StructOpt)]
struct Args {
    /// Write the dump here instead of standard output
    #[structopt(short, long)]
    output: Option<String>,

    /// Request timeout in seconds for remote documents
    #[structopt(short, long)]
    timeout: Option<u64>,

    #[structopt(short, long)]
    verbose: bool,

    /// URL or path of the service description
    input: String,
}

#[paw::main]
fn main(args: Args) -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        })
        .with_writer(io::stderr)
        .init();

    let transport = match args.timeout {
        Some(seconds) => Transport::with_timeout(Duration::from_secs(seconds))?,
        None => Transport::new(),
    };

    let wsdl = Wsdl::load_with(&args.input, &transport)?;

    match args.output {
        Some(output) => {
            let mut file = File::create(output)?;
            wsdl.dump(&mut file)?;
        }

        None => {
            let stdout = io::stdout();
            let mut stdout = stdout.lock();
            wsdl.dump(&mut stdout)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
