//! `vaultkey` secret helper binary

use clap::Parser;
use std::io::{Read, Write};
use vaultkey::cli::Cli;
use vaultkey::error::{EXIT_OK, Error};
use vaultkey::TracingSink;

fn main() {
    let cli = Cli::parse();

    let code = match run(&cli) {
        Ok(()) => EXIT_OK,
        Err(error) => {
            let code = error.exit_code();
            #[allow(clippy::print_stderr)]
            {
                eprintln!("{:?}", miette::Report::new(error));
            }
            code
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<(), Error> {
    vaultkey::tracing::init_tracing(cli.tracing_config())?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .map_err(|source| Error::RequestRead { source })?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|source| Error::Runtime { source })?;
    let output = runtime.block_on(cli.run(&input, &TracingSink))?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|source| Error::ResponseWrite { source })
}
