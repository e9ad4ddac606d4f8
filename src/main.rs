mod commands;

use rust_tapectl::cli::{Cli, Commands};
use rust_tapectl::{logger, Config, Result};
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let args = Cli::parse_args();

    // Initialize logging system
    logger::init(args.verbose, args.json)?;

    debug!("tapectl starting");

    match run(args) {
        Ok(_) => {
            info!("Operation completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Operation failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: Cli) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let json = args.json;

    match args.command {
        Commands::Inquiry { device } => commands::inquiry::execute(&config, &device, json),

        Commands::Status { device } => commands::status::execute(&config, &device, json),

        Commands::Eject { device } => commands::eject::execute(&config, &device, json),

        Commands::Rewind { device } => commands::rewind::execute(&config, &device, json),

        Commands::Ready { device } => commands::ready::execute(&config, &device, json),

        Commands::Raw {
            device,
            cdb,
            read,
            write,
            timeout,
        } => commands::raw::execute(
            &config,
            &device,
            commands::raw::RawArgs {
                cdb: cdb.0,
                read,
                write: write.map(|w| w.0),
                timeout,
            },
            json,
        ),
    }
}
