use clap::Parser;
use tracing_subscriber::EnvFilter;
use voice_hints::cli::commands::{cmd_alphabet, cmd_replay};
use voice_hints::cli::config::{Cli, Commands, load_config};

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Replay {
            scenario,
            format,
            output,
        } => {
            let all_passed = cmd_replay(&scenario, &format, output.as_deref(), &config.settings, cli.verbose)?;
            if !all_passed {
                std::process::exit(1);
            }
        }
        Commands::Alphabet { letters, single } => {
            print!("{}", cmd_alphabet(letters.as_deref(), single, &config.settings));
        }
    }

    Ok(())
}
