//! formprobe: run the Customer Service Center form suite
//!
//! ## Usage
//!
//! ```bash
//! formprobe run                       # Run every case on the built-in replica
//! formprobe run --filter "7."         # Privacy-policy cases only
//! formprobe list                      # List case names
//! formprobe config                    # Show the effective configuration
//! ```

use clap::Parser;
use formprobe_cli::{
    build_suite, logging, resolve_config, Cli, CliConfig, CliError, CliResult, ColorChoice,
    Commands, ConfigArgs, ListArgs, RunArgs, SuiteRunner, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    logging::init(config.verbosity, cli.log_format.into())?;

    match cli.command {
        Commands::Run(args) => run_suite(config, &args),
        Commands::List(args) => {
            run_list(&args);
            Ok(())
        }
        Commands::Config(args) => run_config(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.into();
    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

fn run_suite(config: CliConfig, args: &RunArgs) -> CliResult<()> {
    let runner = SuiteRunner::from_overrides(config, &args.overrides)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::test_execution(format!("cannot start runtime: {e}")))?;
    runtime.block_on(runner.run(args))?;
    Ok(())
}

fn run_list(args: &ListArgs) {
    let suite = build_suite(false);
    for name in suite.names() {
        if args.filter.as_deref().map_or(true, |f| name.contains(f)) {
            println!("{name}");
        }
    }
}

fn run_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<()> {
    let resolved = resolve_config(config, &args.overrides)?;
    print!("{}", resolved.to_yaml()?);
    Ok(())
}
