use colored::Colorize;
use metamodel_ir::cli;

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn main() {
    init_tracing();
    let command_line_interface = cli::CommandLineInterface::load();
    if let Err(error) = command_line_interface.run() {
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
