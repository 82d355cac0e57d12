use clap::Parser;
use icdsync::cli::commands::execute_command;
use icdsync::cli::{output, Cli};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.debug);

    if let Err(e) = execute_command(&cli) {
        output::error(&e);
        std::process::exit(e.exit_code());
    }
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        3 => LevelFilter::TRACE,
        _ => {
            eprintln!("Don't be crazy, max is -d -d -d");
            LevelFilter::TRACE
        }
    };

    // Formatted output directed to stderr, stdout stays for command output
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .init();

    match filter {
        LevelFilter::INFO => tracing::info!("Debug mode: info"),
        LevelFilter::DEBUG => tracing::debug!("Debug mode: debug"),
        LevelFilter::TRACE => tracing::debug!("Debug mode: trace"),
        _ => {}
    }
}
