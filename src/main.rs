use clap::{error::ErrorKind, Parser};
use http_info::{time_get, Config, HyperTransport, Palette};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Times a GET request: DNS, connect, TLS and time to first byte, plus
/// response headers and the server's certificate chain.
#[derive(Parser)]
#[command(name = "http-info", version, about)]
struct Cli {
    /// URL to fetch, e.g. https://domain.com
    url: String,

    /// Print without ANSI colors
    #[arg(long)]
    no_color: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "http_info=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    let config = Config::from_env().with_no_color(cli.no_color);
    let palette = Palette::detect(&config);

    let transport = match HyperTransport::new(&config) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(1);
        }
    };

    match time_get(&transport, &cli.url).await {
        Ok(report) => {
            print!("{}", report.render(&palette));
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(code = e.code(), "Fetch aborted");
            eprintln!("{}", e);
            ExitCode::from(1)
        }
    }
}
