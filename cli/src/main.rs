use clap::Parser;
use std::process::ExitCode;

mod cli;

const DEFAULT_LOG_FILTER: &str = "libseiga=debug";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    let f_appender = tracing_appender::rolling::hourly(&cli.log_dir, "seiga.log");
    let (non_blk, _guard) = tracing_appender::non_blocking(f_appender);
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .event_format(tracing_subscriber::fmt::format().pretty())
        .with_writer(non_blk)
        .init();
    cli::scrape(cli).await
}
