use clap::Parser;
use libseiga::config::{
    DEFAULT_BASE_URL, DEFAULT_IMAGE_HOST, DEFAULT_STORAGE_ROOT, DEFAULT_TIMEOUT_SECONDS,
};
use libseiga::session::DEFAULT_COOKIE_DOMAIN;
use libseiga::{init_scrape, DownloadStatus, ScrapeOptions, SortKey, Update};
use owo_colors::{OwoColorize, Stream::Stderr, Stream::Stdout};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc::channel;

const MAX_BUFFER_SIZE: usize = 100;
const SEPARATOR: &str = "---------------------------------------------------------------------";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Scrape images from http://seiga.nicovideo.jp/",
    long_about = "Walks the illustration listing of a seiga user page by page and saves \
    every image it links to into a fresh, timestamped directory."
)]
pub struct Cli {
    #[arg(long, help = "The illust id <required>")]
    id: Option<String>,
    #[arg(long, default_value_t = 1, help = "First page to start")]
    start_page: u32,
    #[arg(long, default_value_t = 1, help = "Last page")]
    end_page: u32,
    #[arg(
        long,
        default_value = "image_view",
        help = "Sort images by, accepts \"image_view\" and \"image_created\""
    )]
    sort: SortKey,
    #[arg(
        long,
        env = "SEIGA_SESSION",
        hide_env_values = true,
        help = "User session cookie value for authentication"
    )]
    session: Option<String>,
    #[arg(long, default_value = DEFAULT_COOKIE_DOMAIN, help = "Domain the session cookie is sent to. Empty for the base url host only.")]
    cookie_domain: String,
    #[arg(long, default_value = DEFAULT_STORAGE_ROOT, help = "Each run saves into <storage-root>/<timestamp>.")]
    storage_root: PathBuf,
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
    #[arg(long, default_value = DEFAULT_IMAGE_HOST)]
    image_host: String,
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS, help = "Request timeout in seconds.")]
    timeout: u64,
    #[arg(long, default_value = ".", help = "Directory for the seiga.log files.")]
    pub log_dir: PathBuf,
}

impl Cli {
    fn into_options(self) -> ScrapeOptions {
        ScrapeOptions {
            user_id: self.id,
            start_page: self.start_page,
            end_page: self.end_page,
            sort: self.sort,
            session_token: self.session,
            cookie_domain: self.cookie_domain,
            storage_root: self.storage_root,
            base_url: self.base_url,
            image_host: self.image_host,
            timeout: self.timeout,
        }
    }
}

pub async fn scrape(cli: Cli) -> ExitCode {
    let (tx, mut rx) = channel::<Update>(MAX_BUFFER_SIZE);
    let options = cli.into_options();
    let task = tokio::spawn(async move { init_scrape(options, tx).await });

    let mut started = false;
    while let Some(update) = rx.recv().await {
        if !started {
            info("Link start!");
            started = true;
        }
        print_update(update);
    }

    match task.await {
        Ok(Ok(_)) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            error(&e.to_string());
            ExitCode::FAILURE
        }
        Err(e) => {
            error(&format!("Scrape task stopped unexpectedly. {e}"));
            ExitCode::FAILURE
        }
    }
}

fn print_update(update: Update) {
    match update {
        Update::PageStarted { page, remaining } => {
            println!("Start with page {page}, remain {remaining}");
        }
        Update::PageListed {
            found, malformed, ..
        } => {
            info(&format!("Found {found} images on the page"));
            if malformed > 0 {
                warn(&format!("Skipped {malformed} links that are not images"));
            }
        }
        Update::PageFailed { page, kind, .. } => {
            error(&format!("Page {page} could not be loaded! {kind}"));
        }
        Update::ItemStarted {
            page,
            remaining,
            index,
            total,
            item_id,
        } => {
            info(SEPARATOR);
            println!("Saving image {index}/{total} of page {page} remain {remaining} page");
            info(&format!("Start with image ID: {item_id}"));
        }
        Update::ItemSkipped { item_id, .. } => {
            warn(&format!("Image {item_id} was already saved in this run, skipping"));
        }
        Update::DirectoryCreated { path } => {
            info(&format!("Generate folder {}/", path.to_string_lossy()));
        }
        Update::ItemFinished(outcome) => match outcome.status {
            DownloadStatus::Saved { .. } => info("Image saved!"),
            DownloadStatus::Failed { kind } => error(&format!("Failure occurred! {kind}")),
        },
        Update::Finished(tally) => {
            info(&format!(
                "Job finished with {}/{} success and {} failure",
                tally.successes(),
                tally.attempts(),
                tally.failures()
            ));
            info(&format!(
                "{} images saved in {}/",
                tally.successes(),
                tally.output_directory().to_string_lossy()
            ));
        }
    }
}

fn info(msg: &str) {
    println!("{}", msg.if_supports_color(Stdout, |text| text.green()));
}

fn warn(msg: &str) {
    println!("{}", msg.if_supports_color(Stdout, |text| text.yellow()));
}

fn error(msg: &str) {
    eprintln!("{}", msg.if_supports_color(Stderr, |text| text.red()));
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::{CommandFactory, Parser};
    use libseiga::SortKey;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_for_optional_arguments() {
        let cli = Cli::try_parse_from(["seiga", "--id", "42", "--session", "tok"]).unwrap();
        let options = cli.into_options();
        assert_eq!(options.user_id.as_deref(), Some("42"));
        assert_eq!(options.start_page, 1);
        assert_eq!(options.end_page, 1);
        assert_eq!(options.sort, SortKey::ByViews);
        assert_eq!(options.base_url, "http://seiga.nicovideo.jp");
    }

    #[test]
    fn sort_accepts_created_date() {
        let cli = Cli::try_parse_from(["seiga", "--id", "1", "--sort", "image_created"]).unwrap();
        assert_eq!(cli.sort, SortKey::ByCreatedDate);
        assert!(Cli::try_parse_from(["seiga", "--sort", "newest"]).is_err());
    }
}
