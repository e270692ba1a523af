use crate::download::{ItemDownloader, OutputStore};
use crate::walker::PaginationWalker;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::Sender;
use tracing::instrument;

pub mod config;
pub mod download;
pub mod errors;
pub mod extract;
pub mod session;
pub mod tally;
pub mod walker;

pub use config::{PageRange, ScrapeConfig, ScrapeOptions, SortKey};
pub use errors::ScrapeError;
pub use session::{Document, HttpSession, Resource, SessionClient, SessionContext};
pub use tally::{DownloadOutcome, DownloadStatus, ItemRef, RunTally};

/// Progress events for whichever front end drives the run.
#[derive(Debug, Clone)]
pub enum Update {
    PageStarted {
        page: u32,
        remaining: u32,
    },
    PageListed {
        page: u32,
        found: usize,
        malformed: usize,
    },
    PageFailed {
        page: u32,
        kind: &'static str,
        message: String,
    },
    ItemStarted {
        page: u32,
        remaining: u32,
        /// 1-based position within the page
        index: usize,
        total: usize,
        item_id: String,
    },
    /// The item was already handled earlier in this run.
    ItemSkipped {
        page: u32,
        item_id: String,
    },
    DirectoryCreated {
        path: PathBuf,
    },
    ItemFinished(DownloadOutcome),
    Finished(RunTally),
}

/// Validates `options`, opens an authenticated session and runs the scrape
/// into a fresh `<storage root>/<unix seconds>` directory.
///
/// Only configuration problems are returned as errors. Everything that goes
/// wrong once the run has started is counted in the returned tally.
#[instrument(skip(options, update_tx))]
pub async fn init_scrape(
    options: ScrapeOptions,
    update_tx: Sender<Update>,
) -> Result<RunTally, ScrapeError> {
    let config = options.validate()?;
    let session = HttpSession::new(&config.session, &config.base_url, config.timeout)?;
    let run_dir = run_directory(&config.storage_root, Utc::now());
    tracing::debug!("Run directory for user {} is {}", config.user_id, run_dir.to_string_lossy());
    Ok(run_scrape(&config, &session, run_dir, update_tx).await)
}

/// Walks every page of the configured range and downloads its items in
/// discovery order, one at a time. An item id seen before in the run is
/// skipped without counting as an attempt.
#[instrument(skip(config, session, update_tx))]
pub async fn run_scrape(
    config: &ScrapeConfig,
    session: &dyn SessionClient,
    run_dir: PathBuf,
    update_tx: Sender<Update>,
) -> RunTally {
    let mut tally = RunTally::new(absolute_path(&run_dir));
    let mut walker =
        PaginationWalker::new(session, &config.base_url, &config.user_id, config.range);
    let mut downloader = ItemDownloader::new(
        session,
        &config.base_url,
        &config.image_host,
        OutputStore::new(run_dir),
        update_tx.clone(),
    );
    let mut seen_ids: HashSet<String> = HashSet::new();

    while let Some(page) = walker.upcoming_page() {
        let remaining = config.range.remaining_after(page);
        send_update(&update_tx, Update::PageStarted { page, remaining }).await;

        let Some(listing) = walker.next_page().await else {
            break;
        };
        if let Some(e) = listing.error {
            send_update(
                &update_tx,
                Update::PageFailed {
                    page,
                    kind: e.kind(),
                    message: e.to_string(),
                },
            )
            .await;
            continue;
        }

        let total = listing.items.len();
        send_update(
            &update_tx,
            Update::PageListed {
                page,
                found: total,
                malformed: listing.malformed,
            },
        )
        .await;

        for (idx, item) in listing.items.into_iter().enumerate() {
            if !seen_ids.insert(item.id.clone()) {
                tracing::debug!("Image {} already handled in this run, skipping", item.id);
                send_update(
                    &update_tx,
                    Update::ItemSkipped {
                        page,
                        item_id: item.id,
                    },
                )
                .await;
                continue;
            }
            send_update(
                &update_tx,
                Update::ItemStarted {
                    page,
                    remaining,
                    index: idx + 1,
                    total,
                    item_id: item.id.clone(),
                },
            )
            .await;
            let outcome = downloader.process(item, &mut tally).await;
            send_update(&update_tx, Update::ItemFinished(outcome)).await;
        }
    }

    tracing::debug!(
        "Job finished with {}/{} success and {} failure",
        tally.successes(),
        tally.attempts(),
        tally.failures()
    );
    send_update(&update_tx, Update::Finished(tally.clone())).await;
    tally
}

/// `<root>/<unix seconds of run start>`
pub fn run_directory(storage_root: &Path, started_at: DateTime<Utc>) -> PathBuf {
    storage_root.join(started_at.timestamp().to_string())
}

fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

pub(crate) async fn send_update(update_tx: &Sender<Update>, update: Update) {
    // A front end that stopped listening does not stop the run.
    if update_tx.send(update).await.is_err() {
        tracing::trace!("Update channel closed");
    }
}
