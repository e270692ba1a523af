use crate::errors::ScrapeError;
use crate::extract::{extract_resource_uri, resolve_resource_url};
use crate::session::{Resource, SessionClient};
use crate::tally::{DownloadOutcome, DownloadStatus, ItemRef, RunTally};
use crate::{send_update, Update};
use chrono::Utc;
use phf::phf_map;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::Sender;
use url::Url;

/// Extension used when the image host does not say what it sent.
const DEFAULT_EXTENSION: &str = ".jpg";
const MAX_NAME_SUFFIX: u32 = 1000;

/// The run's output directory. Created lazily, at most once per run.
#[derive(Debug)]
pub struct OutputStore {
    directory: PathBuf,
    created: bool,
}

impl OutputStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            created: false,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Creates the directory if absent. Returns true only for the call that created it.
    pub async fn ensure_directory(&mut self) -> Result<bool, ScrapeError> {
        if self.created {
            return Ok(false);
        }
        let existed = self.directory.exists();
        if let Err(e) = fs::create_dir_all(&self.directory).await {
            tracing::error!("Failed to create output directory\nError : {}", e);
            return Err(ScrapeError::Storage {
                path: self.directory.to_string_lossy().to_string(),
                message: format!("error creating output directory. {} | {}", e, e.kind()),
            });
        }
        self.created = true;
        Ok(!existed)
    }

    /// Writes the resource as `<unix seconds>-<item id><ext>`. An existing
    /// file is never replaced: a `-1`, `-2`, ... suffix is added instead.
    #[tracing::instrument(skip(self, resource), fields(bytes = resource.bytes.len()))]
    pub async fn save(&self, item: &ItemRef, resource: &Resource) -> Result<PathBuf, ScrapeError> {
        let f_ext = get_file_extension(resource);
        let stem = format!("{}-{}", Utc::now().timestamp(), item.id);

        let mut attempt = 0u32;
        let (mut dest_file, f_path) = loop {
            let f_name = if attempt == 0 {
                format!("{stem}{f_ext}")
            } else {
                format!("{stem}-{attempt}{f_ext}")
            };
            let f_path = self.directory.join(f_name);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&f_path)
                .await
            {
                Ok(f) => break (f, f_path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < MAX_NAME_SUFFIX => {
                    tracing::debug!("{} already exists, trying next name", f_path.to_string_lossy());
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("Error opening/creating file {}", f_path.to_string_lossy());
                    tracing::error!("{} | {}", e, e.kind());
                    return Err(storage_error(&f_path, &e));
                }
            }
        };

        if let Err(e) = dest_file.write_all(&resource.bytes).await {
            tracing::error!("Error writing to file {}\nError : {}", f_path.to_string_lossy(), e);
            return Err(storage_error(&f_path, &e));
        }
        if let Err(e) = dest_file.flush().await {
            return Err(storage_error(&f_path, &e));
        }

        tracing::debug!(
            "Download completed for {}, file @ {}",
            resource.url,
            f_path.to_string_lossy()
        );
        Ok(f_path)
    }
}

fn storage_error(path: &Path, e: &std::io::Error) -> ScrapeError {
    ScrapeError::Storage {
        path: path.to_string_lossy().to_string(),
        message: format!("{} | {}", e, e.kind()),
    }
}

/// Fetches, resolves and saves one item at a time.
pub struct ItemDownloader<'a> {
    session: &'a dyn SessionClient,
    base_url: &'a Url,
    image_host: &'a Url,
    store: OutputStore,
    update_tx: Sender<Update>,
}

impl<'a> ItemDownloader<'a> {
    pub fn new(
        session: &'a dyn SessionClient,
        base_url: &'a Url,
        image_host: &'a Url,
        store: OutputStore,
        update_tx: Sender<Update>,
    ) -> Self {
        Self {
            session,
            base_url,
            image_host,
            store,
            update_tx,
        }
    }

    /// `baseURL/image/source/{id}`
    pub fn detail_url(&self, item_id: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("/image/source/{item_id}"));
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    /// Never fails: any error becomes a `Failed` outcome carrying the error kind.
    #[tracing::instrument(skip(self, tally))]
    pub async fn process(&mut self, item: ItemRef, tally: &mut RunTally) -> DownloadOutcome {
        tally.begin_attempt();
        let status = match self.try_process(&item).await {
            Ok(path) => DownloadStatus::Saved { path },
            Err(e) => {
                tracing::error!("Failure occurred for image {}! {}", item.id, e.kind());
                tracing::debug!("{}", e);
                DownloadStatus::Failed { kind: e.kind() }
            }
        };
        let outcome = DownloadOutcome { item, status };
        tally.record(&outcome);
        outcome
    }

    async fn try_process(&mut self, item: &ItemRef) -> Result<PathBuf, ScrapeError> {
        let detail_url = self.detail_url(&item.id);
        let doc = self.session.authenticated_get(&detail_url).await?;
        let uri = extract_resource_uri(&doc)?;
        let resource_url = resolve_resource_url(self.image_host, &uri)?;

        if self.store.ensure_directory().await? {
            tracing::info!("Generated folder {}", self.store.directory().to_string_lossy());
            send_update(
                &self.update_tx,
                Update::DirectoryCreated {
                    path: self.store.directory().to_path_buf(),
                },
            )
            .await;
        }

        let resource = self.session.fetch_resource(&resource_url).await?;
        self.store.save(item, &resource).await
    }
}

fn get_file_extension(resource: &Resource) -> &'static str {
    let Some(ct) = resource.content_type.as_deref() else {
        return DEFAULT_EXTENSION;
    };
    let mut val = ct.to_lowercase();
    // Remove parameters if present (E.g image/jpeg; charset=binary)
    if let Some(idx) = val.find(';') {
        val.truncate(idx);
    }
    match MIME_TYPES.get(val.trim()) {
        None => {
            tracing::warn!(
                "File extension can not be determined for {}, using {}",
                resource.url,
                DEFAULT_EXTENSION
            );
            DEFAULT_EXTENSION
        }
        Some(ext) => *ext,
    }
}

static MIME_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "image/jpeg" => ".jpg",
    "image/jpg" => ".jpg",
    "image/pjpeg" => ".jpg",
    "image/png" => ".png",
    "image/gif" => ".gif",
    "image/webp" => ".webp",
    "image/bmp" => ".bmp",
};
