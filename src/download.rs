use chrono::Utc;
use log::{debug, info};
use std::path::{Component, Path, PathBuf};

use crate::client::Client;
use crate::config::credentials_path;
use crate::error::{Error, Result};
use crate::geometry::Subset;
use crate::request::{DATASET, Humidity, PressureLevelRequest};
use crate::timestamp::{Timestamp, TimestampInput};

/// Something that can fetch a CDS request into a local file.
///
/// Implemented by [`Client`]; tests substitute their own.
pub trait Retrieve {
    fn retrieve(
        &self,
        dataset: &str,
        request: &PressureLevelRequest,
        target: &Path,
    ) -> anyhow::Result<()>;
}

impl<R: Retrieve + ?Sized> Retrieve for &R {
    fn retrieve(
        &self,
        dataset: &str,
        request: &PressureLevelRequest,
        target: &Path,
    ) -> anyhow::Result<()> {
        (**self).retrieve(dataset, request, target)
    }
}

/// Per-call knobs. The default downloads the whole globe with specific humidity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadOptions {
    pub subset: Option<Subset>,
    pub humidity: Humidity,
    /// Request twice the subset's extent on every side, for line-of-sight work.
    pub line_of_sight: bool,
    /// Download even when the target file already exists.
    pub overwrite: bool,
}

impl DownloadOptions {
    pub fn with_subset(mut self, subset: impl Into<Subset>) -> Self {
        self.subset = Some(subset.into());
        self
    }

    pub fn with_humidity(mut self, humidity: Humidity) -> Self {
        self.humidity = humidity;
        self
    }

    pub fn with_line_of_sight(mut self, line_of_sight: bool) -> Self {
        self.line_of_sight = line_of_sight;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// A validated request and the file it will land in.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDownload {
    pub request: PressureLevelRequest,
    pub target: PathBuf,
}

/// Validates inputs, skips work already on disk and hands the rest to a [`Retrieve`].
#[derive(Debug, Clone)]
pub struct Downloader<R> {
    retriever: R,
    credentials: Option<PathBuf>,
}

impl Downloader<Client> {
    /// A downloader backed by the CDS client, configured from the environment
    /// and the credentials file.
    pub fn from_env() -> Result<Self> {
        let credentials = credentials_path();
        require_credentials(credentials.as_deref())?;
        let client = Client::from_env().map_err(|e| Error::Configuration(format!("{:#}", e)))?;
        Ok(Self {
            retriever: client,
            credentials,
        })
    }
}

impl<R: Retrieve> Downloader<R> {
    pub fn new(retriever: R) -> Self {
        Self {
            retriever,
            credentials: credentials_path(),
        }
    }

    /// Checks for credentials at `path` instead of `CDSAPI_RC` / `~/.cdsapirc`.
    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials = Some(path.into());
        self
    }

    pub fn retriever(&self) -> &R {
        &self.retriever
    }

    /// Runs every check and builds the request without contacting the archive.
    pub fn plan(
        &self,
        timestamp: impl Into<TimestampInput>,
        out_dir: impl AsRef<Path>,
        options: &DownloadOptions,
    ) -> Result<PlannedDownload> {
        require_credentials(self.credentials.as_deref())?;
        let out_dir = resolve_dir(out_dir.as_ref())?;

        let timestamp = Timestamp::resolve(timestamp.into())?;
        timestamp.check_range(Utc::now())?;

        let mut request = PressureLevelRequest::new(
            timestamp.date_param(),
            timestamp.time_param(),
            options.humidity,
        );
        let mut stem = format!("ERA5_{}", timestamp.file_label());

        if let Some(subset) = &options.subset {
            let bounds = subset.bounds()?;
            bounds.validate()?;

            let area = if options.line_of_sight {
                bounds.expand_for_line_of_sight()
            } else {
                bounds
            };
            request.area = Some(area.area_param());

            // Named after the area of interest, not the expanded request area.
            stem = format!("{}_{}", stem, bounds.filename_suffix());
        }

        Ok(PlannedDownload {
            request,
            target: out_dir.join(format!("{}.nc", stem)),
        })
    }

    /// Downloads one ERA5 pressure-level snapshot and returns its path.
    ///
    /// An existing file at the derived path is returned as-is unless
    /// `options.overwrite` is set. Retrieval errors are passed through untouched.
    pub fn download(
        &self,
        timestamp: impl Into<TimestampInput>,
        out_dir: impl AsRef<Path>,
        options: &DownloadOptions,
    ) -> Result<PathBuf> {
        let PlannedDownload { request, target } = self.plan(timestamp, out_dir, options)?;

        if target.exists() && !options.overwrite {
            info!("reusing existing ERA5 file {}", target.display());
            return Ok(target);
        }

        debug!("requesting {} into {}: {:?}", DATASET, target.display(), request);
        self.retriever.retrieve(DATASET, &request, &target)?;
        Ok(target)
    }
}

/// Downloads with the default CDS client. See [`Downloader::download`].
pub fn download_era5(
    timestamp: impl Into<TimestampInput>,
    out_dir: impl AsRef<Path>,
    options: &DownloadOptions,
) -> Result<PathBuf> {
    Downloader::from_env()?.download(timestamp, out_dir, options)
}

fn require_credentials(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) if p.exists() => Ok(()),
        Some(p) => Err(Error::Configuration(format!(
            "must sign up for a CDS account and save the API key to {}",
            p.display()
        ))),
        None => Err(Error::Configuration(
            "must sign up for a CDS account and save the API key to ~/.cdsapirc (home directory not found)"
                .to_string(),
        )),
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Drops `.` and folds `..` without touching the filesystem, so a `..` after a
/// missing component still resolves.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn resolve_dir(dir: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(dir);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map_err(|e| Error::validation(format!("cannot resolve {}: {}", dir.display(), e)))?
            .join(expanded)
    };
    let absolute = normalize(&absolute);

    if !absolute.is_dir() {
        return Err(Error::validation(format!(
            "Provided directory: {} does not exist.",
            absolute.display()
        )));
    }

    absolute
        .canonicalize()
        .map_err(|e| Error::validation(format!("cannot resolve {}: {}", absolute.display(), e)))
}
