//! Download ERA5 pressure-level reanalysis snapshots from the Copernicus Climate
//! Data Store (CDS).
//!
//! One call fetches geopotential, temperature and a humidity field on all 37
//! pressure levels for a single hour, optionally clipped to an area of interest,
//! into `ERA5_<YYYY-MM-DDTHH:00>[_<w>_<s>_<e>_<n>].nc`. A file that already exists
//! under that name is reused instead of downloaded again.
//!
//! ## Quick start
//! - Save a CDS Personal Access Token to `~/.cdsapirc` (or point `CDSAPI_RC` at
//!   another file):
//!   ```text
//!   url: https://cds.climate.copernicus.eu/api
//!   key: <PERSONAL-ACCESS-TOKEN>
//!   ```
//! - Call [`download_era5`].
//!
//! ```no_run
//! use era5_fetch::{Bounds, DownloadOptions, Humidity, download_era5};
//!
//! fn main() -> Result<(), era5_fetch::Error> {
//!     let options = DownloadOptions::default()
//!         .with_subset(Bounds::new(-106.0, 39.0, -105.0, 40.0))
//!         .with_humidity(Humidity::Relative)
//!         .with_line_of_sight(true);
//!     let path = download_era5("2021-02-03T18:00", "~/era5", &options)?;
//!     println!("{}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! To plug in another transport (or a fake in tests), implement [`Retrieve`] and
//! use [`Downloader::new`].

#![forbid(unsafe_code)]

mod client;
mod config;
mod download;
mod error;
mod geometry;
mod processing;
mod request;
mod timestamp;
mod util;

pub use client::Client;
pub use config::{ClientConfig, credentials_path};
pub use download::{DownloadOptions, Downloader, PlannedDownload, Retrieve, download_era5};
pub use error::{Error, Result};
pub use geometry::{Bounds, Polygon, Subset};
pub use request::{DATASET, Humidity, PRESSURE_LEVELS, PressureLevelRequest};
pub use timestamp::{Timestamp, TimestampInput};
