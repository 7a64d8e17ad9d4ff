use anyhow::bail;
use chrono::{Duration, Utc};
use era5_fetch::{
    Bounds, DATASET, DownloadOptions, Downloader, Error, Humidity, Polygon, PressureLevelRequest,
    Retrieve,
};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes a small file and records every request it receives.
#[derive(Default)]
struct FakeArchive {
    requests: RefCell<Vec<(String, PressureLevelRequest, PathBuf)>>,
}

impl Retrieve for FakeArchive {
    fn retrieve(
        &self,
        dataset: &str,
        request: &PressureLevelRequest,
        target: &Path,
    ) -> anyhow::Result<()> {
        self.requests
            .borrow_mut()
            .push((dataset.to_string(), request.clone(), target.to_path_buf()));
        std::fs::write(target, format!("{:?}", request.area))?;
        Ok(())
    }
}

struct FailingArchive {
    attempts: Cell<usize>,
}

impl Retrieve for FailingArchive {
    fn retrieve(&self, _: &str, _: &PressureLevelRequest, _: &Path) -> anyhow::Result<()> {
        self.attempts.set(self.attempts.get() + 1);
        bail!("quota exceeded for this account")
    }
}

struct Workspace {
    dir: TempDir,
    rc: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join(".cdsapirc");
        std::fs::write(&rc, "url: https://cds.climate.copernicus.eu/api\nkey: test-token\n").unwrap();
        Self { dir, rc }
    }

    fn downloader<R: Retrieve>(&self, retriever: R) -> Downloader<R> {
        Downloader::new(retriever).with_credentials_file(&self.rc)
    }

    fn out(&self) -> &Path {
        self.dir.path()
    }
}

fn file_name(p: &Path) -> String {
    p.file_name().unwrap().to_string_lossy().into_owned()
}

#[test]
fn full_globe_download_is_named_by_hour() {
    let ws = Workspace::new();
    let d = ws.downloader(FakeArchive::default());

    let path = d
        .download("2022-08-15T21:47:12", ws.out(), &DownloadOptions::default())
        .unwrap();

    assert_eq!(file_name(&path), "ERA5_2022-08-15T21:00.nc");
    assert!(path.exists());

    let requests = d.retriever().requests.borrow();
    let (dataset, request, target) = &requests[0];
    assert_eq!(dataset, DATASET);
    assert_eq!(target, &path);
    assert_eq!(request.product_type, "reanalysis");
    assert_eq!(request.format, "netcdf");
    assert_eq!(request.date, "2022-08-15");
    assert_eq!(request.time, "21:00");
    assert_eq!(request.pressure_level.len(), 37);
    assert!(request.area.is_none());
}

#[test]
fn subset_suffix_uses_original_bounds() {
    let ws = Workspace::new();
    let d = ws.downloader(FakeArchive::default());
    let aoi = Polygon::new(vec![
        (-108.25, 37.5),
        (-107.0, 37.5),
        (-107.0, 38.25),
        (-108.25, 38.25),
        (-108.25, 37.5),
    ]);

    for los in [false, true] {
        let options = DownloadOptions::default()
            .with_subset(aoi.clone())
            .with_line_of_sight(los)
            .with_overwrite(true);
        let path = d.download("2019-01-01T00:00", ws.out(), &options).unwrap();
        assert_eq!(
            file_name(&path),
            "ERA5_2019-01-01T00:00_-108.25_37.50_-107.00_38.25.nc"
        );
    }

    let requests = d.retriever().requests.borrow();
    assert_eq!(requests[0].1.area.as_deref(), Some("38.25/-108.25/37.5/-107.0"));
    assert_eq!(requests[1].1.area.as_deref(), Some("39.0/-109.5/36.75/-105.75"));
}

#[test]
fn humidity_and_line_of_sight_share_a_cache_file() {
    let ws = Workspace::new();
    let d = ws.downloader(FakeArchive::default());
    let bounds = Bounds::new(5.0, 45.0, 10.0, 48.0);

    let first = d
        .download(
            "2015-06-01T12:00",
            ws.out(),
            &DownloadOptions::default()
                .with_subset(bounds)
                .with_humidity(Humidity::Relative),
        )
        .unwrap();
    let second = d
        .download(
            "2015-06-01T12:00",
            ws.out(),
            &DownloadOptions::default()
                .with_subset(bounds)
                .with_humidity(Humidity::Specific)
                .with_line_of_sight(true),
        )
        .unwrap();

    assert_eq!(first, second);
    // The second call found the first call's file.
    assert_eq!(d.retriever().requests.borrow().len(), 1);
}

#[test]
fn line_of_sight_doubles_a_symmetric_box() {
    let ws = Workspace::new();
    let d = ws.downloader(FakeArchive::default());
    let options = DownloadOptions::default()
        .with_subset("POLYGON((-10 -5, 10 -5, 10 5, -10 5, -10 -5))")
        .with_line_of_sight(true);

    let plan = d.plan("2001-03-04T05:00", ws.out(), &options).unwrap();
    assert_eq!(plan.request.area.as_deref(), Some("15.0/-30.0/-15.0/30.0"));
}

#[test]
fn date_range_is_enforced() {
    let ws = Workspace::new();
    let d = ws.downloader(FakeArchive::default());
    let opts = DownloadOptions::default();

    let future = Utc::now() + Duration::hours(2);
    let err = d.download(future, ws.out(), &opts).unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains("future")));

    let err = d.download("1939-12-31", ws.out(), &opts).unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains("earliest supported year")));

    let err = d.download("not a date", ws.out(), &opts).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert!(d.download("1940-01-02", ws.out(), &opts).is_ok());
    assert_eq!(d.retriever().requests.borrow().len(), 1);
}

#[test]
fn edge_of_globe_bounds_are_rejected() {
    let ws = Workspace::new();
    let d = ws.downloader(FakeArchive::default());

    for bounds in [
        Bounds::new(170.0, 0.0, 180.0, 10.0),
        Bounds::new(0.0, -90.0, 10.0, 10.0),
    ] {
        let options = DownloadOptions::default().with_subset(bounds);
        let err = d.download("2010-01-01", ws.out(), &options).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("outside of globe")));
    }
    assert!(d.retriever().requests.borrow().is_empty());
}

#[test]
fn overwrite_replaces_existing_file() {
    let ws = Workspace::new();
    let d = ws.downloader(FakeArchive::default());
    let existing = ws.out().join("ERA5_2012-12-12T12:00.nc");
    std::fs::write(&existing, b"stale").unwrap();

    let path = d
        .download("2012-12-12T12:30", ws.out(), &DownloadOptions::default())
        .unwrap();
    assert_eq!(path, existing.canonicalize().unwrap());
    assert!(d.retriever().requests.borrow().is_empty());
    assert_eq!(std::fs::read(&path).unwrap(), b"stale");

    d.download(
        "2012-12-12T12:30",
        ws.out(),
        &DownloadOptions::default().with_overwrite(true),
    )
    .unwrap();
    assert_eq!(d.retriever().requests.borrow().len(), 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "None");
}

#[test]
fn retrieval_errors_propagate_unchanged() {
    let ws = Workspace::new();
    let d = ws.downloader(FailingArchive {
        attempts: Cell::new(0),
    });

    let err = d
        .download("2018-04-01", ws.out(), &DownloadOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Retrieval(_)));
    assert_eq!(err.to_string(), "quota exceeded for this account");
    assert_eq!(d.retriever().attempts.get(), 1);
}

#[test]
fn output_directory_is_resolved_before_checking() {
    let ws = Workspace::new();
    let d = ws.downloader(FakeArchive::default());
    let out = ws.out().join("runs");
    std::fs::create_dir(&out).unwrap();

    let path = d
        .download(
            "2020-05-01T12:00",
            ws.out().join("not-yet/./../runs"),
            &DownloadOptions::default(),
        )
        .unwrap();
    assert_eq!(path, out.canonicalize().unwrap().join("ERA5_2020-05-01T12:00.nc"));

    let err = d
        .download("2020-05-01T12:00", ws.out().join("runs/../gone"), &DownloadOptions::default())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "invalid input: Provided directory: {} does not exist.",
            ws.out().join("gone").display()
        )
    );
}
