use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::config::{ClientConfig, credentials_path, load_config};
use crate::download::Retrieve;
use crate::error::{CdsErrorResponse, format_cds_error};
use crate::processing::{JobResults, JobState, JobStatus, JobSubmission, ResultAsset};
use crate::request::PressureLevelRequest;
use crate::util::{append_query, backoff};

/// Blocking client for the CDS Retrieve API.
///
/// Submits a job, polls it until it finishes and streams the result to disk.
#[derive(Debug, Clone)]
pub struct Client {
    url: String,
    key: String,

    timeout: Duration,
    sleep_max: Duration,

    http: HttpClient,
}

impl Client {
    /// Creates a client from `CDSAPI_URL` / `CDSAPI_KEY` and/or the credentials file.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `url`/`key` arguments
    /// - environment variables `CDSAPI_URL` / `CDSAPI_KEY`
    /// - the credentials file (`CDSAPI_RC` or `~/.cdsapirc`)
    pub fn new(url: Option<String>, key: Option<String>, verify: Option<bool>) -> Result<Self> {
        let rc = credentials_path();
        let cfg = load_config(url, key, verify, rc.as_deref())?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: ClientConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("era5-fetch/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("era5-fetch")),
        );

        // No client-wide timeout: result files can take longer than any sane API
        // timeout to stream. API calls set their own.
        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None::<Duration>);

        if !cfg.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            url: cfg.url,
            key: cfg.key,
            timeout: Duration::from_secs(60),
            sleep_max: Duration::from_secs(120),
            http,
        })
    }

    /// Timeout for each API (non-download) call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Upper bound for the pause between two status polls.
    pub fn with_sleep_max(mut self, sleep_max: Duration) -> Self {
        self.sleep_max = sleep_max;
        self
    }

    fn retrieve_base(&self) -> String {
        format!("{}/retrieve/v1", self.url.trim_end_matches('/'))
    }

    /// Submits a job and returns the URL to monitor it with.
    fn submit<T: Serialize>(&self, dataset: &str, request: &T) -> Result<String> {
        let retrieve_base = self.retrieve_base();
        let exec_url = format!("{}/processes/{}/execution", retrieve_base, dataset);

        let body = serde_json::json!({ "inputs": request });
        let job: JobSubmission = self.api_json("POST", &exec_url, &body)?;

        job.monitor_url(&retrieve_base)
            .ok_or_else(|| anyhow!("missing monitor link in job submission response"))
    }

    /// Polls until the job succeeds and returns its result asset.
    fn wait(&self, monitor_url: &str) -> Result<ResultAsset> {
        let status_url = append_query(monitor_url, &[("log", "true"), ("request", "true")]);
        let mut sleep = Duration::from_secs(1);
        let mut last_status: Option<String> = None;

        loop {
            let job: JobStatus = self.api_json("GET", &status_url, &Value::Null)?;

            if last_status.as_deref() != Some(job.status.as_str()) {
                info!("CDS job status: {}", job.status);
                last_status = Some(job.status.clone());
            }

            match job.state()? {
                JobState::Finished => {
                    let results_url = job.results_url(monitor_url);
                    let results: JobResults = self.api_json("GET", &results_url, &Value::Null)?;
                    return results.asset(&results_url);
                }
                JobState::Pending => {
                    thread::sleep(sleep);
                    sleep = backoff(sleep, self.sleep_max);
                }
                JobState::Failed => bail!("processing failed with status {}", job.status),
            }
        }
    }

    fn download(&self, asset: &ResultAsset, target: &Path) -> Result<u64> {
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
        }

        debug!("downloading {} ({} bytes)", asset.location, asset.content_length);
        let mut resp = self
            .authorize(self.http.get(&asset.location))
            .send()
            .context("could not connect")?
            .error_for_status()
            .context("download request failed")?;

        let file = File::create(target)
            .with_context(|| format!("failed to open {}", target.display()))?;
        let mut out = BufWriter::new(file);
        let written = resp
            .copy_to(&mut out)
            .with_context(|| format!("download of {} interrupted", asset.location))?;
        out.flush()?;

        if written < asset.content_length {
            bail!(
                "download failed: downloaded {} byte(s) out of {}",
                written,
                asset.content_length
            );
        }
        Ok(written)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("PRIVATE-TOKEN", self.key.trim())
    }

    fn api_json<TReq: Serialize, TResp: DeserializeOwned>(
        &self,
        method: &str,
        url: &str,
        request: &TReq,
    ) -> Result<TResp> {
        let req = match method {
            "GET" => self.http.get(url),
            _ => self.http.post(url).json(request),
        };
        let resp = self
            .authorize(req)
            .timeout(self.timeout)
            .send()
            .context("could not connect")?;

        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            if let Ok(err_json) = serde_json::from_str::<CdsErrorResponse>(&text) {
                return Err(format_cds_error(status, url, &err_json));
            }

            bail!(
                "API request failed: HTTP {} for url ({})\n{}",
                status,
                url,
                text
            );
        }

        serde_json::from_str::<TResp>(&text)
            .with_context(|| format!("failed to parse API JSON (url={}, status={})", url, status))
    }
}

impl Retrieve for Client {
    fn retrieve(
        &self,
        dataset: &str,
        request: &PressureLevelRequest,
        target: &Path,
    ) -> Result<()> {
        let monitor_url = self.submit(dataset, request)?;
        debug!("submitted {} job, monitoring {}", dataset, monitor_url);
        let asset = self.wait(&monitor_url)?;
        let bytes = self.download(&asset, target)?;
        info!("wrote {} byte(s) to {}", bytes, target.display());
        Ok(())
    }
}
