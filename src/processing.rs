//! Response payloads of the CDS Retrieve API (OGC API - Processes).

use anyhow::{Result, bail};

use crate::util::urljoin;

#[derive(Debug, serde::Deserialize)]
struct Link {
    #[serde(default)]
    rel: Option<String>,
    href: String,
}

fn find_link(links: &[Link], rel: &str) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref() == Some(rel))
        .map(|l| l.href.clone())
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct JobSubmission {
    #[serde(default, alias = "jobID")]
    pub(crate) job_id: Option<String>,
    #[serde(default)]
    links: Vec<Link>,
}

impl JobSubmission {
    pub(crate) fn monitor_url(&self, retrieve_base: &str) -> Option<String> {
        find_link(&self.links, "monitor").or_else(|| {
            self.job_id
                .as_deref()
                .map(|id| format!("{}/jobs/{}", retrieve_base, id))
        })
    }
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct JobStatus {
    pub(crate) status: String,
    #[serde(default)]
    links: Vec<Link>,
}

/// Where a job stands, collapsed from the status strings CDS reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobState {
    Pending,
    Finished,
    Failed,
}

impl JobStatus {
    pub(crate) fn results_url(&self, monitor_url: &str) -> String {
        find_link(&self.links, "results")
            .unwrap_or_else(|| format!("{}/results", monitor_url.trim_end_matches('/')))
    }

    pub(crate) fn state(&self) -> Result<JobState> {
        match self.status.as_str() {
            "accepted" | "running" => Ok(JobState::Pending),
            "successful" => Ok(JobState::Finished),
            "failed" | "rejected" | "dismissed" | "deleted" => Ok(JobState::Failed),
            other => bail!("unknown processing status [{}]", other),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct JobResults {
    asset: Asset,
}

#[derive(Debug, serde::Deserialize)]
struct Asset {
    value: AssetValue,
}

#[derive(Debug, serde::Deserialize)]
struct AssetValue {
    href: String,
    #[serde(rename = "file:size")]
    file_size: u64,
}

/// A finished result ready to be streamed to disk.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResultAsset {
    pub(crate) location: String,
    pub(crate) content_length: u64,
}

impl JobResults {
    pub(crate) fn asset(&self, results_url: &str) -> Result<ResultAsset> {
        let href = self.asset.value.href.trim();
        if href.is_empty() {
            bail!("missing results asset href");
        }

        Ok(ResultAsset {
            location: urljoin(results_url, href),
            content_length: self.asset.value.file_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_link_preferred_over_job_id() {
        let job: JobSubmission = serde_json::from_str(
            r#"{"jobID":"abc","links":[{"rel":"monitor","href":"https://cds/jobs/abc"}]}"#,
        )
        .unwrap();
        assert_eq!(job.monitor_url("https://x").as_deref(), Some("https://cds/jobs/abc"));

        let job: JobSubmission = serde_json::from_str(r#"{"jobID":"abc"}"#).unwrap();
        assert_eq!(
            job.monitor_url("https://cds/api/retrieve/v1").as_deref(),
            Some("https://cds/api/retrieve/v1/jobs/abc")
        );
    }

    #[test]
    fn status_strings_map_to_states() {
        let s = |status: &str| JobStatus {
            status: status.to_string(),
            links: Vec::new(),
        };
        assert_eq!(s("running").state().unwrap(), JobState::Pending);
        assert_eq!(s("successful").state().unwrap(), JobState::Finished);
        assert_eq!(s("dismissed").state().unwrap(), JobState::Failed);
        assert!(s("exploded").state().is_err());
        assert_eq!(s("successful").results_url("https://cds/jobs/1/"), "https://cds/jobs/1/results");
    }

    #[test]
    fn results_asset_is_joined_to_results_url() {
        let results: JobResults = serde_json::from_str(
            r#"{"asset":{"value":{"href":"/download/era5.nc","file:size":2048,"type":"application/netcdf"}}}"#,
        )
        .unwrap();
        let asset = results.asset("https://cds/api").unwrap();
        assert_eq!(asset.location, "https://cds/api/download/era5.nc");
        assert_eq!(asset.content_length, 2048);
    }
}
