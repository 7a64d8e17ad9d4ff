use anyhow::anyhow;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by [`crate::download_era5`] and [`crate::Downloader`].
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials or client configuration are missing or unusable.
    ///
    /// Has to be fixed by the operator outside the program.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An input is outside the accepted domain (directory, date, bounds, ...).
    #[error("invalid input: {0}")]
    Validation(String),

    /// The retrieval collaborator failed. Passed through untouched.
    #[error(transparent)]
    Retrieval(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct CdsErrorResponse {
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<u16>,
    #[serde(default)]
    pub(crate) detail: Option<String>,
    #[serde(default)]
    pub(crate) trace_id: Option<String>,
    // Some endpoints respond with {"message":...,"detail":...}
    #[serde(default)]
    pub(crate) message: Option<String>,
}

pub(crate) fn format_cds_error(
    status: StatusCode,
    url: &str,
    e: &CdsErrorResponse,
) -> anyhow::Error {
    let title = e.title.as_deref().or(e.message.as_deref()).unwrap_or("");
    let detail = e.detail.as_deref().unwrap_or("");
    let trace = e.trace_id.as_deref().unwrap_or("(none)");
    let code = e.status.unwrap_or(status.as_u16());

    let lower = format!("{} {}", title, detail).to_lowercase();
    if status == StatusCode::FORBIDDEN
        && (lower.contains("required licence") || lower.contains("manage-licences"))
    {
        let link = detail
            .find("https://")
            .and_then(|idx| detail[idx..].split_whitespace().next())
            .unwrap_or("https://cds.climate.copernicus.eu/datasets/reanalysis-era5-pressure-levels");

        return anyhow!(
            "CDS returned 403: the ERA5 pressure-level licence has not been accepted.\nAccept it (Manage licences) at {} and re-run.\n\nServer message: {}\ntrace_id: {}",
            link,
            title,
            trace
        );
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => anyhow!(
            "CDS rejected the credentials (HTTP {}).\n- The key in .cdsapirc must be a Personal Access Token, without the old '<UID>:' prefix\n- Check that the token has not expired\n\nServer message: {}\n{}\ntrace_id: {}\nrequest: {}",
            code,
            title,
            detail,
            trace,
            url
        ),
        StatusCode::NOT_FOUND => anyhow!(
            "CDS endpoint not found (HTTP 404); check the `url:` entry of .cdsapirc (expected https://cds.climate.copernicus.eu/api).\n\nServer message: {}\n{}\nrequest: {}",
            title,
            detail,
            url
        ),
        _ => anyhow!(
            "CDS request failed: HTTP {} for url ({})\n{}\n{}",
            code,
            url,
            title,
            detail
        ),
    }
}
