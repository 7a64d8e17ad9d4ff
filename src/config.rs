use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

/// Name of the per-user CDS credentials file.
pub const RC_FILE_NAME: &str = ".cdsapirc";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base CDS API URL, typically `https://cds.climate.copernicus.eu/api`.
    pub url: String,
    /// Personal access token.
    pub key: String,
    /// Whether to verify TLS certificates.
    pub verify: bool,
}

#[derive(Debug, Default, PartialEq)]
struct RcConfig {
    url: Option<String>,
    key: Option<String>,
    verify: Option<bool>,
}

/// Location of the credentials file: `CDSAPI_RC` if set, otherwise `~/.cdsapirc`.
pub fn credentials_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CDSAPI_RC") {
        return Some(PathBuf::from(p));
    }
    dirs::home_dir().map(|home| home.join(RC_FILE_NAME))
}

/// Resolves the client configuration. Precedence, per field:
/// explicit argument, then `CDSAPI_URL` / `CDSAPI_KEY`, then the rc file.
pub(crate) fn load_config(
    url: Option<String>,
    key: Option<String>,
    verify: Option<bool>,
    rc_path: Option<&Path>,
) -> Result<ClientConfig> {
    let mut url = url.or_else(|| std::env::var("CDSAPI_URL").ok());
    let mut key = key.or_else(|| std::env::var("CDSAPI_KEY").ok());
    let mut file_verify = None;

    if let Some(rc_path) = rc_path.filter(|p| p.exists()) {
        if url.is_none() || key.is_none() || verify.is_none() {
            let cfg = read_rc(rc_path).with_context(|| {
                format!("failed to read configuration file {}", rc_path.display())
            })?;
            url = url.or(cfg.url);
            key = key.or(cfg.key);
            file_verify = cfg.verify;
        }
    }

    let location = rc_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| RC_FILE_NAME.to_string());

    let Some(url) = url else {
        bail!("missing configuration: url (set CDSAPI_URL or put `url:` in {location})");
    };
    let Some(key) = key else {
        bail!("missing configuration: key (set CDSAPI_KEY or put `key:` in {location})");
    };

    Ok(ClientConfig {
        url,
        key,
        verify: verify.or(file_verify).unwrap_or(true),
    })
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // `key:` may be left empty with the token on the following line.
    let mut pending: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(field) = pending.take() {
            if !line.contains(':') {
                cfg.set(field, strip_quotes(line));
                continue;
            }
        }

        let Some((k, v)) = line.split_once(':') else {
            continue;
        };
        let k = k.trim();
        let v = strip_quotes(v);
        match k {
            "url" | "key" if v.is_empty() => pending = Some(k),
            "url" | "key" => cfg.set(k, v),
            "verify" if !v.is_empty() => cfg.verify = Some(v != "0"),
            _ => {}
        }
    }

    cfg
}

impl RcConfig {
    fn set(&mut self, field: &str, value: &str) {
        match field {
            "url" => self.url = Some(value.to_string()),
            "key" => self.key = Some(value.to_string()),
            _ => {}
        }
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
