use std::time::Duration;

pub(crate) fn backoff(current: Duration, max: Duration) -> Duration {
    let next = Duration::from_secs_f64((current.as_secs_f64() * 1.5).max(1.0));
    next.min(max)
}

pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Appends `k=v` pairs; values are expected to be URL-safe already.
pub(crate) fn append_query(url: &str, params: &[(&str, &str)]) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}{}{}", url, sep, query)
}

/// Renders a finite float the way Python's `str()` does: integral values keep a
/// trailing `.0`, and magnitudes below 1e-4 or from 1e16 up switch to
/// `1.5e-05` / `1e+16` notation.
pub(crate) fn python_float(v: f64) -> String {
    let abs = v.abs();
    if v.is_finite() && v != 0.0 && !(1e-4..1e16).contains(&abs) {
        let sci = format!("{:e}", v);
        let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exp.abs());
    }
    if v.is_finite() && v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}
