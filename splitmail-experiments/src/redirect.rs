//! Redirect target selection for tracking links.

use url::Url;

use crate::error::{Error, Result};

/// Pick where a tracking-link click is sent.
///
/// The first non-empty candidate among the `redirect` query parameter and the
/// experiment's stored URL is used, otherwise `default`. A chosen candidate
/// that does not parse is replaced by `default`; one that parses with a
/// scheme other than http or https is rejected.
pub fn resolve_redirect(
    requested: Option<&str>,
    stored: Option<&str>,
    default: &str,
) -> Result<Url> {
    let chosen = [requested, stored]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty());

    if let Some(Ok(url)) = chosen.map(Url::parse) {
        return ensure_web_scheme(url);
    }

    Url::parse(default)
        .map_err(|e| Error::InvalidRedirect(format!("default redirect {default:?}: {e}")))
        .and_then(ensure_web_scheme)
}

fn ensure_web_scheme(url: Url) -> Result<Url> {
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidRedirect(format!(
            "scheme '{other}' is not allowed"
        ))),
    }
}
