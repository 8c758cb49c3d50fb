//! Request payloads stored on disk, used by `supplier-scraper-api run`.

use std::path::{Path, PathBuf};

use supplier_scraper::{ScrapeError, ScrapeRequest, ScrapeResult, Site};

/// File name `run` reads when no payload path is given.
pub fn default_payload_file(site: Site) -> &'static str {
    match site {
        Site::Eklor => "payload_e.json",
        Site::PowrConnect => "payload_pc.json",
        Site::Voltaneo => "payload_v.json",
    }
}

/// Resolve the payload path for `site`, falling back to the default file
/// in the current directory.
pub fn resolve_payload_path(site: Site, explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| PathBuf::from(default_payload_file(site)))
}

/// Read and parse a payload file.
pub fn load(path: &Path) -> ScrapeResult<ScrapeRequest> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ScrapeError::InvalidInput(format!("cannot read payload {}: {e}", path.display()))
    })?;
    let request: ScrapeRequest = serde_json::from_str(&raw)?;
    if request.items.is_empty() {
        tracing::warn!("payload {} lists no items", path.display());
    }
    Ok(request)
}
