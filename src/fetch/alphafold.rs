//! AlphaFold database fetcher.
//!
//! Resolves an accession through the prediction API
//! (`{base}/api/prediction/{accession}`), then downloads the first listed
//! PDB file to `{output_dir}/{accession}.pdb`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{Fetch, FetchError, FetchSession};
use crate::dispatch::Task;

/// Public AlphaFold database endpoint.
pub const DEFAULT_BASE_URL: &str = "https://alphafold.ebi.ac.uk";

/// One model entry of a prediction response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictionEntry {
    #[serde(default)]
    entry_id: Option<String>,
    #[serde(default)]
    pdb_url: Option<String>,
}

/// Fetches predicted structures from an AlphaFold-compatible service.
#[derive(Debug, Clone)]
pub struct AlphaFoldFetcher {
    session: FetchSession,
    base_url: Url,
}

impl AlphaFoldFetcher {
    /// Creates a fetcher rooted at `base_url`.
    #[must_use]
    pub fn new(session: FetchSession, mut base_url: Url) -> Self {
        // `Url::join` replaces the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { session, base_url }
    }

    /// Session shared by this fetcher.
    #[must_use]
    pub fn session(&self) -> &FetchSession {
        &self.session
    }

    /// Prediction metadata URL for `accession`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidAccession`] for accessions that are not a
    /// plain identifier, and [`FetchError::InvalidUrl`] if joining fails.
    pub fn prediction_url(&self, accession: &str) -> Result<Url, FetchError> {
        validate_accession(accession)?;
        let path = format!("api/prediction/{accession}");
        self.base_url
            .join(&path)
            .map_err(|_| FetchError::invalid_url(format!("{}{path}", self.base_url)))
    }

    /// Where the structure for `accession` is written.
    #[must_use]
    pub fn output_path(output_dir: &Path, accession: &str) -> PathBuf {
        output_dir.join(format!("{accession}.pdb"))
    }

    async fn structure_url(&self, accession: &str) -> Result<String, FetchError> {
        let url = self.prediction_url(accession)?;
        let body = self.session.get_text(url.as_str()).await?;
        let entries: Vec<PredictionEntry> =
            serde_json::from_str(&body).map_err(|source| FetchError::Decode {
                url: url.to_string(),
                source,
            })?;

        let (entry_id, pdb_url) = entries
            .into_iter()
            .find_map(|entry| entry.pdb_url.map(|pdb_url| (entry.entry_id, pdb_url)))
            .ok_or_else(|| FetchError::missing_structure(accession))?;
        debug!(entry_id = ?entry_id, pdb_url = %pdb_url, "resolved prediction entry");
        Ok(pdb_url)
    }
}

#[async_trait]
impl Fetch for AlphaFoldFetcher {
    #[instrument(skip(self, task), fields(accession = %task.accession()))]
    async fn fetch(&self, task: &Task) -> Result<PathBuf, FetchError> {
        let accession = task.accession();
        let pdb_url = self.structure_url(accession).await?;
        let destination = Self::output_path(task.output_dir(), accession);
        self.session.download_to(&pdb_url, &destination).await?;
        Ok(destination)
    }
}

/// Accepts the characters UniProt accessions and AlphaFold entry ids use.
fn validate_accession(accession: &str) -> Result<(), FetchError> {
    let valid = !accession.is_empty()
        && accession
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !accession.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(FetchError::invalid_accession(accession))
    }
}
