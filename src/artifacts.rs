// SPDX-License-Identifier: AGPL-3.0-or-later
//! Artifact download and verification
//!
//! Downloads go through `curl`, checksum manifests through `sha512sum -c`.
//! A failed download and a failed integrity check are different errors:
//! the first is worth retrying, the second means the artifact must not be
//! trusted.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::ArtifactsConfig;
use crate::error::{Result, SetupError};
use crate::report::Advisory;
use crate::runner::{CommandExecutor, Invocation};

/// How a downloaded artifact is checked before use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Nothing to check (the manifest itself)
    None,
    /// `sha512sum -c` with the digest a manifest lists for this artifact
    Checksum { manifest: PathBuf },
    /// Must exist and be at least this many bytes
    MinimumSize(u64),
}

/// A remote file and its local destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub url: String,
    pub destination: PathBuf,
    pub verification: Verification,
}

impl Artifact {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>, verification: Verification) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            verification,
        }
    }
}

/// Downloaded paths plus any weaker-guarantee advisories
#[derive(Debug, Default)]
pub struct FetchReport {
    pub paths: Vec<PathBuf>,
    pub advisories: Vec<Advisory>,
}

/// The compose file and its SHA512 manifest
pub fn compose_artifacts(config: &ArtifactsConfig) -> Vec<Artifact> {
    vec![
        Artifact::new(
            &config.compose_url,
            &config.compose_path,
            Verification::Checksum {
                manifest: config.checksum_path.clone(),
            },
        ),
        Artifact::new(&config.checksum_url, &config.checksum_path, Verification::None),
    ]
}

/// The repository setup script used by package installs
pub fn installer_artifact(config: &ArtifactsConfig) -> Artifact {
    Artifact::new(
        &config.installer_url,
        &config.installer_path,
        Verification::MinimumSize(config.installer_min_bytes),
    )
}

/// Downloads and verifies artifacts through a [`CommandExecutor`]
pub struct ArtifactFetcher<'a, E: CommandExecutor + ?Sized> {
    runner: &'a E,
}

impl<'a, E: CommandExecutor + ?Sized> ArtifactFetcher<'a, E> {
    pub fn new(runner: &'a E) -> Self {
        Self { runner }
    }

    /// Download every artifact, then verify each one
    ///
    /// All downloads finish before verification starts because a checksum
    /// artifact needs its manifest on disk.
    pub async fn fetch_and_verify(&self, artifacts: &[Artifact]) -> Result<FetchReport> {
        for artifact in artifacts {
            self.download(artifact).await?;
        }

        let mut report = FetchReport::default();
        for artifact in artifacts {
            if let Some(advisory) = self.verify(artifact).await? {
                report.advisories.push(advisory);
            }
            report.paths.push(artifact.destination.clone());
        }
        Ok(report)
    }

    async fn download(&self, artifact: &Artifact) -> Result<()> {
        let name = file_label(&artifact.destination);
        let invocation = Invocation::new(
            format!("Downloading {}", name),
            "curl",
            [
                "-fsSL".to_string(),
                artifact.url.clone(),
                "-o".to_string(),
                artifact.destination.display().to_string(),
            ],
        )
        .captured();

        info!(url = %artifact.url, destination = %artifact.destination.display(), "Downloading artifact");
        self.runner
            .execute(&invocation)
            .await
            .map(|_| ())
            .map_err(|e| SetupError::DownloadFailed {
                url: artifact.url.clone(),
                message: failure_detail(e),
            })
    }

    async fn verify(&self, artifact: &Artifact) -> Result<Option<Advisory>> {
        match &artifact.verification {
            Verification::None => Ok(None),
            Verification::Checksum { manifest } => {
                self.verify_checksum(artifact, manifest).await?;
                Ok(None)
            }
            Verification::MinimumSize(min_bytes) => {
                check_minimum_size(artifact, *min_bytes)?;
                warn!(
                    path = %artifact.destination.display(),
                    "Installer accepted on size alone"
                );
                Ok(Some(Advisory::InstallerUnverified {
                    path: artifact.destination.display().to_string(),
                }))
            }
        }
    }

    /// Check the downloaded file against its manifest entry
    ///
    /// Only the digest is taken from the manifest. `sha512sum -c` runs on a
    /// one-line listing pinned next to the destination, so a same-named file
    /// beside the manifest is never what gets checked.
    async fn verify_checksum(&self, artifact: &Artifact, manifest: &Path) -> Result<()> {
        let name = file_label(&artifact.destination);
        let integrity = |detail: String| SetupError::IntegrityCheckFailed {
            artifact: artifact.destination.display().to_string(),
            detail,
        };

        let listing = tokio::fs::read_to_string(manifest)
            .await
            .map_err(|e| integrity(format!("cannot read {}: {}", manifest.display(), e)))?;
        let digest = manifest_digest(&listing, &name)
            .ok_or_else(|| integrity(format!("no entry for {} in {}", name, manifest.display())))?;

        let dir = parent_dir(&artifact.destination);
        let mut pinned = tempfile::Builder::new()
            .prefix(".sha512-")
            .suffix(".txt")
            .tempfile_in(dir)?;
        writeln!(pinned, "{}  {}", digest, name)?;
        pinned.flush()?;

        let invocation = Invocation::new(
            format!("Verifying integrity of {}", name),
            "sha512sum",
            ["-c".to_string(), file_label(pinned.path())],
        )
        .captured()
        .in_dir(dir);

        debug!(artifact = %artifact.destination.display(), manifest = %manifest.display(), "Verifying checksum");
        self.runner
            .execute(&invocation)
            .await
            .map(|_| ())
            .map_err(|e| integrity(failure_detail(e)))
    }
}

/// Digest listed for `name` in a `sha512sum`-style manifest
fn manifest_digest<'m>(listing: &'m str, name: &str) -> Option<&'m str> {
    listing.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let digest = fields.next()?;
        let listed = fields.next()?.trim_start_matches('*');
        let listed = Path::new(listed).file_name()?.to_str()?;
        (listed == name && !digest.is_empty() && digest.chars().all(|c| c.is_ascii_hexdigit())).then_some(digest)
    })
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn check_minimum_size(artifact: &Artifact, min_bytes: u64) -> Result<()> {
    let size = std::fs::metadata(&artifact.destination)
        .map(|m| m.len())
        .unwrap_or(0);

    if size < min_bytes {
        return Err(SetupError::DownloadFailed {
            url: artifact.url.clone(),
            message: format!(
                "{} was not downloaded correctly ({} bytes, expected at least {})",
                artifact.destination.display(),
                size,
                min_bytes
            ),
        });
    }
    Ok(())
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn failure_detail(error: SetupError) -> String {
    match error {
        SetupError::CommandFailed { stdout, stderr, .. } => {
            let combined = format!("{}{}", stdout, stderr);
            let combined = combined.trim();
            if combined.is_empty() {
                "no output".to_string()
            } else {
                combined.to_string()
            }
        }
        other => other.to_string(),
    }
}
