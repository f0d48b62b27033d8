//! Asset manifest: the JSON list of cues handed to `scoretag analyze`.
//!
//! ```json
//! [
//!   {
//!     "name": "heat-01.wav",
//!     "path": "cues/heat-01.wav",
//!     "features": [0.12, 0.4],
//!     "context": { "filmType": "警匪片" },
//!     "metadata": { "album": "Heat Original Soundtrack" }
//!   }
//! ]
//! ```
//!
//! Relative paths resolve against the manifest's directory.

use anyhow::{bail, Context, Result};
use scoretag_core::models::{ClassificationContext, FileMetadata};
use scoretag_core::pipeline::Asset;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    features: Vec<f32>,
    #[serde(default)]
    context: ClassificationContext,
    #[serde(default)]
    metadata: FileMetadata,
}

impl ManifestEntry {
    fn into_asset(self, base_dir: &Path, index: usize) -> Result<Asset> {
        let path = self.path.map(|p| if p.is_absolute() { p } else { base_dir.join(p) });
        let name = match (self.name, &path) {
            (Some(name), _) if !name.trim().is_empty() => name,
            (_, Some(path)) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .with_context(|| format!("manifest entry {} has no usable name", index))?,
            _ => bail!("manifest entry {} needs a name or a path", index),
        };

        let mut asset = Asset::new(name)
            .with_features(self.features)
            .with_context(self.context)
            .with_metadata(self.metadata);
        if let Some(path) = path {
            asset = asset.with_path(path);
        }
        Ok(asset)
    }
}

/// Parse manifest JSON into assets.
pub fn parse(json: &str, base_dir: &Path) -> Result<Vec<Asset>> {
    let entries: Vec<ManifestEntry> =
        serde_json::from_str(json).context("manifest is not a JSON array of assets")?;
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| entry.into_asset(base_dir, index))
        .collect()
}

/// Read and parse a manifest file.
pub async fn load(path: &Path) -> Result<Vec<Asset>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse(&json, base_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoretag_core::identity::AssetContent;

    #[test]
    fn test_relative_paths_resolve_against_manifest_dir() {
        let json = r#"[{"path": "cues/heat-01.wav", "features": [0.5]}]"#;
        let assets = parse(json, Path::new("/library")).unwrap();

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].name, "heat-01.wav");
        match &assets[0].content {
            AssetContent::Path(path) => assert_eq!(path, Path::new("/library/cues/heat-01.wav")),
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn test_context_and_metadata_are_camel_case() {
        let json = r#"[{
            "name": "cue.wav",
            "context": {"filmType": "警匪片", "primaryEmotion": "紧张"},
            "metadata": {"albumArtist": "Elliot Goldenthal"}
        }]"#;
        let assets = parse(json, Path::new(".")).unwrap();

        assert_eq!(assets[0].context.film_type.as_deref(), Some("警匪片"));
        assert_eq!(assets[0].context.primary_emotion.as_deref(), Some("紧张"));
        assert_eq!(
            assets[0].metadata.album_artist.as_deref(),
            Some("Elliot Goldenthal")
        );
        assert!(matches!(assets[0].content, AssetContent::Unavailable));
    }

    #[test]
    fn test_entry_without_name_or_path_is_rejected() {
        let err = parse(r#"[{"features": [1.0]}]"#, Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("entry 0"));
    }

    #[tokio::test]
    async fn test_load_reads_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let manifest = temp.path().join("assets.json");
        std::fs::write(&manifest, r#"[{"name": "a.wav", "path": "a.wav"}]"#).unwrap();

        let assets = load(&manifest).await.unwrap();
        assert!(matches!(
            &assets[0].content,
            AssetContent::Path(path) if path == &temp.path().join("a.wav")
        ));
    }
}
