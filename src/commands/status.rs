use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::{CONVERT_MANIFEST_PREFIX, MANIFEST_DIR, inventory};
use crate::model::{ConvertRunManifest, MarkdownInventoryManifest};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let inventory_path = inventory::default_manifest_path(&args.input_dir);

    info!(
        input_dir = %args.input_dir.display(),
        output_dir = %args.output_dir.display(),
        "status requested"
    );

    if inventory_path.exists() {
        let inventory: MarkdownInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            document_count = inventory.document_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    match latest_convert_manifest(&args.output_dir.join(MANIFEST_DIR))? {
        Some(path) => {
            let manifest: ConvertRunManifest = read_json(&path)?;
            info!(
                path = %path.display(),
                run_id = %manifest.run_id,
                status = %manifest.status,
                updated_at = %manifest.updated_at,
                converted = manifest.counts.converted_count,
                failed = manifest.counts.failed_count,
                groups = manifest.counts.groups_total,
                items = manifest.counts.items_total,
                unknown_sections = manifest.counts.unknown_section_count,
                "loaded conversion manifest"
            );
            for warning in &manifest.warnings {
                warn!(warning = %warning, "conversion warning");
            }
        }
        None => warn!(
            path = %args.output_dir.join(MANIFEST_DIR).display(),
            "no conversion manifest found"
        ),
    }

    Ok(())
}

/// Newest `convert_run_*.json` in `manifest_dir`; the compact timestamp in
/// the name sorts chronologically.
fn latest_convert_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.is_dir() {
        return Ok(None);
    }

    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;

    let mut latest: Option<PathBuf> = None;
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?
            .path();
        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(CONVERT_MANIFEST_PREFIX) && name.ends_with(".json"));

        if is_run_manifest && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn latest_convert_manifest_picks_newest_run() {
        let dir = TempDir::new().expect("failed to create temp dir");
        for name in [
            "convert_run_20260101T000000Z.json",
            "convert_run_20260301T120000Z.json",
            "convert_run_20260201T000000Z.json",
            "markdown_inventory.json",
        ] {
            fs::write(dir.path().join(name), "{}").expect("failed to write fixture");
        }

        let latest = latest_convert_manifest(dir.path())
            .expect("scan should succeed")
            .expect("a run manifest should be found");
        assert_eq!(
            latest.file_name().and_then(|name| name.to_str()),
            Some("convert_run_20260301T120000Z.json")
        );
    }

    #[test]
    fn missing_manifest_directory_is_not_an_error() {
        let dir = TempDir::new().expect("failed to create temp dir");

        let latest =
            latest_convert_manifest(&dir.path().join(MANIFEST_DIR)).expect("scan should succeed");
        assert!(latest.is_none());
    }

    #[test]
    fn status_runs_without_manifests() {
        let dir = TempDir::new().expect("failed to create temp dir");

        run(StatusArgs {
            input_dir: dir.path().join("md_input"),
            output_dir: dir.path().join("output_json"),
        })
        .expect("status should only warn about missing manifests");
    }
}
