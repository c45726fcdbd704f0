use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;
use walkdir::WalkDir;

use crate::cli::InventoryArgs;
use crate::commands::{INVENTORY_MANIFEST_FILE, MANIFEST_DIR};
use crate::model::{MarkdownEntry, MarkdownInventoryManifest};
use crate::util::{now_utc_string, relative_display, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.input_dir)?;

    if args.dry_run {
        info!(
            document_count = manifest.document_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| default_manifest_path(&args.input_dir));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(document_count = manifest.document_count, "inventory completed");

    Ok(())
}

pub fn default_manifest_path(input_dir: &Path) -> PathBuf {
    input_dir.join(MANIFEST_DIR).join(INVENTORY_MANIFEST_FILE)
}

pub fn build_manifest(input_dir: &Path) -> Result<MarkdownInventoryManifest> {
    let paths = discover_markdown(input_dir)?;
    if paths.is_empty() {
        bail!("no markdown documents found in {}", input_dir.display());
    }

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::metadata(&path)
            .with_context(|| format!("failed to inspect {}", path.display()))?
            .len();
        let sha256 = sha256_file(&path)?;

        documents.push(MarkdownEntry {
            path: relative_display(input_dir, &path),
            bytes,
            sha256,
        });
    }

    Ok(MarkdownInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: input_dir.display().to_string(),
        document_count: documents.len(),
        documents,
    })
}

/// Markdown files under `input_dir`, recursively, in sorted path order.
pub fn discover_markdown(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(input_dir) {
        let entry = entry.with_context(|| format!("failed to walk {}", input_dir.display()))?;
        if entry.file_type().is_file() && is_markdown(entry.path()) {
            documents.push(entry.into_path());
        }
    }

    documents.sort();
    Ok(documents)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discover_markdown_recurses_and_sorts() {
        let dir = TempDir::new().expect("failed to create temp dir");
        let nested = dir.path().join("environment");
        fs::create_dir_all(&nested).expect("failed to create nested dir");
        fs::write(nested.join("gri_303.md"), "# GRI 303").expect("failed to write fixture");
        fs::write(dir.path().join("gri_2.MD"), "# GRI 2").expect("failed to write fixture");
        fs::write(dir.path().join("notes.txt"), "not markdown").expect("failed to write fixture");

        let found = discover_markdown(dir.path()).expect("discovery should succeed");
        assert_eq!(
            found,
            vec![dir.path().join("environment").join("gri_303.md"), dir.path().join("gri_2.MD")]
        );
    }

    #[test]
    fn build_manifest_records_relative_paths_and_hashes() {
        let dir = TempDir::new().expect("failed to create temp dir");
        fs::write(dir.path().join("gri_303.md"), "abc").expect("failed to write fixture");

        let manifest = build_manifest(dir.path()).expect("manifest should build");
        assert_eq!(manifest.document_count, 1);
        assert_eq!(manifest.documents[0].path, "gri_303.md");
        assert_eq!(manifest.documents[0].bytes, 3);
        assert_eq!(
            manifest.documents[0].sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn build_manifest_rejects_empty_directory() {
        let dir = TempDir::new().expect("failed to create temp dir");

        let err = build_manifest(dir.path()).expect_err("empty directory should fail");
        assert!(err.to_string().contains("no markdown documents"));
    }

    #[test]
    fn run_writes_manifest_under_input_directory() {
        let dir = TempDir::new().expect("failed to create temp dir");
        fs::write(dir.path().join("gri_303.md"), "# GRI 303").expect("failed to write fixture");

        run(InventoryArgs {
            input_dir: dir.path().to_path_buf(),
            manifest_path: None,
            dry_run: false,
        })
        .expect("inventory should succeed");

        assert!(default_manifest_path(dir.path()).exists());
    }
}
