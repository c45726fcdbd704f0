use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::run::{output_path, render_convert_command};
use super::*;
use crate::cli::ConvertArgs;
use crate::commands::{CONVERT_MANIFEST_PREFIX, MANIFEST_DIR};
use crate::extract::DEFAULT_SUBITEM_SEPARATOR;
use crate::model::{ConvertRunManifest, Document};

const WATER_MARKDOWN: &str = "\
# GRI 303: Water and Effluents

## Disclosure 303-1 Interactions with water as a shared resource
Requirements
a. A description of how the organization interacts with water
b. A description of the approach used to identify water-related impacts
";

const UNNUMBERED_MARKDOWN: &str = "\
# Notes

Nothing in this file carries a disclosure number.
";

fn convert_args(input_dir: &Path, output_dir: &Path) -> ConvertArgs {
    ConvertArgs {
        input_dir: input_dir.to_path_buf(),
        inputs: Vec::new(),
        output_dir: output_dir.to_path_buf(),
        manifest_path: None,
        no_recovery: false,
        subitem_separator: DEFAULT_SUBITEM_SEPARATOR.to_string(),
        preview: false,
        dry_run: false,
    }
}

fn write_markdown(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create input subdirectory");
    }
    fs::write(&path, content).expect("failed to write markdown fixture");
    path
}

fn load_run_manifest(output_dir: &Path) -> ConvertRunManifest {
    let manifest_dir = output_dir.join(MANIFEST_DIR);
    let path = fs::read_dir(&manifest_dir)
        .expect("manifest directory should exist")
        .map(|entry| entry.expect("manifest entry should be readable").path())
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(CONVERT_MANIFEST_PREFIX))
        })
        .expect("conversion manifest should be written");

    let raw = fs::read(path).expect("manifest should be readable");
    serde_json::from_slice(&raw).expect("manifest should parse")
}

#[test]
fn convert_writes_document_and_manifest() {
    let input = TempDir::new().expect("failed to create input dir");
    let output = TempDir::new().expect("failed to create output dir");
    write_markdown(input.path(), "gri_303.md", WATER_MARKDOWN);

    run(convert_args(input.path(), output.path())).expect("conversion should succeed");

    let raw = fs::read(output.path().join("gri_303_converted.json"))
        .expect("converted document should be written");
    let document: Document = serde_json::from_slice(&raw).expect("converted document should parse");
    assert_eq!(document.section, "303");
    assert_eq!(document.groups.len(), 1);
    assert_eq!(
        document.groups[0].title,
        "303-1 Interactions with water as a shared resource"
    );
    assert_eq!(document.groups[0].items.len(), 2);

    let manifest = load_run_manifest(output.path());
    assert_eq!(manifest.status, "completed");
    assert_eq!(manifest.counts.document_count, 1);
    assert_eq!(manifest.counts.converted_count, 1);
    assert_eq!(manifest.counts.items_total, 2);
    assert_eq!(manifest.documents[0].source, "gri_303.md");
    assert_eq!(manifest.documents[0].section_source, "disclosure_header");
    assert!(manifest.warnings.is_empty());
}

#[test]
fn converted_json_keeps_non_ascii_text() {
    let input = TempDir::new().expect("failed to create input dir");
    let output = TempDir::new().expect("failed to create output dir");
    write_markdown(
        input.path(),
        "gri_303_zh.md",
        "## 揭露項目 **303-1** 與水的互動\n要求\n**a.** 描述組織如何與水互動，包括取水、耗水和排水的方式\n",
    );

    run(convert_args(input.path(), output.path())).expect("conversion should succeed");

    let text = fs::read_to_string(output.path().join("gri_303_zh_converted.json"))
        .expect("converted document should be written");
    assert!(text.contains("與水的互動"));
    assert!(text.ends_with("}\n"));
}

#[test]
fn unknown_section_is_reported_as_warning() {
    let input = TempDir::new().expect("failed to create input dir");
    let output = TempDir::new().expect("failed to create output dir");
    write_markdown(input.path(), "notes.md", UNNUMBERED_MARKDOWN);

    run(convert_args(input.path(), output.path())).expect("conversion should succeed");

    let manifest = load_run_manifest(output.path());
    assert_eq!(manifest.status, "completed_with_warnings");
    assert_eq!(manifest.counts.unknown_section_count, 1);
    assert!(manifest.warnings[0].contains("needs manual review"));
}

#[test]
fn unreadable_input_is_recorded_and_run_continues() {
    let input = TempDir::new().expect("failed to create input dir");
    let output = TempDir::new().expect("failed to create output dir");
    let present = write_markdown(input.path(), "gri_303.md", WATER_MARKDOWN);

    let mut args = convert_args(input.path(), output.path());
    args.inputs = vec![input.path().join("missing.md"), present];
    run(args).expect("conversion should continue past a missing file");

    let manifest = load_run_manifest(output.path());
    assert_eq!(manifest.status, "completed_with_warnings");
    assert_eq!(manifest.counts.failed_count, 1);
    assert_eq!(manifest.counts.converted_count, 1);
    assert!(output.path().join("gri_303_converted.json").exists());
}

#[test]
fn failed_output_write_is_recorded_and_run_continues() {
    let input = TempDir::new().expect("failed to create input dir");
    let output = TempDir::new().expect("failed to create output dir");
    write_markdown(input.path(), "blocked/gri_306.md", WATER_MARKDOWN);
    write_markdown(input.path(), "gri_303.md", WATER_MARKDOWN);
    // A regular file where the mirrored output subdirectory belongs.
    fs::write(output.path().join("blocked"), "").expect("failed to write blocking file");

    run(convert_args(input.path(), output.path()))
        .expect("conversion should continue past a failed write");

    let manifest = load_run_manifest(output.path());
    assert_eq!(manifest.status, "completed_with_warnings");
    assert_eq!(manifest.counts.failed_count, 1);
    assert_eq!(manifest.counts.converted_count, 1);
    assert_eq!(manifest.documents.len(), 1);
    assert_eq!(manifest.documents[0].source, "gri_303.md");
    assert!(manifest.warnings[0].contains("gri_306.md"));
    assert!(output.path().join("gri_303_converted.json").exists());
}

#[test]
fn dry_run_writes_nothing() {
    let input = TempDir::new().expect("failed to create input dir");
    let output = TempDir::new().expect("failed to create output dir");
    write_markdown(input.path(), "gri_303.md", WATER_MARKDOWN);

    let mut args = convert_args(input.path(), output.path());
    args.dry_run = true;
    args.preview = true;
    run(args).expect("dry-run should succeed");

    let written = fs::read_dir(output.path())
        .expect("output dir should be readable")
        .count();
    assert_eq!(written, 0);
}

#[test]
fn empty_input_directory_is_an_error() {
    let input = TempDir::new().expect("failed to create input dir");
    let output = TempDir::new().expect("failed to create output dir");

    let err = run(convert_args(input.path(), output.path()))
        .expect_err("conversion without documents should fail");
    assert!(err.to_string().contains("no markdown documents"));
}

#[test]
fn output_path_mirrors_input_subdirectories() {
    let input = Path::new("md_input");
    let output = Path::new("output_json");

    assert_eq!(
        output_path(output, input, &input.join("environment").join("gri_303.md")),
        output.join("environment").join("gri_303_converted.json")
    );
    assert_eq!(
        output_path(output, input, Path::new("/elsewhere/gri_405.md")),
        output.join("gri_405_converted.json")
    );
}

#[test]
fn render_convert_command_lists_non_default_flags() {
    let mut args = convert_args(Path::new("md_input"), Path::new("output_json"));
    args.no_recovery = true;
    args.subitem_separator = "; ".to_string();
    args.inputs = vec![PathBuf::from("md_input/gri_303.md")];

    let command = render_convert_command(&args);
    assert!(command.starts_with("gri-extract convert --input-dir md_input --output-dir output_json"));
    assert!(command.contains("--input md_input/gri_303.md"));
    assert!(command.contains("--no-recovery"));
    assert!(command.contains("--subitem-separator ; "));
    assert!(!command.contains("--dry-run"));
}
