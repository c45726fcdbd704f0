use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use chrono::Utc;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{info, warn};

use crate::cli::ConvertArgs;
use crate::commands::{CONVERT_MANIFEST_PREFIX, MANIFEST_DIR, inventory};
use crate::extract::{DisclosureParser, ExtractOptions, ExtractStats, UNKNOWN_SECTION};
use crate::model::{
    ConvertCounts, ConvertOptionsSnapshot, ConvertRunManifest, Document, DocumentReport,
};
use crate::util::{
    now_utc_string, read_markdown, relative_display, utc_compact_string, write_json_pretty,
};

const OUTPUT_SUFFIX: &str = "_converted.json";

#[derive(Debug)]
struct ConvertedDocument {
    source: String,
    sha256: String,
    document: Document,
    stats: ExtractStats,
}

pub fn run(args: ConvertArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("convert-{}", utc_compact_string(started_ts));

    let options = ExtractOptions {
        recovery_passes: !args.no_recovery,
        subitem_separator: args.subitem_separator.clone(),
    };
    let sources = resolve_sources(&args)?;

    info!(
        input_dir = %args.input_dir.display(),
        output_dir = %args.output_dir.display(),
        documents = sources.len(),
        recovery_passes = options.recovery_passes,
        run_id = %run_id,
        "starting conversion"
    );

    let parser = DisclosureParser::new()?;
    let outcomes = sources
        .par_iter()
        .map(|path| (path, convert_document(&parser, &args.input_dir, path, &options)))
        .collect::<Vec<(&PathBuf, Result<ConvertedDocument>)>>();

    let mut documents = Vec::with_capacity(outcomes.len());
    let mut warnings = Vec::new();
    let mut counts = ConvertCounts {
        document_count: sources.len(),
        converted_count: 0,
        failed_count: 0,
        groups_total: 0,
        items_total: 0,
        unknown_section_count: 0,
    };

    for (path, outcome) in outcomes {
        let converted = match outcome {
            Ok(converted) => converted,
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "failed to convert document");
                warnings.push(format!("{}: {err:#}", path.display()));
                counts.failed_count += 1;
                continue;
            }
        };

        warnings.extend(review_warnings(&converted));
        if args.preview {
            preview(&converted);
        }

        let output = if args.dry_run {
            None
        } else {
            let output_path = output_path(&args.output_dir, &args.input_dir, path);
            if let Err(err) = write_json_pretty(&output_path, &converted.document) {
                warn!(path = %output_path.display(), error = %format!("{err:#}"), "failed to write converted document");
                warnings.push(format!("{}: {err:#}", path.display()));
                counts.failed_count += 1;
                continue;
            }
            info!(
                path = %output_path.display(),
                groups = converted.document.groups.len(),
                items = converted.stats.items_total,
                "wrote converted document"
            );
            Some(output_path.display().to_string())
        };

        counts.converted_count += 1;
        counts.groups_total += converted.document.groups.len();
        counts.items_total += converted.stats.items_total;
        if converted.document.section == UNKNOWN_SECTION {
            counts.unknown_section_count += 1;
        }

        documents.push(DocumentReport {
            source: converted.source,
            sha256: converted.sha256,
            output,
            section: converted.document.section,
            section_source: converted.stats.section_source.clone(),
            group_count: converted.document.groups.len(),
            item_count: converted.stats.items_total,
            stats: converted.stats,
        });
    }

    if args.dry_run {
        info!(
            converted = counts.converted_count,
            failed = counts.failed_count,
            groups = counts.groups_total,
            items = counts.items_total,
            "conversion dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.output_dir.join(MANIFEST_DIR).join(format!(
            "{CONVERT_MANIFEST_PREFIX}{}.json",
            utc_compact_string(started_ts)
        ))
    });

    let status = if warnings.is_empty() {
        "completed"
    } else {
        "completed_with_warnings"
    };
    let manifest = ConvertRunManifest {
        manifest_version: 1,
        run_id,
        status: status.to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_convert_command(&args),
        input_directory: args.input_dir.display().to_string(),
        output_directory: args.output_dir.display().to_string(),
        options: ConvertOptionsSnapshot {
            recovery_passes: options.recovery_passes,
            subitem_separator: options.subitem_separator,
        },
        counts,
        documents,
        warnings,
    };

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote conversion manifest");
    info!(
        converted = manifest.counts.converted_count,
        failed = manifest.counts.failed_count,
        groups = manifest.counts.groups_total,
        items = manifest.counts.items_total,
        status = %manifest.status,
        "conversion completed"
    );

    Ok(())
}

fn resolve_sources(args: &ConvertArgs) -> Result<Vec<PathBuf>> {
    if !args.inputs.is_empty() {
        return Ok(args.inputs.clone());
    }

    let sources = inventory::discover_markdown(&args.input_dir)?;
    if sources.is_empty() {
        bail!("no markdown documents found in {}", args.input_dir.display());
    }

    Ok(sources)
}

fn convert_document(
    parser: &DisclosureParser,
    input_dir: &Path,
    path: &Path,
    options: &ExtractOptions,
) -> Result<ConvertedDocument> {
    let (text, sha256) = read_markdown(path)?;
    let (document, stats) = parser.parse_with_stats(&text, options);

    Ok(ConvertedDocument {
        source: relative_display(input_dir, path),
        sha256,
        document,
        stats,
    })
}

/// Data-quality findings that need a human to look at the source document.
fn review_warnings(converted: &ConvertedDocument) -> Vec<String> {
    let mut warnings = Vec::new();

    if converted.document.section == UNKNOWN_SECTION {
        warn!(source = %converted.source, "no section number found; needs manual review");
        warnings.push(format!(
            "{}: section unknown ({UNKNOWN_SECTION}), needs manual review",
            converted.source
        ));
    }

    if !converted.stats.empty_headers.is_empty() {
        let headers = converted.stats.empty_headers.join(", ");
        warn!(source = %converted.source, headers = %headers, "disclosure headers without items");
        warnings.push(format!(
            "{}: no items extracted for {headers}",
            converted.source
        ));
    }

    warnings
}

fn preview(converted: &ConvertedDocument) {
    info!(
        source = %converted.source,
        section = %converted.document.section,
        groups = converted.document.groups.len(),
        "preview"
    );
    for group in &converted.document.groups {
        info!(title = %group.title, items = group.items.len(), "group");
        for item in &group.items {
            info!(clause = %item.clause, query = %item.query, "item");
        }
    }
}

/// `<output_dir>/<relative dir>/<stem>_converted.json`, mirroring the
/// source's position under the input directory.
pub(super) fn output_path(output_dir: &Path, input_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let file_name = format!("{stem}{OUTPUT_SUFFIX}");

    match source
        .strip_prefix(input_dir)
        .ok()
        .and_then(|relative| relative.parent())
    {
        Some(relative_dir) => output_dir.join(relative_dir).join(file_name),
        None => output_dir.join(file_name),
    }
}

pub(super) fn render_convert_command(args: &ConvertArgs) -> String {
    let mut command = vec![
        "gri-extract".to_string(),
        "convert".to_string(),
        "--input-dir".to_string(),
        args.input_dir.display().to_string(),
        "--output-dir".to_string(),
        args.output_dir.display().to_string(),
    ];

    for input in &args.inputs {
        command.push("--input".to_string());
        command.push(input.display().to_string());
    }
    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if args.no_recovery {
        command.push("--no-recovery".to_string());
    }
    if args.subitem_separator != crate::extract::DEFAULT_SUBITEM_SEPARATOR {
        command.push("--subitem-separator".to_string());
        command.push(args.subitem_separator.clone());
    }
    if args.preview {
        command.push("--preview".to_string());
    }
    if args.dry_run {
        command.push("--dry-run".to_string());
    }

    command.join(" ")
}
