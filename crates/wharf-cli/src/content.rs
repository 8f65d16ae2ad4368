use std::path::PathBuf;

use nu_ansi_term::Color::{Cyan, Green};
use tracing::info;
use wharf_core::{content::CreateContent, tasking::VersionRef, WharfResult};
use wharf_db::models::content::Content;
use wharf_operations::{content, ContentQuery, WharfContext};
use wharf_utils::path::resolve_path;

use crate::utils::{json_output, or_dash, print_json, print_record, print_table, Colored};

pub async fn import_artifact(ctx: &WharfContext, path: &str) -> WharfResult<()> {
    let path: PathBuf = resolve_path(path)?;
    let artifact = content::import_artifact(ctx, path).await?;

    if json_output() {
        return print_json(&artifact);
    }

    info!(
        "{} {} ({} bytes)",
        Colored(Green, "Stored"),
        Colored(Cyan, &artifact.digest),
        artifact.size
    );
    Ok(())
}

pub fn list_artifacts(ctx: &WharfContext) -> WharfResult<()> {
    let artifacts = content::list_artifacts(ctx)?;

    if json_output() {
        return print_json(&artifacts);
    }

    let rows = artifacts
        .into_iter()
        .map(|artifact| {
            [
                artifact.digest,
                artifact.size.to_string(),
                artifact.created_at,
            ]
        })
        .collect();
    print_table("Artifacts", &["Digest", "Size", "Created"], rows);
    Ok(())
}

pub async fn create_content(
    ctx: &WharfContext,
    artifact: Option<String>,
    filename: Option<String>,
) -> WharfResult<()> {
    let unit = content::create_content(
        ctx,
        CreateContent {
            artifact,
            filename,
        },
    )
    .await?;

    if json_output() {
        return print_json(&unit);
    }

    info!(
        "{} {}-{} as #{}",
        Colored(Green, "Created"),
        Colored(Cyan, &unit.name),
        unit.version,
        unit.id
    );
    Ok(())
}

pub fn list_content(
    ctx: &WharfContext,
    filters: Vec<String>,
    repository_version: Option<VersionRef>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> WharfResult<()> {
    let units = content::list_content(
        ctx,
        &ContentQuery {
            filters,
            repository_version,
            limit,
            offset,
        },
    )?;

    if json_output() {
        return print_json(&units);
    }

    let rows = units
        .into_iter()
        .map(|unit| {
            [
                unit.id.to_string(),
                unit.name,
                unit.version,
                unit.packagetype,
                unit.filename,
            ]
        })
        .collect();
    print_table(
        "Content",
        &["ID", "Name", "Version", "Type", "Filename"],
        rows,
    );
    Ok(())
}

pub fn show_content(ctx: &WharfContext, id: i32) -> WharfResult<()> {
    let unit = content::show_content(ctx, id)?;

    if json_output() {
        return print_json(&unit);
    }

    print_record(&format!("Content #{}", unit.id), content_fields(unit));
    Ok(())
}

fn content_fields(unit: Content) -> Vec<(&'static str, String)> {
    let classifiers = unit
        .classifiers
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    vec![
        ("Name", unit.name),
        ("Version", unit.version),
        ("Type", unit.packagetype),
        ("Filename", unit.filename),
        ("Artifact", unit.artifact_digest),
        ("Metadata version", or_dash(unit.metadata_version)),
        ("Summary", or_dash(unit.summary)),
        ("Author", or_dash(unit.author)),
        ("Author email", or_dash(unit.author_email)),
        ("License", or_dash(unit.license)),
        ("Keywords", or_dash(unit.keywords)),
        ("Home page", or_dash(unit.home_page)),
        ("Requires python", or_dash(unit.requires_python)),
        ("Requires dist", unit.requires_dist.join("\n")),
        ("Classifiers", classifiers),
        ("Created", unit.created_at),
    ]
}
