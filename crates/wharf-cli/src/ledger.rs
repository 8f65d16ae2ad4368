use nu_ansi_term::Color::{Cyan, Green};
use tracing::info;
use wharf_core::WharfResult;
use wharf_operations::{ledger, RemoteQuery, WharfContext};

use crate::utils::{json_output, or_dash, print_json, print_table, Colored};

pub fn create_repository(ctx: &WharfContext, name: &str) -> WharfResult<()> {
    let repository = ledger::create_repository(ctx, name)?;

    if json_output() {
        return print_json(&repository);
    }

    info!(
        "{} repository {}",
        Colored(Green, "Created"),
        Colored(Cyan, &repository.name)
    );
    Ok(())
}

pub fn list_repositories(ctx: &WharfContext) -> WharfResult<()> {
    let summaries = ledger::list_repositories(ctx)?;

    if json_output() {
        return print_json(&summaries);
    }

    let rows = summaries
        .into_iter()
        .map(|summary| {
            [
                summary.repository.name,
                summary.latest_version.to_string(),
                summary.content_count.to_string(),
                summary.repository.created_at,
            ]
        })
        .collect();
    print_table(
        "Repositories",
        &["Name", "Latest version", "Content", "Created"],
        rows,
    );
    Ok(())
}

pub fn list_versions(ctx: &WharfContext, repository: &str) -> WharfResult<()> {
    let versions = ledger::list_versions(ctx, repository)?;

    if json_output() {
        return print_json(&versions);
    }

    let rows = versions
        .into_iter()
        .map(|version| {
            [
                version.number.to_string(),
                version.content_count.to_string(),
                version.created_at,
            ]
        })
        .collect();
    print_table("Versions", &["Number", "Content", "Created"], rows);
    Ok(())
}

pub fn add_content(ctx: &WharfContext, repository: &str, content: &[i32]) -> WharfResult<()> {
    let version = ledger::add_content(ctx, repository, content)?;

    if json_output() {
        return print_json(&version);
    }

    info!(
        "{} {}@{} with {} content units",
        Colored(Green, "Created"),
        Colored(Cyan, &version.repository),
        version.number,
        version.content_count
    );
    Ok(())
}

pub fn create_remote(ctx: &WharfContext, name: &str, url: &str) -> WharfResult<()> {
    let remote = ledger::create_remote(ctx, name, url)?;

    if json_output() {
        return print_json(&remote);
    }

    info!(
        "{} remote {} -> {}",
        Colored(Green, "Created"),
        Colored(Cyan, &remote.name),
        remote.url
    );
    Ok(())
}

pub fn update_remote(ctx: &WharfContext, name: &str, url: &str) -> WharfResult<()> {
    let remote = ledger::update_remote(ctx, name, url)?;

    if json_output() {
        return print_json(&remote);
    }

    info!(
        "{} remote {} -> {}",
        Colored(Green, "Updated"),
        Colored(Cyan, &remote.name),
        remote.url
    );
    Ok(())
}

pub fn list_remotes(ctx: &WharfContext, filters: Vec<String>) -> WharfResult<()> {
    let remotes = ledger::list_remotes(ctx, &RemoteQuery { filters })?;

    if json_output() {
        return print_json(&remotes);
    }

    let rows = remotes
        .into_iter()
        .map(|remote| [remote.name, remote.url, remote.created_at, remote.last_updated])
        .collect();
    print_table("Remotes", &["Name", "URL", "Created", "Updated"], rows);
    Ok(())
}

pub fn create_publisher(ctx: &WharfContext, name: &str) -> WharfResult<()> {
    let publisher = ledger::create_publisher(ctx, name)?;

    if json_output() {
        return print_json(&publisher);
    }

    info!(
        "{} publisher {}",
        Colored(Green, "Created"),
        Colored(Cyan, &publisher.name)
    );
    Ok(())
}

pub fn list_publishers(ctx: &WharfContext) -> WharfResult<()> {
    let publishers = ledger::list_publishers(ctx)?;

    if json_output() {
        return print_json(&publishers);
    }

    let rows = publishers
        .into_iter()
        .map(|publisher| [publisher.name, publisher.created_at])
        .collect();
    print_table("Publishers", &["Name", "Created"], rows);
    Ok(())
}

pub fn list_publications(ctx: &WharfContext, publisher: Option<&str>) -> WharfResult<()> {
    let publications = ledger::list_publications(ctx, publisher)?;

    if json_output() {
        return print_json(&publications);
    }

    let rows = publications
        .into_iter()
        .map(|publication| {
            [
                publication.id.to_string(),
                publication.publisher_id.to_string(),
                publication.repository_version_id.to_string(),
                or_dash(publication.job_id),
                publication.created_at,
            ]
        })
        .collect();
    print_table(
        "Publications",
        &["ID", "Publisher", "Version", "Job", "Created"],
        rows,
    );
    Ok(())
}
