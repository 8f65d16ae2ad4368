//! Repositories, remotes, and publishers.

use tracing::{debug, info};
use url::Url;
use wharf_core::{error::WharfError, utils::timestamp, WharfResult};
use wharf_db::{
    models::ledger::{Publication, Publisher, Remote, Repository, RepositoryVersion},
    repository::{ContentRepository, LedgerRepository, RemoteFilter, TimeBound},
};

use crate::{
    utils::{
        already_exists, field_match, parse_filter, parse_timestamp, split_values,
        validate_name, FilterFields,
    },
    RemoteQuery, RepositorySummary, VersionSummary, WharfContext,
};

const REMOTE_SCHEMES: &[&str] = &["http", "https", "file"];

const REMOTE_FILTERS: FilterFields = &[
    ("name", &["exact", "in"]),
    ("last_updated", &["lt", "lte", "gt", "gte", "range"]),
];

pub fn create_repository(ctx: &WharfContext, name: &str) -> WharfResult<Repository> {
    validate_name("name", name)?;
    let repository = ctx
        .db()?
        .transaction(|conn| Ok(LedgerRepository::create_repository(conn, name, &timestamp())?))
        .map_err(|err| already_exists(err, "Repository", name))?;
    info!(name, "created repository");
    Ok(repository)
}

pub fn list_repositories(ctx: &WharfContext) -> WharfResult<Vec<RepositorySummary>> {
    ctx.db()?.read(|conn| {
        let mut summaries = Vec::new();
        for repository in LedgerRepository::list_repositories(conn)? {
            let (latest_version, content_count) =
                match LedgerRepository::latest_version(conn, repository.id)? {
                    Some(version) => (
                        version.number,
                        LedgerRepository::count_version_content(conn, version.id)?,
                    ),
                    None => (0, 0),
                };
            summaries.push(RepositorySummary {
                repository,
                latest_version,
                content_count,
            });
        }
        Ok(summaries)
    })
}

pub fn list_versions(ctx: &WharfContext, repository: &str) -> WharfResult<Vec<VersionSummary>> {
    ctx.db()?.read(|conn| {
        let found = LedgerRepository::find_repository(conn, repository)?
            .ok_or_else(|| WharfError::not_found("Repository", repository))?;
        LedgerRepository::list_versions(conn, found.id)?
            .into_iter()
            .map(|version| -> WharfResult<VersionSummary> {
                let content_count = LedgerRepository::count_version_content(conn, version.id)?;
                Ok(summarize(repository, version, content_count))
            })
            .collect()
    })
}

/// Creates a new repository version holding the latest version's content plus
/// `content_ids`.
pub fn add_content(
    ctx: &WharfContext,
    repository: &str,
    content_ids: &[i32],
) -> WharfResult<VersionSummary> {
    if content_ids.is_empty() {
        return Err(WharfError::invalid_field(
            "content",
            "At least one content unit is required.",
        ));
    }

    let (version, content_count) = ctx.db()?.transaction(|conn| {
        let found = LedgerRepository::find_repository(conn, repository)?
            .ok_or_else(|| WharfError::not_found("Repository", repository))?;

        let known = ContentRepository::existing_ids(conn, content_ids)?;
        let unknown: Vec<String> = content_ids
            .iter()
            .filter(|id| !known.contains(*id))
            .map(ToString::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(WharfError::invalid_field(
                "content",
                format!("Unknown content units: {}.", unknown.join(", ")),
            ));
        }

        let mut content = match LedgerRepository::latest_version(conn, found.id)? {
            Some(latest) => LedgerRepository::version_content_ids(conn, latest.id)?,
            None => Vec::new(),
        };
        content.extend(known);

        let version = LedgerRepository::create_version(conn, found.id, &content, &timestamp())?;
        let count = LedgerRepository::count_version_content(conn, version.id)?;
        Ok((version, count))
    })?;

    info!(repository, version = version.number, content_count, "created repository version");
    Ok(summarize(repository, version, content_count))
}

fn summarize(repository: &str, version: RepositoryVersion, content_count: i64) -> VersionSummary {
    VersionSummary {
        repository: repository.to_string(),
        number: version.number,
        content_count,
        created_at: version.created_at,
    }
}

fn parse_remote_url(url: &str) -> WharfResult<Url> {
    let parsed = Url::parse(url)
        .map_err(|err| WharfError::invalid_field("url", format!("`{url}` is not a valid URL: {err}")))?;
    if !REMOTE_SCHEMES.contains(&parsed.scheme()) {
        return Err(WharfError::invalid_field(
            "url",
            format!(
                "Unsupported scheme `{}`; expected one of {}.",
                parsed.scheme(),
                REMOTE_SCHEMES.join(", ")
            ),
        ));
    }
    Ok(parsed)
}

pub fn create_remote(ctx: &WharfContext, name: &str, url: &str) -> WharfResult<Remote> {
    validate_name("name", name)?;
    let parsed = parse_remote_url(url)?;

    let remote = ctx
        .db()?
        .transaction(|conn| {
            Ok(LedgerRepository::create_remote(
                conn,
                name,
                parsed.as_str(),
                &timestamp(),
            )?)
        })
        .map_err(|err| already_exists(err, "Remote", name))?;
    info!(name, url = %remote.url, "created remote");
    Ok(remote)
}

/// Points an existing remote at a new URL.
pub fn update_remote(ctx: &WharfContext, name: &str, url: &str) -> WharfResult<Remote> {
    let parsed = parse_remote_url(url)?;

    let remote = ctx
        .db()?
        .transaction(|conn| {
            LedgerRepository::update_remote(conn, name, parsed.as_str(), &timestamp())?
                .ok_or_else(|| WharfError::not_found("Remote", name))
        })?;
    info!(name, url = %remote.url, "updated remote");
    Ok(remote)
}

pub fn list_remotes(ctx: &WharfContext, query: &RemoteQuery) -> WharfResult<Vec<Remote>> {
    let mut filter = RemoteFilter::default();
    for expr in &query.filters {
        apply_remote_filter(&mut filter, expr)?;
    }

    debug!(?filter, "listing remotes");
    ctx.db()?
        .with_conn(|conn| LedgerRepository::list_remotes(conn, &filter))
}

/// Parses `field[__lookup]=value` into `filter`.
fn apply_remote_filter(filter: &mut RemoteFilter, expr: &str) -> WharfResult<()> {
    let (field, lookup, value) = parse_filter(expr, REMOTE_FILTERS)?;

    if field == "name" {
        if filter.name.is_some() {
            return Err(WharfError::InvalidRequest(
                "`name` is filtered more than once".into(),
            ));
        }
        filter.name = Some(field_match(lookup, value));
        return Ok(());
    }

    if lookup == "range" {
        let values = split_values(value);
        let [start, end] = values.as_slice() else {
            return Err(WharfError::InvalidRequest(format!(
                "`{field}__range` takes two comma separated timestamps, got `{value}`"
            )));
        };
        filter
            .last_updated
            .push(TimeBound::Gte(parse_timestamp(field, start)?));
        filter
            .last_updated
            .push(TimeBound::Lte(parse_timestamp(field, end)?));
        return Ok(());
    }

    let at = parse_timestamp(field, value)?;
    filter.last_updated.push(match lookup {
        "lt" => TimeBound::Lt(at),
        "lte" => TimeBound::Lte(at),
        "gt" => TimeBound::Gt(at),
        _ => TimeBound::Gte(at),
    });
    Ok(())
}

pub fn create_publisher(ctx: &WharfContext, name: &str) -> WharfResult<Publisher> {
    validate_name("name", name)?;
    let publisher = ctx
        .db()?
        .transaction(|conn| Ok(LedgerRepository::create_publisher(conn, name, &timestamp())?))
        .map_err(|err| already_exists(err, "Publisher", name))?;
    info!(name, "created publisher");
    Ok(publisher)
}

pub fn list_publishers(ctx: &WharfContext) -> WharfResult<Vec<Publisher>> {
    ctx.db()?.with_conn(LedgerRepository::list_publishers)
}

/// Publications, newest first, optionally for one publisher.
pub fn list_publications(
    ctx: &WharfContext,
    publisher: Option<&str>,
) -> WharfResult<Vec<Publication>> {
    ctx.db()?.read(|conn| {
        let publisher_id = match publisher {
            Some(name) => Some(
                LedgerRepository::find_publisher(conn, name)?
                    .ok_or_else(|| WharfError::not_found("Publisher", name))?
                    .id,
            ),
            None => None,
        };
        Ok(LedgerRepository::list_publications(conn, publisher_id)?)
    })
}
