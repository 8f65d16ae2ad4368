use std::path::PathBuf;

use tracing::debug;
use wharf_core::{
    artifact::ArtifactHandle, content::CreateContent, error::WharfError, WharfResult,
};
use wharf_db::{
    models::{artifact::Artifact, content::Content},
    repository::{ContentFilter, ContentRepository, LedgerRepository},
};

use crate::{
    utils::{blocking, field_match, parse_filter, FilterFields},
    ContentQuery, WharfContext,
};

const FILTERS: FilterFields = &[
    ("type", &["exact", "in"]),
    ("name", &["exact", "in"]),
    ("author", &["exact", "in"]),
    ("packagetype", &["exact", "in"]),
    ("filename", &["exact", "in", "contains"]),
    ("keywords", &["in", "contains"]),
];

/// Copies a local file into the artifact store.
pub async fn import_artifact(ctx: &WharfContext, path: PathBuf) -> WharfResult<ArtifactHandle> {
    let store = ctx.artifact_store()?;
    blocking(move || store.import(path)).await
}

pub fn list_artifacts(ctx: &WharfContext) -> WharfResult<Vec<Artifact>> {
    ctx.artifact_store()?.list()
}

/// Extracts metadata from a stored artifact and records it as a content unit.
pub async fn create_content(ctx: &WharfContext, request: CreateContent) -> WharfResult<Content> {
    let registrar = ctx.registrar()?;
    blocking(move || registrar.register(&request)).await
}

pub fn show_content(ctx: &WharfContext, id: i32) -> WharfResult<Content> {
    ctx.db()?
        .with_conn(|conn| ContentRepository::find_by_id(conn, id))?
        .ok_or_else(|| WharfError::not_found("Content", id.to_string()))
}

pub fn list_content(ctx: &WharfContext, query: &ContentQuery) -> WharfResult<Vec<Content>> {
    let mut filter = ContentFilter {
        limit: query.limit,
        offset: query.offset,
        ..Default::default()
    };
    for expr in &query.filters {
        apply_filter(&mut filter, expr)?;
    }

    let db = ctx.db()?;
    db.read(|conn| {
        if let Some(version) = &query.repository_version {
            let repository = LedgerRepository::find_repository(conn, &version.repository)?
                .ok_or_else(|| WharfError::not_found("Repository", &version.repository))?;
            let found = LedgerRepository::find_version(conn, repository.id, version.number)?
                .ok_or_else(|| WharfError::not_found("Repository version", version.to_string()))?;
            filter.repository_version = Some(found.id);
        }

        debug!(?filter, "listing content");
        Ok(ContentRepository::list_filtered(conn, &filter)?)
    })
}

/// Parses `field[__lookup]=value` into `filter`.
fn apply_filter(filter: &mut ContentFilter, expr: &str) -> WharfResult<()> {
    let (field, lookup, value) = parse_filter(expr, FILTERS)?;
    let matcher = field_match(lookup, value);

    let slot = match field {
        "type" => &mut filter.content_type,
        "name" => &mut filter.name,
        "author" => &mut filter.author,
        "packagetype" => &mut filter.packagetype,
        "filename" => &mut filter.filename,
        _ => &mut filter.keywords,
    };
    if slot.is_some() {
        return Err(WharfError::InvalidRequest(format!(
            "`{field}` is filtered more than once"
        )));
    }
    *slot = Some(matcher);
    Ok(())
}

#[cfg(test)]
mod tests {
    use wharf_db::repository::FieldMatch;

    use super::*;

    fn parse(exprs: &[&str]) -> WharfResult<ContentFilter> {
        let mut filter = ContentFilter::default();
        for expr in exprs {
            apply_filter(&mut filter, expr)?;
        }
        Ok(filter)
    }

    #[test]
    fn test_filter_lookups() {
        let filter = parse(&[
            "name=shelf-reader",
            "packagetype__in=bdist_wheel, sdist",
            "filename__contains=py3",
            "keywords__contains=library",
            "type=python/package",
        ])
        .unwrap();

        assert_eq!(filter.name, Some(FieldMatch::Exact("shelf-reader".into())));
        assert_eq!(
            filter.packagetype,
            Some(FieldMatch::In(vec!["bdist_wheel".into(), "sdist".into()]))
        );
        assert_eq!(filter.filename, Some(FieldMatch::Contains("py3".into())));
        assert_eq!(filter.keywords, Some(FieldMatch::Contains("library".into())));
        assert_eq!(
            filter.content_type,
            Some(FieldMatch::Exact("python/package".into()))
        );
    }

    #[test]
    fn test_unsupported_filters_are_rejected() {
        for expr in [
            "name__contains=shelf",
            "keywords=library",
            "version=1.0",
            "name",
            "author__startswith=A",
        ] {
            assert!(
                matches!(parse(&[expr]), Err(WharfError::InvalidRequest(_))),
                "{expr} should be rejected"
            );
        }
        assert!(parse(&["name=a", "name__in=b"]).is_err());
    }
}
