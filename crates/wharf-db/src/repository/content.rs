//! Content unit persistence and filtered listing.

use diesel::prelude::*;

use crate::{
    models::content::{Content, NewContent},
    schema::{content, repository_version_content},
};

/// Predicate applied to a single text column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatch {
    Exact(String),
    In(Vec<String>),
    /// Substring match; `%` and `_` in the needle are literal.
    Contains(String),
}

/// Filters for [`ContentRepository::list_filtered`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub content_type: Option<FieldMatch>,
    pub name: Option<FieldMatch>,
    pub author: Option<FieldMatch>,
    pub packagetype: Option<FieldMatch>,
    pub filename: Option<FieldMatch>,
    pub keywords: Option<FieldMatch>,
    /// Restricts results to the content set of this repository version id.
    pub repository_version: Option<i32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub(crate) fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

macro_rules! apply_match {
    ($query:ident, $column:expr, $matcher:expr) => {
        if let Some(matcher) = $matcher {
            $query = match matcher {
                FieldMatch::Exact(value) => $query.filter($column.eq(value.clone())),
                FieldMatch::In(values) => $query.filter($column.eq_any(values.clone())),
                FieldMatch::Contains(value) => {
                    $query.filter($column.like(like_pattern(value)).escape('\\'))
                }
            };
        }
    };
}

pub struct ContentRepository;

impl ContentRepository {
    /// Inserts a content unit and returns its id.
    pub fn insert(conn: &mut SqliteConnection, unit: &NewContent) -> QueryResult<i32> {
        diesel::insert_into(content::table)
            .values(unit)
            .returning(content::id)
            .get_result(conn)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<Content>> {
        content::table
            .filter(content::id.eq(id))
            .select(Content::as_select())
            .first(conn)
            .optional()
    }

    /// Finds the unit created from `digest` under `filename`, if any.
    pub fn find_by_artifact(
        conn: &mut SqliteConnection,
        digest: &str,
        filename: &str,
    ) -> QueryResult<Option<Content>> {
        content::table
            .filter(content::artifact_digest.eq(digest))
            .filter(content::filename.eq(filename))
            .select(Content::as_select())
            .first(conn)
            .optional()
    }

    /// Ids from `ids` that exist, in ascending order.
    pub fn existing_ids(conn: &mut SqliteConnection, ids: &[i32]) -> QueryResult<Vec<i32>> {
        content::table
            .filter(content::id.eq_any(ids))
            .order(content::id.asc())
            .select(content::id)
            .load(conn)
    }

    /// Lists content matching `filter`, ordered by id.
    pub fn list_filtered(
        conn: &mut SqliteConnection,
        filter: &ContentFilter,
    ) -> QueryResult<Vec<Content>> {
        let mut query = content::table.into_boxed();

        apply_match!(query, content::content_type, &filter.content_type);
        apply_match!(query, content::name, &filter.name);
        apply_match!(query, content::author, &filter.author);
        apply_match!(query, content::packagetype, &filter.packagetype);
        apply_match!(query, content::filename, &filter.filename);
        apply_match!(query, content::keywords, &filter.keywords);

        if let Some(version_id) = filter.repository_version {
            query = query.filter(
                content::id.eq_any(
                    repository_version_content::table
                        .filter(repository_version_content::version_id.eq(version_id))
                        .select(repository_version_content::content_id),
                ),
            );
        }

        query = query.order(content::id.asc());

        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = filter.offset {
            // SQLite requires a LIMIT before OFFSET.
            if filter.limit.is_none() {
                query = query.limit(-1);
            }
            query = query.offset(offset);
        }

        query.select(Content::as_select()).load(conn)
    }

    pub fn count(conn: &mut SqliteConnection) -> QueryResult<i64> {
        content::table.count().get_result(conn)
    }
}
