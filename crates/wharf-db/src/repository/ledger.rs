//! Repositories, their numbered versions, remotes, publishers and publications.

use std::collections::BTreeSet;

use diesel::{dsl::max, prelude::*};

use crate::{
    models::ledger::{
        NewPublication, NewPublisher, NewRemote, NewRepository, NewRepositoryVersion,
        NewVersionContent, Publication, Publisher, Remote, Repository, RepositoryVersion,
    },
    schema::{
        publications, publishers, remotes, repositories, repository_version_content,
        repository_versions,
    },
    repository::content::{like_pattern, FieldMatch},
};

/// Bound on an RFC 3339 UTC timestamp column. Values compare as text, so they must use the
/// stored `YYYY-MM-DDTHH:MM:SSZ` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeBound {
    Lt(String),
    Lte(String),
    Gt(String),
    Gte(String),
}

/// Filters for [`LedgerRepository::list_remotes`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct RemoteFilter {
    pub name: Option<FieldMatch>,
    /// All bounds must hold.
    pub last_updated: Vec<TimeBound>,
}

pub struct LedgerRepository;

impl LedgerRepository {
    /// Creates a repository together with its empty version 0.
    pub fn create_repository(
        conn: &mut SqliteConnection,
        name: &str,
        created_at: &str,
    ) -> QueryResult<Repository> {
        let repository: Repository = diesel::insert_into(repositories::table)
            .values(&NewRepository { name, created_at })
            .returning(Repository::as_returning())
            .get_result(conn)?;

        diesel::insert_into(repository_versions::table)
            .values(&NewRepositoryVersion {
                repository_id: repository.id,
                number: 0,
                created_at,
            })
            .execute(conn)?;

        Ok(repository)
    }

    pub fn find_repository(
        conn: &mut SqliteConnection,
        name: &str,
    ) -> QueryResult<Option<Repository>> {
        repositories::table
            .filter(repositories::name.eq(name))
            .select(Repository::as_select())
            .first(conn)
            .optional()
    }

    pub fn find_repository_by_id(
        conn: &mut SqliteConnection,
        id: i32,
    ) -> QueryResult<Option<Repository>> {
        repositories::table
            .filter(repositories::id.eq(id))
            .select(Repository::as_select())
            .first(conn)
            .optional()
    }

    pub fn list_repositories(conn: &mut SqliteConnection) -> QueryResult<Vec<Repository>> {
        repositories::table
            .order(repositories::name.asc())
            .select(Repository::as_select())
            .load(conn)
    }

    pub fn find_version(
        conn: &mut SqliteConnection,
        repository_id: i32,
        number: i32,
    ) -> QueryResult<Option<RepositoryVersion>> {
        repository_versions::table
            .filter(repository_versions::repository_id.eq(repository_id))
            .filter(repository_versions::number.eq(number))
            .select(RepositoryVersion::as_select())
            .first(conn)
            .optional()
    }

    /// Highest-numbered version of the repository.
    pub fn latest_version(
        conn: &mut SqliteConnection,
        repository_id: i32,
    ) -> QueryResult<Option<RepositoryVersion>> {
        repository_versions::table
            .filter(repository_versions::repository_id.eq(repository_id))
            .order(repository_versions::number.desc())
            .select(RepositoryVersion::as_select())
            .first(conn)
            .optional()
    }

    pub fn list_versions(
        conn: &mut SqliteConnection,
        repository_id: i32,
    ) -> QueryResult<Vec<RepositoryVersion>> {
        repository_versions::table
            .filter(repository_versions::repository_id.eq(repository_id))
            .order(repository_versions::number.asc())
            .select(RepositoryVersion::as_select())
            .load(conn)
    }

    /// Content ids belonging to a version, ascending.
    pub fn version_content_ids(
        conn: &mut SqliteConnection,
        version_id: i32,
    ) -> QueryResult<Vec<i32>> {
        repository_version_content::table
            .filter(repository_version_content::version_id.eq(version_id))
            .order(repository_version_content::content_id.asc())
            .select(repository_version_content::content_id)
            .load(conn)
    }

    pub fn count_version_content(conn: &mut SqliteConnection, version_id: i32) -> QueryResult<i64> {
        repository_version_content::table
            .filter(repository_version_content::version_id.eq(version_id))
            .count()
            .get_result(conn)
    }

    /// Appends a new version holding exactly `content_ids` (duplicates collapse).
    ///
    /// Must run inside a transaction so the number read and the insert are not interleaved
    /// with another writer.
    pub fn create_version(
        conn: &mut SqliteConnection,
        repository_id: i32,
        content_ids: &[i32],
        created_at: &str,
    ) -> QueryResult<RepositoryVersion> {
        let current: Option<i32> = repository_versions::table
            .filter(repository_versions::repository_id.eq(repository_id))
            .select(max(repository_versions::number))
            .first(conn)?;

        let version: RepositoryVersion = diesel::insert_into(repository_versions::table)
            .values(&NewRepositoryVersion {
                repository_id,
                number: current.map_or(0, |n| n + 1),
                created_at,
            })
            .returning(RepositoryVersion::as_returning())
            .get_result(conn)?;

        let rows: Vec<NewVersionContent> = content_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|content_id| NewVersionContent {
                version_id: version.id,
                content_id,
            })
            .collect();
        if !rows.is_empty() {
            diesel::insert_into(repository_version_content::table)
                .values(&rows)
                .execute(conn)?;
        }

        Ok(version)
    }

    pub fn create_remote(
        conn: &mut SqliteConnection,
        name: &str,
        url: &str,
        created_at: &str,
    ) -> QueryResult<Remote> {
        diesel::insert_into(remotes::table)
            .values(&NewRemote {
                name,
                url,
                created_at,
                last_updated: created_at,
            })
            .returning(Remote::as_returning())
            .get_result(conn)
    }

    pub fn find_remote(conn: &mut SqliteConnection, name: &str) -> QueryResult<Option<Remote>> {
        remotes::table
            .filter(remotes::name.eq(name))
            .select(Remote::as_select())
            .first(conn)
            .optional()
    }

    /// Points the remote at `url` and stamps `last_updated`. `None` if no such remote.
    pub fn update_remote(
        conn: &mut SqliteConnection,
        name: &str,
        url: &str,
        now: &str,
    ) -> QueryResult<Option<Remote>> {
        diesel::update(remotes::table.filter(remotes::name.eq(name)))
            .set((remotes::url.eq(url), remotes::last_updated.eq(now)))
            .returning(Remote::as_returning())
            .get_result(conn)
            .optional()
    }

    pub fn list_remotes(
        conn: &mut SqliteConnection,
        filter: &RemoteFilter,
    ) -> QueryResult<Vec<Remote>> {
        let mut query = remotes::table.select(Remote::as_select()).into_boxed();

        if let Some(matcher) = &filter.name {
            query = match matcher {
                FieldMatch::Exact(value) => query.filter(remotes::name.eq(value.clone())),
                FieldMatch::In(values) => query.filter(remotes::name.eq_any(values.clone())),
                FieldMatch::Contains(value) => {
                    query.filter(remotes::name.like(like_pattern(value)).escape('\\'))
                }
            };
        }

        for bound in &filter.last_updated {
            query = match bound {
                TimeBound::Lt(at) => query.filter(remotes::last_updated.lt(at.clone())),
                TimeBound::Lte(at) => query.filter(remotes::last_updated.le(at.clone())),
                TimeBound::Gt(at) => query.filter(remotes::last_updated.gt(at.clone())),
                TimeBound::Gte(at) => query.filter(remotes::last_updated.ge(at.clone())),
            };
        }

        query.order(remotes::name.asc()).load(conn)
    }

    pub fn create_publisher(
        conn: &mut SqliteConnection,
        name: &str,
        created_at: &str,
    ) -> QueryResult<Publisher> {
        diesel::insert_into(publishers::table)
            .values(&NewPublisher { name, created_at })
            .returning(Publisher::as_returning())
            .get_result(conn)
    }

    pub fn find_publisher(
        conn: &mut SqliteConnection,
        name: &str,
    ) -> QueryResult<Option<Publisher>> {
        publishers::table
            .filter(publishers::name.eq(name))
            .select(Publisher::as_select())
            .first(conn)
            .optional()
    }

    pub fn list_publishers(conn: &mut SqliteConnection) -> QueryResult<Vec<Publisher>> {
        publishers::table
            .order(publishers::name.asc())
            .select(Publisher::as_select())
            .load(conn)
    }

    pub fn insert_publication(
        conn: &mut SqliteConnection,
        publication: &NewPublication,
    ) -> QueryResult<Publication> {
        diesel::insert_into(publications::table)
            .values(publication)
            .returning(Publication::as_returning())
            .get_result(conn)
    }

    /// Publications, newest first, optionally limited to one publisher.
    pub fn list_publications(
        conn: &mut SqliteConnection,
        publisher_id: Option<i32>,
    ) -> QueryResult<Vec<Publication>> {
        let mut query = publications::table.into_boxed();
        if let Some(id) = publisher_id {
            query = query.filter(publications::publisher_id.eq(id));
        }
        query
            .order(publications::id.desc())
            .select(Publication::as_select())
            .load(conn)
    }
}
