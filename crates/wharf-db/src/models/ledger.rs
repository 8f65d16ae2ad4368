use diesel::prelude::*;
use serde::Serialize;

use crate::schema::{
    publications, publishers, remotes, repositories, repository_version_content,
    repository_versions,
};

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = repositories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Repository {
    pub id: i32,
    pub name: String,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = repositories)]
pub struct NewRepository<'a> {
    pub name: &'a str,
    pub created_at: &'a str,
}

/// An immutable, numbered snapshot of a repository's content set.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = repository_versions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RepositoryVersion {
    pub id: i32,
    pub repository_id: i32,
    pub number: i32,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = repository_versions)]
pub struct NewRepositoryVersion<'a> {
    pub repository_id: i32,
    pub number: i32,
    pub created_at: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = repository_version_content)]
pub struct NewVersionContent {
    pub version_id: i32,
    pub content_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = remotes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Remote {
    pub id: i32,
    pub name: String,
    pub url: String,
    pub created_at: String,
    /// Set on creation and on every update.
    pub last_updated: String,
}

#[derive(Insertable)]
#[diesel(table_name = remotes)]
pub struct NewRemote<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub created_at: &'a str,
    pub last_updated: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = publishers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Publisher {
    pub id: i32,
    pub name: String,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = publishers)]
pub struct NewPublisher<'a> {
    pub name: &'a str,
    pub created_at: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = publications)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Publication {
    pub id: i32,
    pub publisher_id: i32,
    pub repository_version_id: i32,
    pub job_id: Option<i32>,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = publications)]
pub struct NewPublication<'a> {
    pub publisher_id: i32,
    pub repository_version_id: i32,
    pub job_id: Option<i32>,
    pub created_at: &'a str,
}
