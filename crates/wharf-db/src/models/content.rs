use diesel::{prelude::*, sqlite::Sqlite};
use serde::Serialize;
use serde_json::Value;
use wharf_package::Classifier;

use crate::schema::content;

/// Content type recorded for every Python distribution.
pub const PYTHON_PACKAGE: &str = "python/package";

/// A persisted Python distribution content unit.
#[derive(Debug, Clone, PartialEq, Eq, Selectable, Serialize)]
#[diesel(table_name = content)]
pub struct Content {
    pub id: i32,
    pub content_type: String,
    pub artifact_digest: String,
    pub filename: String,
    pub packagetype: String,
    pub name: String,
    pub version: String,
    pub metadata_version: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub home_page: Option<String>,
    pub download_url: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub license: Option<String>,
    pub requires_python: Option<String>,
    pub project_url: Option<String>,
    pub platform: Option<String>,
    pub supported_platform: Option<String>,
    pub classifiers: Vec<Classifier>,
    pub project_urls: Vec<String>,
    pub requires_dist: Vec<String>,
    pub provides_dist: Vec<String>,
    pub obsoletes_dist: Vec<String>,
    pub requires_external: Vec<String>,
    pub created_at: String,
}

impl Queryable<content::SqlType, Sqlite> for Content {
    type Row = (
        i32,
        String,
        String,
        String,
        String,
        String,
        String,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Value,
        Value,
        Value,
        Value,
        Value,
        Value,
        String,
    );

    fn build(row: Self::Row) -> diesel::deserialize::Result<Self> {
        Ok(Self {
            id: row.0,
            content_type: row.1,
            artifact_digest: row.2,
            filename: row.3,
            packagetype: row.4,
            name: row.5,
            version: row.6,
            metadata_version: row.7,
            summary: row.8,
            description: row.9,
            keywords: row.10,
            home_page: row.11,
            download_url: row.12,
            author: row.13,
            author_email: row.14,
            maintainer: row.15,
            maintainer_email: row.16,
            license: row.17,
            requires_python: row.18,
            project_url: row.19,
            platform: row.20,
            supported_platform: row.21,
            classifiers: serde_json::from_value(row.22)?,
            project_urls: serde_json::from_value(row.23)?,
            requires_dist: serde_json::from_value(row.24)?,
            provides_dist: serde_json::from_value(row.25)?,
            obsoletes_dist: serde_json::from_value(row.26)?,
            requires_external: serde_json::from_value(row.27)?,
            created_at: row.28,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = content)]
pub struct NewContent<'a> {
    pub content_type: &'a str,
    pub artifact_digest: &'a str,
    pub filename: &'a str,
    pub packagetype: &'a str,
    pub name: &'a str,
    pub version: &'a str,
    pub metadata_version: Option<&'a str>,
    pub summary: Option<&'a str>,
    pub description: Option<&'a str>,
    pub keywords: Option<&'a str>,
    pub home_page: Option<&'a str>,
    pub download_url: Option<&'a str>,
    pub author: Option<&'a str>,
    pub author_email: Option<&'a str>,
    pub maintainer: Option<&'a str>,
    pub maintainer_email: Option<&'a str>,
    pub license: Option<&'a str>,
    pub requires_python: Option<&'a str>,
    pub project_url: Option<&'a str>,
    pub platform: Option<&'a str>,
    pub supported_platform: Option<&'a str>,
    pub classifiers: Value,
    pub project_urls: Value,
    pub requires_dist: Value,
    pub provides_dist: Value,
    pub obsoletes_dist: Value,
    pub requires_external: Value,
    pub created_at: &'a str,
}
