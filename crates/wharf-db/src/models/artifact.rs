use diesel::prelude::*;
use serde::Serialize;

use crate::schema::artifacts;

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = artifacts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Artifact {
    pub id: i32,
    pub digest: String,
    pub size: i64,
    pub relative_path: String,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = artifacts)]
pub struct NewArtifact<'a> {
    pub digest: &'a str,
    pub size: i64,
    pub relative_path: &'a str,
    pub created_at: &'a str,
}
