//! Artifact bookkeeping for the filesystem store.

use diesel::prelude::*;

use crate::{
    models::artifact::{Artifact, NewArtifact},
    schema::artifacts,
};

pub struct ArtifactRepository;

impl ArtifactRepository {
    /// Records an artifact, returning the existing row when the digest is already known.
    pub fn insert_or_get(conn: &mut SqliteConnection, artifact: &NewArtifact) -> QueryResult<Artifact> {
        diesel::insert_into(artifacts::table)
            .values(artifact)
            .on_conflict(artifacts::digest)
            .do_nothing()
            .execute(conn)?;

        artifacts::table
            .filter(artifacts::digest.eq(artifact.digest))
            .select(Artifact::as_select())
            .first(conn)
    }

    pub fn find_by_digest(conn: &mut SqliteConnection, digest: &str) -> QueryResult<Option<Artifact>> {
        artifacts::table
            .filter(artifacts::digest.eq(digest))
            .select(Artifact::as_select())
            .first(conn)
            .optional()
    }

    pub fn list_all(conn: &mut SqliteConnection) -> QueryResult<Vec<Artifact>> {
        artifacts::table
            .order(artifacts::id.asc())
            .select(Artifact::as_select())
            .load(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::{open_db, NOW};

    #[test]
    fn test_insert_is_idempotent_per_digest() {
        let (_dir, mut db) = open_db();
        let new = NewArtifact {
            digest: "ab12",
            size: 42,
            relative_path: "ab/ab12",
            created_at: NOW,
        };

        let first = ArtifactRepository::insert_or_get(db.conn(), &new).unwrap();
        let second = ArtifactRepository::insert_or_get(db.conn(), &new).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.size, 42);
        assert_eq!(ArtifactRepository::list_all(db.conn()).unwrap().len(), 1);

        assert!(ArtifactRepository::find_by_digest(db.conn(), "ffff")
            .unwrap()
            .is_none());
    }
}
