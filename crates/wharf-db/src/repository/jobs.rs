//! Durable job queue, per-job resource claims, and execution reservations.
//!
//! A job claims its resources at enqueue time (`job_resources`); the claim orders it
//! behind every earlier non-terminal job that shares a resource. A running job holds one
//! `reservations` row per resource, keyed by resource, so two jobs can never hold the same
//! resource at once.

use std::collections::{BTreeMap, HashSet};

use diesel::prelude::*;
use serde_json::Value;

use crate::{
    models::jobs::{Job, JobState, NewJob, NewJobResource, NewReservation, Reservation},
    schema::{job_resources, jobs, reservations},
};

fn state_names(states: &[JobState]) -> Vec<&'static str> {
    states.iter().map(JobState::as_str).collect()
}

pub struct JobRepository;

impl JobRepository {
    /// Inserts a queued job and its resource claims.
    pub fn enqueue(
        conn: &mut SqliteConnection,
        operation: &str,
        payload: Value,
        resources: &[String],
        now: i64,
    ) -> QueryResult<Job> {
        let job: Job = diesel::insert_into(jobs::table)
            .values(&NewJob {
                operation,
                state: JobState::Queued.as_str(),
                payload,
                enqueued_at: now,
            })
            .returning(Job::as_returning())
            .get_result(conn)?;

        let rows: Vec<NewJobResource> = resources
            .iter()
            .map(|resource| NewJobResource {
                job_id: job.id,
                resource,
            })
            .collect();
        if !rows.is_empty() {
            diesel::insert_into(job_resources::table)
                .values(&rows)
                .execute(conn)?;
        }

        Ok(job)
    }

    pub fn find(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<Job>> {
        jobs::table
            .filter(jobs::id.eq(id))
            .select(Job::as_select())
            .first(conn)
            .optional()
    }

    /// Resources claimed by a job, sorted.
    pub fn resources(conn: &mut SqliteConnection, job_id: i32) -> QueryResult<Vec<String>> {
        job_resources::table
            .filter(job_resources::job_id.eq(job_id))
            .order(job_resources::resource.asc())
            .select(job_resources::resource)
            .load(conn)
    }

    /// Jobs in id order, optionally restricted to one state.
    pub fn list(
        conn: &mut SqliteConnection,
        state: Option<JobState>,
        limit: Option<i64>,
    ) -> QueryResult<Vec<Job>> {
        let mut query = jobs::table.into_boxed();
        if let Some(state) = state {
            query = query.filter(jobs::state.eq(state.as_str()));
        }
        query = query.order(jobs::id.asc());
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        query.select(Job::as_select()).load(conn)
    }

    /// Queued and running jobs in id order, each with its claimed resources.
    pub fn active_with_resources(
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<(Job, Vec<String>)>> {
        let active: Vec<Job> = jobs::table
            .filter(jobs::state.eq_any(state_names(&JobState::ACTIVE)))
            .order(jobs::id.asc())
            .select(Job::as_select())
            .load(conn)?;

        let ids: Vec<i32> = active.iter().map(|job| job.id).collect();
        let claims: Vec<(i32, String)> = job_resources::table
            .filter(job_resources::job_id.eq_any(&ids))
            .order((job_resources::job_id.asc(), job_resources::resource.asc()))
            .select((job_resources::job_id, job_resources::resource))
            .load(conn)?;

        let mut by_job: BTreeMap<i32, Vec<String>> = BTreeMap::new();
        for (job_id, resource) in claims {
            by_job.entry(job_id).or_default().push(resource);
        }

        Ok(active
            .into_iter()
            .map(|job| {
                let resources = by_job.remove(&job.id).unwrap_or_default();
                (job, resources)
            })
            .collect())
    }

    /// The oldest queued job whose resources are not claimed by any earlier active job
    /// and not currently reserved.
    pub fn next_runnable(conn: &mut SqliteConnection) -> QueryResult<Option<(Job, Vec<String>)>> {
        let reserved: Vec<String> = reservations::table
            .select(reservations::resource)
            .load(conn)?;
        let mut blocked: HashSet<String> = reserved.into_iter().collect();

        for (job, resources) in Self::active_with_resources(conn)? {
            let runnable = job.job_state() == JobState::Queued
                && resources.iter().all(|resource| !blocked.contains(resource));
            if runnable {
                return Ok(Some((job, resources)));
            }
            blocked.extend(resources);
        }

        Ok(None)
    }

    /// Moves a queued job to running and reserves its resources for `worker`.
    ///
    /// Returns false, reserving nothing, if the job was no longer queued.
    pub fn start(
        conn: &mut SqliteConnection,
        job_id: i32,
        worker: &str,
        resources: &[String],
        lease_expires_at: i64,
        now: i64,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            jobs::table
                .filter(jobs::id.eq(job_id))
                .filter(jobs::state.eq(JobState::Queued.as_str())),
        )
        .set((
            jobs::state.eq(JobState::Running.as_str()),
            jobs::worker.eq(worker),
            jobs::started_at.eq(now),
        ))
        .execute(conn)?;
        if updated == 0 {
            return Ok(false);
        }

        let rows: Vec<NewReservation> = resources
            .iter()
            .map(|resource| NewReservation {
                resource,
                job_id,
                worker,
                lease_expires_at,
            })
            .collect();
        if !rows.is_empty() {
            diesel::insert_into(reservations::table)
                .values(&rows)
                .execute(conn)?;
        }

        Ok(true)
    }

    /// Extends the lease on every reservation the job holds for `worker`.
    pub fn renew_lease(
        conn: &mut SqliteConnection,
        job_id: i32,
        worker: &str,
        lease_expires_at: i64,
    ) -> QueryResult<usize> {
        diesel::update(
            reservations::table
                .filter(reservations::job_id.eq(job_id))
                .filter(reservations::worker.eq(worker)),
        )
        .set(reservations::lease_expires_at.eq(lease_expires_at))
        .execute(conn)
    }

    /// True while `worker` holds the job's reservations under a lease that has not ended.
    pub fn holds(
        conn: &mut SqliteConnection,
        job_id: i32,
        worker: &str,
        now: i64,
    ) -> QueryResult<bool> {
        let held: i64 = reservations::table
            .filter(reservations::job_id.eq(job_id))
            .filter(reservations::worker.eq(worker))
            .filter(reservations::lease_expires_at.ge(now))
            .count()
            .get_result(conn)?;
        Ok(held > 0)
    }

    /// Ids of jobs holding at least one reservation whose lease ended before `now`.
    pub fn expired_leases(conn: &mut SqliteConnection, now: i64) -> QueryResult<Vec<i32>> {
        reservations::table
            .filter(reservations::lease_expires_at.lt(now))
            .select(reservations::job_id)
            .distinct()
            .order(reservations::job_id.asc())
            .load(conn)
    }

    /// Records a terminal state for a running job owned by `worker` and drops its
    /// reservations.
    ///
    /// Returns false if the job is not running under `worker` (it was recovered after a
    /// lease expiry, for instance); nothing changes in that case.
    pub fn finish(
        conn: &mut SqliteConnection,
        job_id: i32,
        worker: &str,
        state: JobState,
        error: Option<&str>,
        result: Option<Value>,
        now: i64,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            jobs::table
                .filter(jobs::id.eq(job_id))
                .filter(jobs::state.eq(JobState::Running.as_str()))
                .filter(jobs::worker.eq(worker)),
        )
        .set((
            jobs::state.eq(state.as_str()),
            jobs::error.eq(error),
            jobs::result.eq(result),
            jobs::finished_at.eq(now),
        ))
        .execute(conn)?;
        if updated == 0 {
            return Ok(false);
        }

        Self::release(conn, job_id)?;
        Ok(true)
    }

    /// Fails a running job regardless of owner and drops its reservations.
    pub fn fail_running(
        conn: &mut SqliteConnection,
        job_id: i32,
        error: &str,
        now: i64,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            jobs::table
                .filter(jobs::id.eq(job_id))
                .filter(jobs::state.eq(JobState::Running.as_str())),
        )
        .set((
            jobs::state.eq(JobState::Failed.as_str()),
            jobs::error.eq(error),
            jobs::finished_at.eq(now),
        ))
        .execute(conn)?;

        Self::release(conn, job_id)?;
        Ok(updated > 0)
    }

    /// Cancels a job that is still queued.
    pub fn cancel_queued(conn: &mut SqliteConnection, job_id: i32, now: i64) -> QueryResult<bool> {
        let updated = diesel::update(
            jobs::table
                .filter(jobs::id.eq(job_id))
                .filter(jobs::state.eq(JobState::Queued.as_str())),
        )
        .set((
            jobs::state.eq(JobState::Canceled.as_str()),
            jobs::finished_at.eq(now),
        ))
        .execute(conn)?;
        Ok(updated > 0)
    }

    pub fn release(conn: &mut SqliteConnection, job_id: i32) -> QueryResult<usize> {
        diesel::delete(reservations::table.filter(reservations::job_id.eq(job_id))).execute(conn)
    }

    pub fn reservations(conn: &mut SqliteConnection) -> QueryResult<Vec<Reservation>> {
        reservations::table
            .order(reservations::resource.asc())
            .select(Reservation::as_select())
            .load(conn)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::repository::testing::open_db;

    fn res(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn enqueue(conn: &mut SqliteConnection, resources: &[&str]) -> Job {
        JobRepository::enqueue(conn, "sync", json!({}), &res(resources), 1).unwrap()
    }

    #[test]
    fn test_enqueue_records_claims() {
        let (_dir, mut db) = open_db();
        let job = enqueue(db.conn(), &["repository:a", "remote:r"]);

        assert_eq!(job.job_state(), JobState::Queued);
        assert_eq!(
            JobRepository::resources(db.conn(), job.id).unwrap(),
            res(&["remote:r", "repository:a"])
        );
        assert_eq!(
            JobRepository::find(db.conn(), job.id).unwrap().unwrap().payload,
            json!({})
        );
    }

    #[test]
    fn test_overlapping_jobs_run_in_submission_order() {
        let (_dir, mut db) = open_db();
        let first = enqueue(db.conn(), &["repository:a", "remote:r"]);
        let second = enqueue(db.conn(), &["repository:a", "remote:s"]);
        let disjoint = enqueue(db.conn(), &["repository:b", "remote:s"]);

        let (next, resources) = JobRepository::next_runnable(db.conn()).unwrap().unwrap();
        assert_eq!(next.id, first.id);
        assert!(JobRepository::start(db.conn(), next.id, "w1", &resources, 100, 2).unwrap());

        // `second` waits on `first`; `disjoint` shares remote:s with `second`, which is
        // ahead of it in the queue.
        assert!(JobRepository::next_runnable(db.conn()).unwrap().is_none());

        assert!(JobRepository::finish(
            db.conn(),
            first.id,
            "w1",
            JobState::Succeeded,
            None,
            Some(json!({"version": 1})),
            3
        )
        .unwrap());
        assert!(JobRepository::reservations(db.conn()).unwrap().is_empty());

        let (next, _) = JobRepository::next_runnable(db.conn()).unwrap().unwrap();
        assert_eq!(next.id, second.id);
        assert_ne!(next.id, disjoint.id);
    }

    #[test]
    fn test_disjoint_jobs_can_run_together() {
        let (_dir, mut db) = open_db();
        let a = enqueue(db.conn(), &["repository:a"]);
        let b = enqueue(db.conn(), &["repository:b"]);

        let (next, resources) = JobRepository::next_runnable(db.conn()).unwrap().unwrap();
        assert_eq!(next.id, a.id);
        JobRepository::start(db.conn(), a.id, "w1", &resources, 100, 2).unwrap();

        let (next, _) = JobRepository::next_runnable(db.conn()).unwrap().unwrap();
        assert_eq!(next.id, b.id);
    }

    #[test]
    fn test_double_reservation_is_impossible() {
        let (_dir, mut db) = open_db();
        let a = enqueue(db.conn(), &["repository:a"]);
        let b = enqueue(db.conn(), &["repository:a"]);

        JobRepository::start(db.conn(), a.id, "w1", &res(&["repository:a"]), 100, 2).unwrap();
        let err = JobRepository::start(db.conn(), b.id, "w2", &res(&["repository:a"]), 100, 2)
            .unwrap_err();
        assert!(matches!(
            err,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _
            )
        ));
    }

    #[test]
    fn test_cancel_queued_unblocks_followers() {
        let (_dir, mut db) = open_db();
        let a = enqueue(db.conn(), &["repository:a"]);
        let b = enqueue(db.conn(), &["repository:a"]);

        assert!(JobRepository::cancel_queued(db.conn(), a.id, 5).unwrap());
        assert!(!JobRepository::cancel_queued(db.conn(), a.id, 6).unwrap());

        let (next, _) = JobRepository::next_runnable(db.conn()).unwrap().unwrap();
        assert_eq!(next.id, b.id);
        let canceled = JobRepository::find(db.conn(), a.id).unwrap().unwrap();
        assert_eq!(canceled.job_state(), JobState::Canceled);
        assert_eq!(canceled.finished_at, Some(5));
    }

    #[test]
    fn test_expired_leases_and_recovery() {
        let (_dir, mut db) = open_db();
        let a = enqueue(db.conn(), &["repository:a", "remote:r"]);
        JobRepository::start(db.conn(), a.id, "w1", &res(&["repository:a", "remote:r"]), 50, 2)
            .unwrap();

        assert!(JobRepository::expired_leases(db.conn(), 50).unwrap().is_empty());
        assert!(JobRepository::holds(db.conn(), a.id, "w1", 50).unwrap());
        assert!(!JobRepository::holds(db.conn(), a.id, "w2", 50).unwrap());
        assert!(!JobRepository::holds(db.conn(), a.id, "w1", 51).unwrap());
        assert_eq!(JobRepository::renew_lease(db.conn(), a.id, "w1", 60).unwrap(), 2);
        assert_eq!(JobRepository::renew_lease(db.conn(), a.id, "w2", 99).unwrap(), 0);
        assert_eq!(JobRepository::expired_leases(db.conn(), 61).unwrap(), vec![a.id]);

        assert!(JobRepository::fail_running(db.conn(), a.id, "reservation lease expired", 61)
            .unwrap());
        assert!(JobRepository::reservations(db.conn()).unwrap().is_empty());
        assert!(!JobRepository::holds(db.conn(), a.id, "w1", 0).unwrap());

        // The original worker can no longer report an outcome.
        assert!(!JobRepository::finish(
            db.conn(),
            a.id,
            "w1",
            JobState::Succeeded,
            None,
            None,
            62
        )
        .unwrap());
        let job = JobRepository::find(db.conn(), a.id).unwrap().unwrap();
        assert_eq!(job.job_state(), JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("reservation lease expired"));
    }

    #[test]
    fn test_list_by_state() {
        let (_dir, mut db) = open_db();
        let a = enqueue(db.conn(), &["repository:a"]);
        enqueue(db.conn(), &["repository:b"]);
        JobRepository::cancel_queued(db.conn(), a.id, 2).unwrap();

        assert_eq!(JobRepository::list(db.conn(), None, None).unwrap().len(), 2);
        assert_eq!(
            JobRepository::list(db.conn(), Some(JobState::Queued), None)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(JobRepository::list(db.conn(), None, Some(1)).unwrap()[0].id, a.id);
    }
}
