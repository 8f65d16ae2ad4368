use std::{
    io::{Cursor, Write},
    sync::Arc,
};

use tempfile::TempDir;
use wharf_config::config::Config;
use wharf_core::{
    content::CreateContent,
    error::WharfError,
    tasking::{JobContext, JobState, PublishRequest, RemoteFetcher, SyncRequest, VersionRef},
    WharfResult,
};
use wharf_db::models::ledger::Remote;
use wharf_events::{CollectorSink, WharfEvent};
use wharf_operations::{
    content, jobs, ledger, ContentQuery, RemoteQuery, WharfContext, WorkerRunOptions,
};
use zip::{write::SimpleFileOptions, ZipWriter};

const METADATA: &str = "Metadata-Version: 2.1
Name: shelf-reader
Version: 0.1
Summary: Make sure your collections are in call number order.
Author: Austin Macdonald
Keywords: library shelving
Classifier: Development Status :: 4 - Beta
Classifier: Environment :: Console
";

struct Fixture {
    dir: TempDir,
    ctx: WharfContext,
    events: Arc<CollectorSink>,
}

fn config(dir: &TempDir) -> Config {
    let root = dir.path().display();
    Config {
        db_path: Some(format!("{root}/wharf.db")),
        artifacts_path: Some(format!("{root}/artifacts")),
        workspace_path: Some(format!("{root}/workspace")),
        workers: Some(2),
        reservation_lease: Some("1m".into()),
        poll_interval: Some("1s".into()),
        busy_timeout: Some("5s".into()),
        max_metadata_size: Some(1024 * 1024),
    }
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(CollectorSink::default());
    let ctx = WharfContext::new(config(&dir), events.clone());
    Fixture { dir, ctx, events }
}

fn wheel(dir: &TempDir, name: &str, metadata: &str) -> std::path::PathBuf {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(
            "shelf_reader-0.1.dist-info/METADATA",
            SimpleFileOptions::default(),
        )
        .unwrap();
    writer.write_all(metadata.as_bytes()).unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

async fn upload(fx: &Fixture, filename: &str, metadata: &str) -> WharfResult<i32> {
    let path = wheel(&fx.dir, "upload.bin", metadata);
    let artifact = content::import_artifact(&fx.ctx, path).await?;
    let unit =
        content::create_content(&fx.ctx, CreateContent::new(artifact.digest, filename)).await?;
    Ok(unit.id)
}

fn seed_ledger(fx: &Fixture) {
    ledger::create_repository(&fx.ctx, "pypi").unwrap();
    ledger::create_remote(&fx.ctx, "upstream", "https://pypi.org").unwrap();
    ledger::create_publisher(&fx.ctx, "web").unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upload_then_query() {
    let fx = fixture();
    let id = upload(&fx, "shelf_reader-0.1-py2-none-any.whl", METADATA)
        .await
        .unwrap();

    let unit = content::show_content(&fx.ctx, id).unwrap();
    assert_eq!(unit.name, "shelf-reader");
    assert_eq!(unit.packagetype, "bdist_wheel");
    assert_eq!(unit.classifiers.len(), 2);

    let query = ContentQuery {
        filters: vec![
            "author=Austin Macdonald".into(),
            "keywords__contains=shelving".into(),
            "filename__in=shelf_reader-0.1-py2-none-any.whl,other.whl".into(),
        ],
        ..Default::default()
    };
    let found = content::list_content(&fx.ctx, &query).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, id);

    let none = content::list_content(
        &fx.ctx,
        &ContentQuery {
            filters: vec!["packagetype=sdist".into()],
            ..Default::default()
        },
    )
    .unwrap();
    assert!(none.is_empty());

    assert!(fx
        .events
        .events()
        .iter()
        .any(|e| matches!(e, WharfEvent::ContentCreated { content_id, .. } if *content_id == id)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duplicate_upload_conflicts() {
    let fx = fixture();
    upload(&fx, "shelf_reader-0.1-py2-none-any.whl", METADATA)
        .await
        .unwrap();
    let err = upload(&fx, "shelf_reader-0.1-py2-none-any.whl", METADATA)
        .await
        .unwrap_err();
    assert!(matches!(err, WharfError::Conflict(_)));
    assert_eq!(
        content::list_content(&fx.ctx, &ContentQuery::default())
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_inputs_fail_before_extraction() {
    let fx = fixture();
    let err = content::create_content(
        &fx.ctx,
        CreateContent {
            artifact: None,
            filename: Some("x.whl".into()),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.field_errors()[0].field, "artifact");

    let workspace = fx.dir.path().join("workspace");
    let leftovers = std::fs::read_dir(&workspace)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[test]
fn test_ledger_validation_and_conflicts() {
    let fx = fixture();
    seed_ledger(&fx);

    assert!(matches!(
        ledger::create_repository(&fx.ctx, "pypi"),
        Err(WharfError::Conflict(_))
    ));
    assert!(matches!(
        ledger::create_remote(&fx.ctx, "bad", "not a url"),
        Err(WharfError::Validation(_))
    ));
    assert!(matches!(
        ledger::create_remote(&fx.ctx, "ftp", "ftp://example.com/"),
        Err(WharfError::Validation(_))
    ));

    let repos = ledger::list_repositories(&fx.ctx).unwrap();
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].latest_version, 0);
    assert_eq!(
        ledger::list_remotes(&fx.ctx, &RemoteQuery::default()).unwrap()[0].url,
        "https://pypi.org/"
    );
}

#[test]
fn test_remote_update_and_filtering() {
    let fx = fixture();
    seed_ledger(&fx);
    let mirror = ledger::create_remote(&fx.ctx, "mirror", "https://mirror.example/").unwrap();
    assert_eq!(mirror.last_updated, mirror.created_at);

    let updated = ledger::update_remote(&fx.ctx, "mirror", "file:///srv/pypi/").unwrap();
    assert_eq!(updated.url, "file:///srv/pypi/");
    assert!(updated.last_updated >= mirror.last_updated);
    assert!(matches!(
        ledger::update_remote(&fx.ctx, "missing", "https://pypi.org/"),
        Err(WharfError::NotFound { .. })
    ));
    assert!(matches!(
        ledger::update_remote(&fx.ctx, "mirror", "ftp://example.com/"),
        Err(WharfError::Validation(_))
    ));

    let names = |filters: &[&str]| -> Vec<String> {
        let query = RemoteQuery {
            filters: filters.iter().map(|f| f.to_string()).collect(),
        };
        ledger::list_remotes(&fx.ctx, &query)
            .unwrap()
            .into_iter()
            .map(|remote| remote.name)
            .collect()
    };

    assert_eq!(names(&["name=mirror"]), ["mirror"]);
    assert_eq!(names(&["name__in=upstream,mirror"]), ["mirror", "upstream"]);
    assert_eq!(names(&["last_updated__gte=2000-01-01"]), ["mirror", "upstream"]);
    assert!(names(&["last_updated__lt=2000-01-01"]).is_empty());
    assert!(names(&["last_updated__range=2000-01-01,2000-12-31"]).is_empty());
    assert!(matches!(
        ledger::list_remotes(
            &fx.ctx,
            &RemoteQuery {
                filters: vec!["url=https://pypi.org/".into()],
            }
        ),
        Err(WharfError::InvalidRequest(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_add_content_creates_version() {
    let fx = fixture();
    seed_ledger(&fx);
    let id = upload(&fx, "shelf_reader-0.1-py2-none-any.whl", METADATA)
        .await
        .unwrap();

    let version = ledger::add_content(&fx.ctx, "pypi", &[id]).unwrap();
    assert_eq!(version.number, 1);
    assert_eq!(version.content_count, 1);

    assert!(matches!(
        ledger::add_content(&fx.ctx, "pypi", &[id + 100]),
        Err(WharfError::Validation(_))
    ));

    let in_version = content::list_content(
        &fx.ctx,
        &ContentQuery {
            repository_version: Some(VersionRef {
                repository: "pypi".into(),
                number: 1,
            }),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(in_version.len(), 1);

    let versions = ledger::list_versions(&fx.ctx, "pypi").unwrap();
    assert_eq!(
        versions.iter().map(|v| v.number).collect::<Vec<_>>(),
        vec![0, 1]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sync_then_publish_latest() {
    let fx = fixture();
    seed_ledger(&fx);

    let sync = jobs::trigger_sync(
        &fx.ctx,
        &SyncRequest {
            repository: "pypi".into(),
            remote: "upstream".into(),
            mirror: false,
        },
    )
    .unwrap();
    let publish = jobs::trigger_publish(
        &fx.ctx,
        &PublishRequest {
            publisher: "web".into(),
            repository: Some("pypi".into()),
            repository_version: None,
        },
    )
    .unwrap();
    assert_eq!(jobs::job_status(&fx.ctx, sync.job_id).unwrap().state, JobState::Queued);

    let processed = jobs::run_workers(
        &fx.ctx,
        &WorkerRunOptions {
            workers: None,
            drain: true,
        },
        std::future::pending(),
    )
    .await
    .unwrap();
    assert_eq!(processed, 2);

    let status = jobs::job_status(&fx.ctx, publish.job_id).unwrap();
    assert_eq!(status.state, JobState::Succeeded);
    assert_eq!(status.result.unwrap()["version"], 1);

    let publications = ledger::list_publications(&fx.ctx, Some("web")).unwrap();
    assert_eq!(publications.len(), 1);
    assert_eq!(publications[0].job_id, Some(publish.job_id));
}

struct Upstream(i32);

impl RemoteFetcher for Upstream {
    fn fetch(&self, _ctx: &JobContext, remote: &Remote) -> WharfResult<Vec<i32>> {
        assert_eq!(remote.name, "upstream");
        Ok(vec![self.0])
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sync_pulls_fetched_content() {
    let fx = fixture();
    let id = upload(&fx, "shelf_reader-0.1-py2-none-any.whl", METADATA)
        .await
        .unwrap();
    seed_ledger(&fx);

    let ctx = WharfContext::with_fetcher(
        config(&fx.dir),
        fx.events.clone(),
        Arc::new(Upstream(id)),
    );
    let handle = jobs::trigger_sync(
        &ctx,
        &SyncRequest {
            repository: "pypi".into(),
            remote: "upstream".into(),
            mirror: true,
        },
    )
    .unwrap();
    jobs::run_workers(
        &ctx,
        &WorkerRunOptions {
            workers: Some(1),
            drain: true,
        },
        std::future::pending(),
    )
    .await
    .unwrap();

    let status = jobs::job_status(&ctx, handle.job_id).unwrap();
    assert_eq!(status.state, JobState::Succeeded);
    assert_eq!(status.result.unwrap()["content_count"], 1);
}

#[test]
fn test_cancel_and_list_jobs() {
    let fx = fixture();
    seed_ledger(&fx);
    let request = SyncRequest {
        repository: "pypi".into(),
        remote: "upstream".into(),
        mirror: false,
    };
    let first = jobs::trigger_sync(&fx.ctx, &request).unwrap();
    jobs::trigger_sync(&fx.ctx, &request).unwrap();

    assert_eq!(jobs::cancel_job(&fx.ctx, first.job_id).unwrap(), JobState::Canceled);
    assert_eq!(
        jobs::list_jobs(&fx.ctx, Some(JobState::Queued), None)
            .unwrap()
            .len(),
        1
    );
    assert!(jobs::recover_jobs(&fx.ctx).unwrap().is_empty());
    assert!(matches!(
        jobs::trigger_sync(
            &fx.ctx,
            &SyncRequest {
                repository: "missing".into(),
                ..request
            }
        ),
        Err(WharfError::NotFound { .. })
    ));
}
