mod support;

use std::sync::Arc;
use std::time::Duration;

use arg_txt_downloader::error::StorageError;
use arg_txt_downloader::models::{Job, ProviderId};
use arg_txt_downloader::orchestrator::{JobRunner, ProcessOptions, RunPolicy};
use arg_txt_downloader::reporting::ScreenshotCapture;
use arg_txt_downloader::storage::{publish_report, BlobKind, BlobStore, LocalBlobStore};
use async_trait::async_trait;
use support::{credentials_for, registry_of, DownloadStep, MockDriver, ScriptedAdapter};

/// 所有上传都失败的存储
struct RejectingStore;

#[async_trait]
impl BlobStore for RejectingStore {
    async fn put(&self, _kind: BlobKind, _bytes: Vec<u8>, name: &str) -> Result<String, StorageError> {
        Err(StorageError::UploadFailed {
            name: name.to_string(),
            reason: "503 Service Unavailable".to_string(),
        })
    }
}

async fn execute(work_dir: &std::path::Path) -> arg_txt_downloader::ExecutionReport {
    let driver = Arc::new(MockDriver::new(work_dir));
    let adapter = Arc::new(
        ScriptedAdapter::new(ProviderId::Suizo, work_dir)
            .with_invoices(&["111", "222"])
            .with_download_steps(&[DownloadStep::Ok, DownloadStep::NoTxt]),
    );

    JobRunner::new(
        driver,
        registry_of(&[adapter]),
        Arc::new(credentials_for(&[ProviderId::Suizo])),
        work_dir,
    )
    .with_policy(RunPolicy {
        max_retries: 0,
        retry_delay: Duration::ZERO,
        execution_timeout: Duration::from_secs(30),
        capture_timeout: Duration::from_secs(5),
    })
    .with_failure_capture(Arc::new(ScreenshotCapture::new(work_dir)))
    .process(
        &[
            Job::new(ProviderId::Suizo, "111", "row 1: A-0001-111"),
            Job::new(ProviderId::Suizo, "222", "row 2: A-0001-222"),
        ],
        &ProcessOptions::default(),
    )
    .await
}

#[tokio::test]
async fn test_publish_to_local_store() {
    let work = tempfile::tempdir().unwrap();
    let artifacts = tempfile::tempdir().unwrap();
    let report = execute(work.path()).await;

    let store = LocalBlobStore::new(artifacts.path());
    let published = publish_report(&store, &report).await;

    let date = report.started_at.format("%Y-%m-%d").to_string();
    assert_eq!(published.failed_uploads, 0);
    assert!(published.log_url.is_some());
    assert_eq!(published.document_urls.len(), 1);
    assert!(published.document_urls["suizo/111"]
        .ends_with(&format!("documents/{}/suizo/111.txt", date)));
    assert_eq!(published.screenshot_urls.len(), 1);
    assert!(published.screenshot_urls[0].contains(&format!("screenshots/{}/suizo/", date)));

    let copied = artifacts
        .path()
        .join("documents")
        .join(&date)
        .join("suizo")
        .join("111.txt");
    assert_eq!(tokio::fs::read_to_string(copied).await.unwrap(), "A;0001;TXT");
}

#[tokio::test]
async fn test_same_invoice_from_two_providers_kept_apart() {
    let work = tempfile::tempdir().unwrap();
    let artifacts = tempfile::tempdir().unwrap();
    let suizo_dir = work.path().join("suizo");
    let monroe_dir = work.path().join("monroe");
    tokio::fs::create_dir_all(&suizo_dir).await.unwrap();
    tokio::fs::create_dir_all(&monroe_dir).await.unwrap();

    let driver = Arc::new(MockDriver::new(work.path()));
    let suizo = Arc::new(ScriptedAdapter::new(ProviderId::Suizo, &suizo_dir).with_invoices(&["777"]));
    let monroe = Arc::new(ScriptedAdapter::new(ProviderId::Monroe, &monroe_dir).with_invoices(&["777"]));

    let report = JobRunner::new(
        driver,
        registry_of(&[suizo, monroe]),
        Arc::new(credentials_for(&[ProviderId::Suizo, ProviderId::Monroe])),
        work.path(),
    )
    .process(
        &[
            Job::new(ProviderId::Suizo, "777", "row 1: A-0001-777"),
            Job::new(ProviderId::Monroe, "777", "row 2: A-0002-777"),
        ],
        &ProcessOptions::default(),
    )
    .await;
    assert_eq!(report.successful, 2);

    let published = publish_report(&LocalBlobStore::new(artifacts.path()), &report).await;

    let date = report.started_at.format("%Y-%m-%d").to_string();
    assert_eq!(published.failed_uploads, 0);
    assert_eq!(
        published.document_urls.keys().collect::<Vec<_>>(),
        vec!["monroe/777", "suizo/777"]
    );
    for slug in ["suizo", "monroe"] {
        let copied = artifacts.path().join("documents").join(&date).join(slug).join("777.txt");
        assert!(copied.exists(), "{} missing", copied.display());
    }
}

#[test]
fn test_upload_failures_are_counted_not_raised() {
    tokio_test::block_on(async {
        let work = tempfile::tempdir().unwrap();
        let report = execute(work.path()).await;

        let published = publish_report(&RejectingStore, &report).await;

        // 日志 + 一个文档 + 一张截图
        assert_eq!(published.failed_uploads, 3);
        assert!(published.log_url.is_none());
        assert!(published.document_urls.is_empty());
    });
}
