#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::time::Duration;

use api::{
    ErrorKind, JobOutput, PipelineConfig, ResultFormat, ServiceError, Stage, UserId, init_pipeline,
};
use formatter::TRUNCATION_MARKER;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{FakeHosting, FakeIngestion, alice, config, service, wait_processing, wait_terminal};

const THREE_FILES: &[(&str, &str)] = &[
    ("README.md", "# Widgets\nSpinning widgets.\n"),
    ("src/lib.rs", "pub fn spin() -> u32 { 42 }\n"),
    ("Cargo.toml", "[package]\nname = \"widgets\"\n"),
];

#[tokio::test]
async fn test_three_file_repository_round_trip() -> Result<(), Box<dyn Error>> {
    let service = service(
        &config(1),
        FakeHosting::default().with_public("Acme", "Widgets"),
        FakeIngestion::new(THREE_FILES),
    )
    .await;

    let job_id = service.submit(alice(), "https://github.com/acme/widgets").await?;
    let job = wait_terminal(&service, job_id, &alice()).await;

    assert_eq!(job.status.as_str(), "completed");
    assert_eq!(job.progress, 100);
    assert_eq!(job.stage, Stage::Finished);
    let reference = job.reference.expect("reference attached after validation");
    assert_eq!(reference.full_name(), "Acme/Widgets");
    assert_eq!(reference.branch, "main");

    let JobOutput::Json(result) = service.get_result(job_id, &alice(), ResultFormat::Json).await?
    else {
        panic!("expected structured result");
    };
    assert_eq!(result.metadata.file_count, 3);
    assert_eq!(result.metadata.included_files, 3);
    assert!(!result.metadata.truncated);
    assert_eq!(result.metadata.repository_url, "https://github.com/Acme/Widgets");

    let JobOutput::Llm(text) = service.get_result(job_id, &alice(), ResultFormat::Llm).await?
    else {
        panic!("expected document text");
    };
    for (path, content) in THREE_FILES {
        assert!(text.contains(&format!("### File: {path}")));
        assert!(text.contains(content));
    }
    assert!(!text.contains(TRUNCATION_MARKER));
    assert_eq!(text, result.content);
    service.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_over_budget_repository_is_truncated_at_file_boundary() -> Result<(), Box<dyn Error>> {
    let bodies: Vec<(String, String)> = (0..12)
        .map(|i| (format!("src/m{i:02}.rs"), format!("// m{i:02}\n{}\n", "z".repeat(300))))
        .collect();
    let files: Vec<(&str, &str)> = bodies.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();

    let mut config = config(1);
    config.formatter.max_chars = 3_000;
    let service = service(
        &config,
        FakeHosting::default().with_public("acme", "big"),
        FakeIngestion::new(&files),
    )
    .await;

    let job_id = service.submit(alice(), "github.com/acme/big").await?;
    let job = wait_terminal(&service, job_id, &alice()).await;
    let result = job.result().expect("completed");

    assert!(result.metadata.truncated);
    assert!(result.metadata.omitted_files > 0);
    assert!(result.content.chars().count() <= 3_000);
    assert!(result.content.ends_with(TRUNCATION_MARKER));
    for (path, body) in bodies.iter().take(result.metadata.included_files) {
        assert!(result.content.contains(&format!("### File: {path}\n")));
        assert!(result.content.contains(body.as_str()));
    }
    for (path, _) in bodies.iter().skip(result.metadata.included_files) {
        assert!(!result.content.contains(&format!("### File: {path}\n")));
    }
    service.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_validation_failures_are_recorded_on_the_job() -> Result<(), Box<dyn Error>> {
    let service = service(
        &config(2),
        FakeHosting::default().with_private("acme", "secret"),
        FakeIngestion::new(THREE_FILES),
    )
    .await;

    let cases = [
        ("https://github.com/acme/nowhere", ErrorKind::NotFound),
        ("https://github.com/acme/secret", ErrorKind::PrivateRepository),
        ("https://gitlab.com/acme/widgets", ErrorKind::MalformedUrl),
    ];
    for (url, expected) in cases {
        let job_id = service.submit(alice(), url).await?;
        let job = wait_terminal(&service, job_id, &alice()).await;
        let error = job.error().expect("failed job carries an error");
        assert_eq!(error.kind, expected, "{url}");
        assert!(!error.is_transient());
        assert!(job.result().is_none());
        assert!(job.reference.is_none());
    }
    service.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_oversized_repository_is_rejected() -> Result<(), Box<dyn Error>> {
    let service = service(
        &config(1),
        FakeHosting::default().with_public("acme", "monorepo"),
        FakeIngestion::new(THREE_FILES).reporting_bytes(50 * 1024 * 1024),
    )
    .await;

    let job_id = service.submit(alice(), "https://github.com/acme/monorepo").await?;
    let job = wait_terminal(&service, job_id, &alice()).await;
    assert_eq!(job.error().map(|e| e.kind), Some(ErrorKind::ExtractionTooLarge));
    service.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_requests_for_other_users_jobs_are_denied() -> Result<(), Box<dyn Error>> {
    let service = service(
        &config(1),
        FakeHosting::default().with_public("acme", "widgets"),
        FakeIngestion::new(THREE_FILES),
    )
    .await;
    let bob = UserId::new("bob");

    let job_id = service.submit(alice(), "https://github.com/acme/widgets").await?;
    wait_terminal(&service, job_id, &alice()).await;

    let denied = service.get_status(job_id, &bob).await.unwrap_err();
    assert_eq!(denied.kind(), ErrorKind::AccessDenied);
    assert!(matches!(
        service.get_result(job_id, &bob, ResultFormat::Llm).await,
        Err(ServiceError::AccessDenied(_))
    ));
    assert!(service.get_queue_status(job_id, &bob).await.is_err());
    assert!(service.list_jobs(&bob, 10).await?.is_empty());
    assert_eq!(service.list_jobs(&alice(), 10).await?.len(), 1);

    let unknown = api::JobId::new();
    assert!(service.get_status(unknown, &alice()).await?.is_none());
    assert!(service.get_queue_status(unknown, &alice()).await?.is_none());
    assert_eq!(
        service
            .get_result(unknown, &alice(), ResultFormat::Json)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::JobNotFound
    );
    service.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_result_of_unfinished_job_is_invalid_state() -> Result<(), Box<dyn Error>> {
    let service = service(
        &config(1),
        FakeHosting::default().with_public("acme", "slow"),
        FakeIngestion::new(THREE_FILES).with_delay(Duration::from_millis(400)),
    )
    .await;

    let first = service.submit(alice(), "https://github.com/acme/slow").await?;
    let second = service.submit(alice(), "https://github.com/acme/slow").await?;
    wait_processing(&service, first, &alice()).await;

    // One slot: the second job waits at the head of the line.
    let position = service
        .get_queue_status(second, &alice())
        .await?
        .expect("tracked");
    assert_eq!(position.position, 1);
    assert_eq!(service.get_status(second, &alice()).await?.map(|j| j.status.as_str()), Some("queued"));

    for job_id in [first, second] {
        let err = service
            .get_result(job_id, &alice(), ResultFormat::Json)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    wait_terminal(&service, second, &alice()).await;
    assert!(service.get_result(second, &alice(), ResultFormat::Llm).await.is_ok());
    service.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_owned_events_follow_only_the_requesters_jobs() -> Result<(), Box<dyn Error>> {
    let service = service(
        &config(2),
        FakeHosting::default().with_public("acme", "widgets"),
        FakeIngestion::new(THREE_FILES),
    )
    .await;
    let mut events = service.subscribe(alice());

    service.submit(UserId::new("bob"), "https://github.com/acme/widgets").await?;
    let mine = service.submit(alice(), "https://github.com/acme/widgets").await?;

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        let mut received = Vec::new();
        while let Some(event) = events.recv().await {
            let terminal = event.is_terminal();
            received.push(event);
            if terminal {
                break;
            }
        }
        received
    })
    .await?;

    assert!(received.iter().all(|e| e.job_id() == mine));
    assert!(received.last().is_some_and(|e| e.is_terminal()));
    service.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_init_pipeline_against_http_collaborators() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "widgets",
            "full_name": "acme/widgets",
            "private": false,
            "visibility": "public",
            "default_branch": "main"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/ingest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                {"path": "src/lib.rs", "content": "pub fn spin() {}\n"},
                {"path": "Cargo.lock", "content": "# generated\n"}
            ],
            "total_bytes": 29
        })))
        .mount(&server)
        .await;

    let mut config = PipelineConfig::default();
    config.hosting.api_base_url = server.uri();
    config.ingestion.api_base_url = server.uri();
    config.queue = config.queue.with_poll_interval_ms(10);

    let service = init_pipeline(&config).await?;
    let job_id = service.submit(alice(), "https://github.com/acme/widgets").await?;
    let job = wait_terminal(&service, job_id, &alice()).await;

    let result = job.result().expect("completed");
    assert_eq!(result.metadata.file_count, 1);
    assert!(result.content.contains("pub fn spin() {}"));
    assert!(!result.content.contains("Cargo.lock"));
    service.shutdown();
    Ok(())
}
