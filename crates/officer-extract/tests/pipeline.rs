//! End-to-end pipeline behavior over a scripted site.

mod common;

use std::collections::HashSet;

use common::*;
use officer_extract::model::{Dataset, EntryStub};
use officer_extract::pipeline::{fixed_clock, CrawlAborted, Pipeline};
use officer_extract::renderer::RenderClient;
use officer_extract::ExtractError;

/// Four populated list pages, an empty fifth; "107" is listed twice.
fn catalog() -> Vec<(String, Reply)> {
    let pages: [&[&str]; 4] = [&["101", "102", "103"], &["104", "55", "107"], &["107", "108"], &["109"]];
    let mut replies: Vec<(String, Reply)> = pages
        .iter()
        .enumerate()
        .map(|(i, ids)| (list_url(i as u32 + 1), Reply::Html(list_page(ids))))
        .collect();
    replies.push((list_url(5), Reply::Html(list_page(&[]))));

    for id in ["101", "102", "103", "104", "55", "107", "108", "109"] {
        replies.push((detail_url(id), Reply::Html(detail_page(id))));
    }
    replies
}

fn pipeline(dir: &std::path::Path) -> Pipeline {
    Pipeline::new(config(dir), fixed_clock(fixed_ts()))
}

fn read_dataset(p: &Pipeline) -> Dataset {
    let raw = std::fs::read_to_string(p.writer().dataset_path()).unwrap();
    serde_json::from_str(&raw).unwrap()
}

async fn run(p: &Pipeline, script: &Script) -> officer_extract::RunSummary {
    let s = script.clone();
    p.run_all(move || {
        let client = s.client();
        async move { Ok::<Box<dyn RenderClient>, ExtractError>(client) }
    })
    .await
    .unwrap()
}

// ─────────────────────── list discovery ───────────────────────

#[tokio::test]
async fn test_crawl_stops_at_empty_page_and_dedups() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path());
    let script = Script::new(catalog());

    let stubs = p.run_list(script.client()).await.unwrap();

    let ids: Vec<&str> = stubs.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["101", "102", "103", "104", "55", "107", "108", "109"]);
    assert_eq!(script.loads(), (1..=5).map(list_url).collect::<Vec<_>>());
    assert_eq!(script.closed(), 1);

    let written = p.writer().read_stubs().unwrap();
    assert_eq!(written, stubs);
}

#[tokio::test]
async fn test_crawl_abort_discards_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path());
    let mut replies = catalog();
    replies.retain(|(url, _)| url != &list_url(2));
    replies.push((list_url(2), Reply::Timeout));
    let script = Script::new(replies);

    let err = p.run_list(script.client()).await.unwrap_err();

    let aborted = err.downcast_ref::<CrawlAborted>().unwrap();
    assert_eq!(aborted.page, 2);
    assert_eq!(aborted.discarded, 3);
    assert!(matches!(aborted.source, ExtractError::Timeout { .. }));
    assert!(!p.writer().stubs_path().exists());
    assert_eq!(script.closed(), 1);
}

#[tokio::test]
async fn test_disabled_next_stops_after_current_page() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path());
    let last = list_page(&["1", "2"]).replace(r#"class="next""#, r#"class="next" aria-disabled="true""#);
    let script = Script::new(vec![(list_url(1), Reply::Html(last))]);

    let stubs = p.run_list(script.client()).await.unwrap();

    assert_eq!(stubs.len(), 2);
    assert_eq!(script.loads().len(), 1);
}

#[tokio::test]
async fn test_json_list_without_metadata_runs_to_empty_page() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path());
    let script = Script::new(vec![
        (list_url(1), Reply::Json(r#"[{"id":"1","url":"/officers/1"}]"#.into())),
        (list_url(2), Reply::Json(r#"[{"id":"2","url":"/officers/2"}]"#.into())),
        (list_url(3), Reply::Json("[]".into())),
    ]);

    let stubs = p.run_list(script.client()).await.unwrap();

    assert_eq!(stubs.len(), 2);
    assert_eq!(script.loads().len(), 3);
}

// ─────────────────────── enrichment ───────────────────────

#[tokio::test]
async fn test_failed_entity_is_skipped_and_rest_enriched() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path());
    let mut replies = catalog();
    replies.retain(|(url, _)| url != &detail_url("55"));
    replies.push((detail_url("55"), Reply::Timeout));
    let script = Script::new(replies);

    let summary = run(&p, &script).await;

    assert_eq!(summary.discovered, 8);
    assert_eq!(summary.enriched, 7);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].id, "55");
    assert_eq!(summary.skipped[0].kind, "timeout");

    let dataset = read_dataset(&p);
    assert_eq!(dataset.count, 7);
    assert!(dataset.officers.iter().all(|r| r.id != "55"));

    let stub_ids: HashSet<String> = p.writer().read_stubs().unwrap().into_iter().map(|s| s.id).collect();
    assert!(dataset.officers.iter().all(|r| stub_ids.contains(&r.id)));

    // list client + details client
    assert_eq!(script.closed(), 2);
}

#[tokio::test]
async fn test_records_merge_detail_over_stub() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path());
    let script = Script::new(catalog());

    run(&p, &script).await;
    let dataset = read_dataset(&p);

    let kirk = &dataset.officers[0];
    assert_eq!(kirk.id, "101");
    assert_eq!(kirk.path, "/officers/101");
    assert_eq!(kirk.rarity, "Epic");
    assert_eq!(kirk.group, "Crew 101");
    assert_eq!(kirk.officer_ability, "Ability of 101");
    assert_eq!(kirk.traits, vec!["Starfleet"]);
    assert_eq!(kirk.source, detail_url("101"));
    assert_eq!(kirk.extracted_at, "2026-06-01T08:30:00.000Z");
    assert_eq!(dataset.source, BASE);
    assert_eq!(dataset.last_run, "2026-06-01T08:30:00.000Z");
}

#[tokio::test]
async fn test_details_without_stub_file_fails_and_closes() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path());
    let script = Script::new(catalog());

    let err = p.run_details(script.client()).await.unwrap_err();

    assert!(matches!(err.downcast_ref::<ExtractError>(), Some(ExtractError::Io { .. })));
    assert_eq!(script.closed(), 1);
    assert!(script.loads().is_empty());
}

#[tokio::test]
async fn test_details_enrich_repeated_stub_once() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path());
    let stubs = vec![
        EntryStub::new("107", "/officers/107").with_name("Officer 107"),
        EntryStub::new("107", "/officers/107").with_name("Officer 107"),
    ];
    p.writer().write_stubs(&stubs).unwrap();
    let script = Script::new(catalog());

    let summary = p.run_details(script.client()).await.unwrap();

    assert_eq!(summary.discovered, 1);
    assert_eq!(summary.enriched, 1);
    assert_eq!(script.loads(), vec![detail_url("107")]);
    assert_eq!(read_dataset(&p).count, 1);
}

#[tokio::test]
async fn test_dataset_write_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path());
    // a directory in the dataset's place makes the final rename fail
    std::fs::create_dir_all(p.writer().dataset_path().join("occupied")).unwrap();
    let script = Script::new(catalog());

    let s = script.clone();
    let err = p
        .run_all(move || {
            let client = s.client();
            async move { Ok::<Box<dyn RenderClient>, ExtractError>(client) }
        })
        .await
        .unwrap_err();

    assert!(
        matches!(err.downcast_ref::<ExtractError>(), Some(ExtractError::Io { .. })),
        "got {err:?}"
    );
    assert_eq!(script.closed(), 2);
    assert_eq!(p.writer().read_stubs().unwrap().len(), 8);
    let tmp = dir.path().join("officer_details.json.tmp");
    assert!(!tmp.exists());
}

#[tokio::test]
async fn test_rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path());
    let script = Script::new(catalog());

    run(&p, &script).await;
    let stubs_first = std::fs::read(p.writer().stubs_path()).unwrap();
    let dataset_first = std::fs::read(p.writer().dataset_path()).unwrap();

    run(&p, &script).await;
    assert_eq!(std::fs::read(p.writer().stubs_path()).unwrap(), stubs_first);
    assert_eq!(std::fs::read(p.writer().dataset_path()).unwrap(), dataset_first);
}
