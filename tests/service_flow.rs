use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use feedguard::{
    ChannelClassifier, ClassificationResult, ClassifyRequest, DocumentTree, FeedGuard,
    FeedGuardConfig, InMemoryReportStore, MemoryDocument, MemorySettings, NodeId, ReportState,
    ServiceState,
};
use feedguard_core_types::Identifier;
use feedguard_document::{el, ElementSpec, SelectorList};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::sleep;

fn card(id: &str) -> ElementSpec {
    el("ytd-rich-item-renderer").attr("data-video-id", id).child(
        el("ytd-thumbnail").child(
            el("a")
                .attr("id", "thumbnail")
                .attr("href", &format!("/watch?v={id}")),
        ),
    )
}

fn selector(raw: &str) -> SelectorList {
    SelectorList::parse(raw).expect("selector")
}

fn badges(doc: &MemoryDocument) -> Vec<(String, String)> {
    doc.query_all(doc.root(), &selector(".feedguard-badge"))
        .into_iter()
        .map(|badge| {
            (
                doc.attribute(badge, "data-feedguard-id").unwrap_or_default(),
                doc.attribute(badge, "data-feedguard-count").unwrap_or_default(),
            )
        })
        .collect()
}

fn item(doc: &MemoryDocument, id: &str) -> NodeId {
    doc.query_first(doc.root(), &selector(&format!("[data-video-id=\"{id}\"]")))
        .expect("item")
}

/// Background classifier: flags the identifiers it has counts for.
fn spawn_worker(mut rx: mpsc::Receiver<ClassifyRequest>, counts: HashMap<&'static str, u64>) {
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let results = request
                .ids
                .iter()
                .filter_map(|id| {
                    counts
                        .get(id.as_str())
                        .map(|count| ClassificationResult::new(id.clone(), *count as f64, *count))
                })
                .collect();
            let _ = request.reply.send(Ok(results));
        }
    });
}

struct Harness {
    doc: Arc<MemoryDocument>,
    settings: Arc<MemorySettings>,
    guard: FeedGuard,
}

fn harness(counts: HashMap<&'static str, u64>) -> Harness {
    let doc = Arc::new(MemoryDocument::new());
    doc.insert(
        doc.root(),
        el("ytd-app").child(el("ytd-page-manager").child(card("XXXXXXXXXXX"))),
    );
    let (classifier, rx) = ChannelClassifier::new(8);
    spawn_worker(rx, counts);
    let settings = Arc::new(MemorySettings::new(false));
    let guard = FeedGuard::with_remote(
        FeedGuardConfig::default(),
        doc.clone(),
        doc.clone(),
        Arc::new(classifier),
        settings.clone(),
        Arc::new(InMemoryReportStore::new()),
    )
    .expect("service");
    Harness {
        doc,
        settings,
        guard,
    }
}

#[tokio::test(start_paused = true)]
async fn annotates_new_items_and_switches_to_hiding() {
    let h = harness(HashMap::from([("XXXXXXXXXXX", 3), ("YYYYYYYYYYY", 5)]));
    h.guard.start().await.expect("start");
    sleep(Duration::from_millis(50)).await;
    assert_eq!(badges(&h.doc), vec![("XXXXXXXXXXX".into(), "3".into())]);

    let region = h
        .doc
        .query_first(h.doc.root(), &selector("ytd-page-manager"))
        .expect("region");
    h.doc.insert(region, card("YYYYYYYYYYY"));
    sleep(Duration::from_millis(200)).await;
    // still inside the quiet window
    assert_eq!(badges(&h.doc).len(), 1);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(
        badges(&h.doc),
        vec![
            ("XXXXXXXXXXX".into(), "3".into()),
            ("YYYYYYYYYYY".into(), "5".into())
        ]
    );

    h.guard.set_auto_hide(true);
    sleep(Duration::from_millis(50)).await;
    assert!(badges(&h.doc).is_empty());
    for id in ["XXXXXXXXXXX", "YYYYYYYYYYY"] {
        assert!(h.doc.has_class(item(&h.doc, id), "feedguard-hidden"));
    }

    let metrics = h.guard.metrics();
    assert!(metrics.pipeline.passes >= 3);
    assert_eq!(metrics.pipeline.failed_passes, 0);

    h.guard.shutdown();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(h.guard.state(), ServiceState::ShutDown);
    assert_eq!(h.doc.observer_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn persisted_setting_applies_without_override() {
    let h = harness(HashMap::from([("XXXXXXXXXXX", 2)]));
    h.settings.set_auto_hide(true);
    h.guard.start().await.expect("start");
    sleep(Duration::from_millis(50)).await;

    assert!(badges(&h.doc).is_empty());
    assert!(h.doc.has_class(item(&h.doc, "XXXXXXXXXXX"), "feedguard-hidden"));
}

#[tokio::test(start_paused = true)]
async fn navigation_waits_for_the_new_region() {
    let h = harness(HashMap::from([("ZZZZZZZZZZZ", 4)]));
    h.guard.start().await.expect("start");
    sleep(Duration::from_millis(50)).await;

    // the host tears the page down and renders the next one later
    let app = h
        .doc
        .query_first(h.doc.root(), &selector("ytd-app"))
        .expect("app");
    h.doc.remove(app);
    let writer = h.doc.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(2)).await;
        writer.insert(
            writer.root(),
            el("ytd-app").child(el("ytd-page-manager").child(card("ZZZZZZZZZZZ"))),
        );
    });

    h.guard.navigated("https://www.youtube.com/watch?v=ZZZZZZZZZZZ").await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(badges(&h.doc), vec![("ZZZZZZZZZZZ".into(), "4".into())]);
}

#[tokio::test(start_paused = true)]
async fn closed_classifier_channel_is_survivable() {
    let doc = Arc::new(MemoryDocument::new());
    doc.insert(
        doc.root(),
        el("ytd-page-manager").child(card("XXXXXXXXXXX")),
    );
    let (classifier, rx) = ChannelClassifier::new(1);
    drop(rx);
    let guard = FeedGuard::with_remote(
        FeedGuardConfig::default(),
        doc.clone(),
        doc.clone(),
        Arc::new(classifier),
        Arc::new(MemorySettings::default()),
        Arc::new(InMemoryReportStore::new()),
    )
    .expect("service");

    guard.start().await.expect("start");
    sleep(Duration::from_millis(50)).await;
    let metrics = guard.metrics();
    assert_eq!(metrics.pipeline.failed_passes, 1);
    assert_eq!(metrics.pipeline.expected_closures, 1);
    assert_eq!(guard.state(), ServiceState::Running);

    // the next trigger retries
    let region = doc
        .query_first(doc.root(), &selector("ytd-page-manager"))
        .expect("region");
    doc.insert(region, el("ytd-video-renderer").attr("data-video-id", "BBBBBBBBBBB"));
    sleep(Duration::from_secs(1)).await;
    assert_eq!(guard.metrics().pipeline.failed_passes, 2);
}

#[tokio::test]
async fn report_state_round_trips_through_the_service() {
    let h = harness(HashMap::new());
    let id = Identifier::parse("XXXXXXXXXXX").expect("identifier");
    assert_eq!(h.guard.report_state(&id).await, ReportState::NotReported);
    h.guard.set_report_state(&id, ReportState::Reported).await;
    assert_eq!(h.guard.report_state(&id).await, ReportState::Reported);
}
