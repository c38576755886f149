//! Reloads racing with classification and with each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use cc_core::{ClassificationRequest, Outcome, ResourceType};
use cc_service::{ClassificationService, FetchError, InMemoryFetcher, InitPhase, ListFetcher, ServiceConfig};

const LIST_A: &str = "mem://a.txt";
const LIST_B: &str = "mem://b.txt";

/// Fetcher that can hold the next fetch after it has read its body.
#[derive(Default)]
struct GatedFetcher {
    lists: InMemoryFetcher,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl GatedFetcher {
    fn arm(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    fn armed(&self) -> bool {
        self.gate.lock().unwrap().is_some()
    }
}

#[async_trait]
impl ListFetcher for GatedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let body = self.lists.fetch(url).await;
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        body
    }
}

fn config(urls: &[&str]) -> ServiceConfig {
    ServiceConfig {
        protection_enabled: true,
        annotation_enabled: false,
        block_list_urls: urls.iter().map(|u| u.to_string()).collect(),
        annotation_list_urls: Vec::new(),
    }
}

fn request(url: &str, site: &str) -> ClassificationRequest {
    ClassificationRequest::new(url, site, "news.example", ResourceType::Script, true)
}

async fn wait_until_held(fetcher: &GatedFetcher) {
    while fetcher.armed() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn classification_sees_whole_generations_during_reloads() {
    let fetcher = Arc::new(InMemoryFetcher::new());
    // Generation shapes: (block, exception) or (important).
    fetcher.insert(LIST_A, "||tracker.example^\n");
    fetcher.insert(LIST_B, "||tracker.example^\n@@||tracker.example^\n");

    let service = Arc::new(ClassificationService::new(config(&[LIST_A, LIST_B]), fetcher.clone()));
    service.start().await.expect("starts");

    let done = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..4 {
        let service = service.clone();
        let done = done.clone();
        readers.push(tokio::spawn(async move {
            let req = request("https://cdn.tracker.example/t.js", "tracker.example");
            let mut seen = 0usize;
            while !done.load(Ordering::Relaxed) {
                let result = service.classify_for_block(&req);
                assert_eq!(result.outcome(), Outcome::Success);
                let excepted = result.exception() && !result.hit();
                let important = result.important() && result.hit();
                assert!(excepted || important, "torn result: {result:?}");
                seen += 1;
                tokio::task::yield_now().await;
            }
            seen
        }));
    }

    for round in 0..20 {
        if round % 2 == 0 {
            fetcher.insert(LIST_A, "||tracker.example^$important\n");
        } else {
            fetcher.insert(LIST_A, "||tracker.example^\n");
        }
        let summary = service.reload().await.expect("reloads");
        assert!(summary.installed);
        assert_eq!(summary.block.loaded, 2);
    }

    done.store(true, Ordering::Relaxed);
    for reader in readers {
        assert!(reader.await.expect("reader task") > 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stale_load_loses_to_newer_load() {
    let fetcher = Arc::new(GatedFetcher::default());
    fetcher.lists.insert(LIST_A, "||old.example^\n");

    let service = Arc::new(ClassificationService::new(config(&[LIST_A]), fetcher.clone()));
    service.start().await.expect("starts");

    let release = fetcher.arm();
    let stale = {
        let service = service.clone();
        tokio::spawn(async move { service.reload().await })
    };
    wait_until_held(&fetcher).await;

    fetcher.lists.insert(LIST_A, "||new.example^\n");
    let fresh = service.reload().await.expect("reloads");
    assert!(fresh.installed);

    release.notify_one();
    let stale = stale.await.expect("task").expect("reloads");
    assert!(!stale.installed);
    assert!(stale.ticket < fresh.ticket);

    assert!(service
        .classify_for_block(&request("https://new.example/x.js", "new.example"))
        .hit());
    assert!(!service
        .classify_for_block(&request("https://old.example/x.js", "old.example"))
        .hit());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn load_finishing_after_shutdown_is_discarded() {
    let fetcher = Arc::new(GatedFetcher::default());
    fetcher.lists.insert(LIST_A, "||tracker.example^\n");

    let service = Arc::new(ClassificationService::new(config(&[LIST_A]), fetcher.clone()));
    service.start().await.expect("starts");

    let release = fetcher.arm();
    let pending = {
        let service = service.clone();
        tokio::spawn(async move { service.reload().await })
    };
    wait_until_held(&fetcher).await;

    service.shutdown();
    release.notify_one();

    let summary = pending.await.expect("task").expect("reload was accepted before shutdown");
    assert!(!summary.installed);
    assert_eq!(service.phase(), InitPhase::ShutdownEnded);
    assert_eq!(
        service
            .classify_for_block(&request("https://tracker.example/x.js", "tracker.example"))
            .outcome(),
        Outcome::NotInitialized
    );
}
