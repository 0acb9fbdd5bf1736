use std::sync::Arc;
use std::time::Duration;

use crawl_core::{FrontierTask, NormalizedUrl, SiteScope};
use crawl_engine::Frontier;
use pretty_assertions::assert_eq;

fn url(raw: &str) -> NormalizedUrl {
    NormalizedUrl::parse(raw).unwrap()
}

fn frontier(max_depth: u32, max_pages: Option<usize>) -> Arc<Frontier> {
    let scope = SiteScope::same_domain(&url("https://docs.example.com/"), max_depth, max_pages)
        .unwrap();
    Arc::new(Frontier::new(Arc::new(scope)))
}

#[tokio::test]
async fn duplicate_and_out_of_scope_urls_are_rejected() {
    crawl_logging::initialize_for_tests();
    let frontier = frontier(2, None);
    let seed = FrontierTask::seed(url("https://docs.example.com/"));

    assert!(frontier.try_enqueue(seed.clone()));
    assert!(!frontier.try_enqueue(seed.clone()));
    assert!(!frontier.try_enqueue(FrontierTask::seed(url("https://docs.example.com/#intro"))));
    assert!(!frontier.try_enqueue(seed.child(url("https://other.example.com/"))));

    let too_deep = seed
        .child(url("https://docs.example.com/a"))
        .child(url("https://docs.example.com/a/b"))
        .child(url("https://docs.example.com/a/b/c"));
    assert_eq!(too_deep.depth, 3);
    assert!(!frontier.try_enqueue(too_deep));

    assert_eq!(frontier.queued(), 1);
    assert_eq!(frontier.visited_count(), 1);
}

#[tokio::test]
async fn dequeue_hands_out_tasks_in_discovery_order() {
    crawl_logging::initialize_for_tests();
    let frontier = frontier(3, None);
    let seed = FrontierTask::seed(url("https://docs.example.com/"));
    frontier.try_enqueue(seed.clone());
    frontier.try_enqueue(seed.child(url("https://docs.example.com/b")));
    frontier.try_enqueue(seed.child(url("https://docs.example.com/a")));

    let mut seen = Vec::new();
    for _ in 0..3 {
        let task = frontier.dequeue().await.unwrap();
        seen.push((task.url.path().to_string(), task.sequence));
    }
    assert_eq!(
        seen,
        vec![("/".to_string(), 0), ("/b".to_string(), 1), ("/a".to_string(), 2)]
    );
    assert_eq!(frontier.in_flight(), 3);
    assert!(!frontier.task_done());
    assert!(!frontier.task_done());
    assert!(frontier.task_done());
    assert!(frontier.is_quiescent());
}

#[tokio::test]
async fn concurrent_discovery_enqueues_each_url_once() {
    crawl_logging::initialize_for_tests();
    let frontier = frontier(3, None);
    let parent = FrontierTask::seed(url("https://docs.example.com/"));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let frontier = frontier.clone();
        let parent = parent.clone();
        handles.push(tokio::spawn(async move {
            let mut accepted = 0;
            for page in 0..50 {
                let link = url(&format!("https://docs.example.com/page-{page}"));
                if frontier.try_enqueue(parent.child(link)) {
                    accepted += 1;
                }
                tokio::task::yield_now().await;
            }
            accepted
        }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }
    assert_eq!(total, 50);
    assert_eq!(frontier.queued(), 50);
}

#[tokio::test]
async fn close_wakes_every_blocked_dequeuer() {
    crawl_logging::initialize_for_tests();
    let frontier = frontier(1, None);

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.dequeue().await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(frontier.close());
    assert!(!frontier.close());
    for waiter in waiters {
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("dequeuer woke up")
            .unwrap();
        assert_eq!(result, None);
    }
    assert!(!frontier.try_enqueue(FrontierTask::seed(url("https://docs.example.com/late"))));
}

#[tokio::test]
async fn blocked_dequeuer_receives_later_enqueue() {
    crawl_logging::initialize_for_tests();
    let frontier = frontier(1, None);
    let waiter = {
        let frontier = frontier.clone();
        tokio::spawn(async move { frontier.dequeue().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    frontier.try_enqueue(FrontierTask::seed(url("https://docs.example.com/")));
    let task = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("dequeuer woke up")
        .unwrap()
        .unwrap();
    assert_eq!(task.url, url("https://docs.example.com/"));
}

#[tokio::test]
async fn page_cap_limits_accepted_tasks() {
    crawl_logging::initialize_for_tests();
    let frontier = frontier(5, Some(3));
    let seed = FrontierTask::seed(url("https://docs.example.com/"));
    assert!(frontier.try_enqueue(seed.clone()));

    let accepted = (0..10)
        .filter(|n| frontier.try_enqueue(seed.child(url(&format!("https://docs.example.com/{n}")))))
        .count();
    assert_eq!(accepted, 2);
    assert_eq!(frontier.visited_count(), 3);
}
