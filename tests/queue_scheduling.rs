mod support;

use chat_dispatch::queue::{JobError, JobQueue};
use chat_dispatch::worker::{Worker, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use support::{job_id, keyed, unkeyed, Event, ScriptedAgent};

fn start(agent: &Arc<ScriptedAgent>, max_connections: usize) -> (Arc<JobQueue>, Worker) {
    let queue = Arc::new(JobQueue::new());
    let worker = Worker::new(
        Arc::clone(agent) as Arc<dyn chat_dispatch::JobAgent>,
        WorkerConfig::new().with_max_connections(max_connections),
    );
    worker.start(Arc::clone(&queue));
    (queue, worker)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_result_is_index_aligned_with_submission() {
    let agent = Arc::new(
        ScriptedAgent::new(Duration::from_millis(2))
            .with_delay("a", Duration::from_millis(30))
            .failing("c", 400),
    );
    let (queue, _worker) = start(&agent, 10);

    let jobs = vec![
        keyed("a", "t1"),
        keyed("b", "t2"),
        unkeyed("c"),
        keyed("d", "t1"),
    ];
    let result = queue.execute_jobs(jobs.clone()).await.unwrap();

    assert_eq!(result.len(), jobs.len());
    for (response, job) in result.batch.iter().zip(&jobs) {
        assert_eq!(&response.job, job);
    }
    assert!(!result.success);
    assert_eq!(result.errors.as_ref().map(Vec::len), Some(1));
    assert!(result.batch[2].error().map(JobError::is_api).unwrap_or(false));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_key_jobs_run_in_order_without_overlap() {
    let agent = Arc::new(ScriptedAgent::new(Duration::from_millis(5)));
    let (queue, _worker) = start(&agent, 10);

    let ids: Vec<String> = (0..8).map(|i| format!("m{}", i)).collect();
    let jobs = ids.iter().map(|id| keyed(id, "thread-1")).collect();
    let result = queue.execute_jobs(jobs).await.unwrap();
    assert!(result.success);

    assert_eq!(agent.peak_in_flight(), 1);
    assert_eq!(agent.starts(), ids);

    // Strict alternation: each job ends before the next one starts.
    let events = agent.events();
    for pair in events.chunks(2) {
        match pair {
            [Event::Start(a), Event::End(b)] => assert_eq!(a, b),
            other => panic!("overlapping execution: {:?}", other),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_never_exceeds_max_connections() {
    let agent = Arc::new(ScriptedAgent::new(Duration::from_millis(10)));
    let (queue, worker) = start(&agent, 3);

    let jobs = (0..15).map(|i| unkeyed(&format!("j{}", i))).collect();
    let result = queue.execute_jobs(jobs).await.unwrap();

    assert!(result.success);
    assert_eq!(result.len(), 15);
    assert_eq!(agent.peak_in_flight(), 3);

    let snapshot = worker.snapshot().await;
    assert_eq!(snapshot.connection_count, 0);
    assert!(snapshot.is_idle());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_locked_key_does_not_waste_a_slot() {
    let agent = Arc::new(
        ScriptedAgent::new(Duration::from_millis(5)).with_delay("a1", Duration::from_millis(80)),
    );
    let (queue, _worker) = start(&agent, 2);

    let result = queue
        .execute_jobs(vec![keyed("a1", "A"), keyed("a2", "A"), keyed("b1", "B")])
        .await
        .unwrap();
    assert!(result.success);

    // b1 sits behind a blocked a2 in the queue but still runs alongside a1.
    assert!(
        agent.position(&Event::Start("b1".into())) < agent.position(&Event::End("a1".into()))
    );
    assert!(
        agent.position(&Event::End("a1".into())) < agent.position(&Event::Start("a2".into()))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_in_the_middle_of_a_key_does_not_block_the_rest() {
    let agent = Arc::new(ScriptedAgent::new(Duration::from_millis(5)).failing("second", 400));
    let (queue, _worker) = start(&agent, 4);

    let result = queue
        .execute_jobs(vec![
            keyed("first", "k"),
            keyed("second", "k"),
            keyed("third", "k"),
        ])
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.batch[0].is_success());
    assert!(result.batch[2].is_success());

    let errors = result.errors.as_ref().unwrap();
    assert_eq!(errors.len(), 1);
    let api = errors[0].as_api().unwrap();
    assert_eq!(api.status, 400);
    assert_eq!(api.details[0].property.as_deref(), Some("messages[0].text"));

    assert_eq!(agent.starts(), vec!["first", "second", "third"]);
    assert!(
        agent.position(&Event::End("second".into()))
            < agent.position(&Event::Start("third".into()))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submitters_only_wait_for_their_own_jobs() {
    let agent = Arc::new(
        ScriptedAgent::new(Duration::from_millis(2)).with_delay("slow", Duration::from_millis(150)),
    );
    let (queue, _worker) = start(&agent, 4);

    let slow = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.execute_jobs(vec![keyed("slow", "x")]).await })
    };
    while agent.starts().is_empty() {
        tokio::task::yield_now().await;
    }

    let fast = queue
        .execute_jobs(vec![keyed("fast", "y")])
        .await
        .unwrap();
    assert_eq!(job_id(&fast.batch[0].job), "fast");
    assert!(!slow.is_finished());

    let slow = slow.await.unwrap().unwrap();
    assert!(slow.success);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_jobs_submitted_before_start_are_picked_up() {
    let agent = Arc::new(ScriptedAgent::new(Duration::from_millis(1)));
    let queue = Arc::new(JobQueue::new());

    let submitter = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            queue
                .execute_jobs(vec![keyed("early-1", "k"), keyed("early-2", "k")])
                .await
        })
    };
    while queue.len() < 2 {
        tokio::task::yield_now().await;
    }

    let worker = Worker::new(
        Arc::clone(&agent) as Arc<dyn chat_dispatch::JobAgent>,
        WorkerConfig::new(),
    );
    assert!(worker.start(Arc::clone(&queue)));

    let result = submitter.await.unwrap().unwrap();
    assert!(result.success);
    assert_eq!(agent.starts(), vec!["early-1", "early-2"]);
}
