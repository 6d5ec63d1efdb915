use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use mpc_messaging::queues::{AsyncQueue, StreamError};

#[tokio::test]
async fn handler_sees_items_in_order() {
    let queue = Arc::new(AsyncQueue::new());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let handle = queue.stream(move |item: u32| tx.send(item));
    for item in 0..10 {
        queue.push(item).unwrap();
    }

    for expected in 0..10 {
        assert_eq!(Some(expected), rx.recv().await);
    }

    handle.stop();
    assert!(handle.join().await.is_ok());
}

#[tokio::test]
async fn no_items_after_stop() {
    let queue = Arc::new(AsyncQueue::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let handle = queue.stream(move |_: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, String>(())
    });

    queue.push(1).unwrap();
    while calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    handle.stop();
    while !handle.is_finished() {
        tokio::task::yield_now().await;
    }

    queue.push(2).unwrap();
    queue.push(3).unwrap();
    tokio::task::yield_now().await;

    assert_eq!(1, calls.load(Ordering::SeqCst));
    assert_eq!(2, queue.len());
    assert!(handle.join().await.is_ok());
}

#[tokio::test]
async fn stop_with_buffered_items() {
    let queue = Arc::new(AsyncQueue::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let handle = queue.stream(move |_: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, String>(())
    });

    // The Task has not run yet, so everything stays buffered
    for item in 0..3 {
        queue.push(item).unwrap();
    }
    handle.stop();

    assert!(handle.join().await.is_ok());
    assert_eq!(0, calls.load(Ordering::SeqCst));
    assert_eq!(3, queue.len());
}

#[tokio::test]
async fn close_stops_all_streams() {
    let queue = Arc::new(AsyncQueue::<u32>::new());

    let first = queue.stream(|_| Ok::<_, String>(()));
    let second = queue.stream(|_| Ok::<_, String>(()));
    while queue.waiting() < 2 {
        tokio::task::yield_now().await;
    }

    queue.close();

    assert!(first.join().await.is_ok());
    assert!(second.join().await.is_ok());
}

#[tokio::test]
async fn handler_error_terminates() {
    let queue = Arc::new(AsyncQueue::new());

    let handle = queue.stream(|item: &'static str| {
        if item == "bad" {
            return Err("rejected bad item");
        }
        Ok(())
    });

    queue.push("good").unwrap();
    queue.push("bad").unwrap();

    match handle.join().await {
        Err(StreamError::Handler(err)) => assert_eq!("rejected bad item", err),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(!queue.is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_across_threads() {
    let queue = Arc::new(AsyncQueue::new());
    let sum = Arc::new(AtomicUsize::new(0));

    let total = sum.clone();
    let handle = queue.stream(move |item: usize| {
        total.fetch_add(item, Ordering::SeqCst);
        Ok::<_, String>(())
    });

    let producer = queue.clone();
    tokio::spawn(async move {
        for item in 1..=100 {
            producer.push(item).unwrap();
        }
    })
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while sum.load(Ordering::SeqCst) != 5050 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    handle.stop();
    assert!(handle.join().await.is_ok());
}
