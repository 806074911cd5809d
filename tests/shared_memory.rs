mod common;

use common::*;
use offscreen_map::prelude::*;
use offscreen_map::SharedFrameBuffer;
use std::thread;

#[test]
fn test_reader_wakes_with_published_record() {
    let buffer = Arc::new(SharedFrameBuffer::new());
    let reader = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || buffer.wait_and_load(0, Duration::from_secs(5)))
    };

    let published = RenderSnapshot::new(
        Size::new(800, 600),
        ViewState::new(Point::new(1.5, 2.5), 0.5, 0.0),
    );
    buffer.publish(&published);

    let (read, generation) = reader.join().unwrap().expect("reader timed out");
    assert_eq!(read, published);
    assert_eq!(generation, buffer.generation());
}

#[test]
fn test_rapid_writes_are_coalesced() {
    let buffer = SharedFrameBuffer::new();
    let mut last = 0;
    for i in 0..10 {
        let snapshot =
            RenderSnapshot::new(Size::new(10, 10), ViewState::new(Point::new(i as f64, 0.0), 1.0, 0.0));
        last = buffer.publish(&snapshot);
    }
    let (read, generation) = buffer.wait_and_load(0, Duration::from_millis(10)).unwrap();
    assert_eq!(generation, last);
    assert_eq!(read.view_state.center, Point::new(9.0, 0.0));
    assert!(buffer
        .wait_and_load(generation, Duration::from_millis(10))
        .is_none());
}

#[test]
fn test_coordinator_publishes_through_shared_buffer() {
    init_logging();
    let (backend, calls) = RecordingBackend::new();
    let mut coordinator = CoordinatorBuilder::new()
        .with_profile(RenderProfile::HighThroughput)
        .with_view_state(ViewState::new(Point::new(512.0, 512.0), 1.0, 0.0))
        .with_tile_source(Box::new(test_source()))
        .with_fetcher(Box::new(ScriptedFetcher::default()))
        .spawn(Box::new(backend), surface())
        .unwrap();
    assert_eq!(coordinator.strategy(), ChannelStrategy::SharedMemory);
    coordinator.wait_until_ready(Duration::from_secs(5)).unwrap();

    for _ in 0..20 {
        coordinator.pan_by_pixels(2.0, 0.0);
        let mut frame_state = coordinator.frame_state(Size::new(256, 256));
        coordinator.render(&mut frame_state).unwrap();
        assert!(!frame_state.animate);
        assert!(!coordinator.is_outstanding());
    }

    let latest = *coordinator.view_state();
    assert!(eventually(|| renders(&calls)
        .last()
        .map_or(false, |s| s.view_state == latest)));
    assert!(renders(&calls).len() <= 20);

    // No acknowledgement path, so no compensation either.
    assert!(coordinator.display().rendered_view().is_none());
    assert!(coordinator.display().transform().is_identity());
    coordinator.shutdown().unwrap();
}

#[test]
fn test_shutdown_wakes_a_waiting_worker() {
    init_logging();
    let (backend, _calls) = RecordingBackend::new();
    let mut coordinator = CoordinatorBuilder::new()
        .with_options(RenderOptions::default().with_strategy(ChannelStrategy::SharedMemory))
        .with_tile_source(Box::new(test_source()))
        .with_fetcher(Box::new(ScriptedFetcher::default()))
        .spawn(Box::new(backend), surface())
        .unwrap();
    coordinator.wait_until_ready(Duration::from_secs(5)).unwrap();

    let started = Instant::now();
    coordinator.shutdown().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
}
