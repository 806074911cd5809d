mod common;

use common::*;
use offscreen_map::prelude::*;

const WAIT: Duration = Duration::from_secs(5);

fn coordinator(view: ViewState) -> (ControlThreadCoordinator, Arc<std::sync::Mutex<Vec<BackendCall>>>, ScriptedFetcher) {
    init_logging();
    let (backend, calls) = RecordingBackend::new();
    let fetcher = ScriptedFetcher::default();
    let coordinator = CoordinatorBuilder::new()
        .with_profile(RenderProfile::Balanced)
        .with_view_state(view)
        .with_tile_source(Box::new(test_source()))
        .with_fetcher(Box::new(fetcher.clone()))
        .spawn(Box::new(backend), surface())
        .unwrap();
    (coordinator, calls, fetcher)
}

fn view(x: f64, y: f64, resolution: f64) -> ViewState {
    ViewState::new(Point::new(x, y), resolution, 0.0)
}

#[test]
fn test_worker_reports_ready_then_started() {
    let (mut coordinator, calls, _) = coordinator(view(512.0, 512.0, 1.0));
    coordinator.wait_until_ready(WAIT).unwrap();
    assert!(coordinator.is_worker_ready());
    assert!(eventually(|| {
        coordinator.process_events().unwrap();
        coordinator.is_started()
    }));
    assert_eq!(calls.lock().unwrap()[0], BackendCall::Start(vec![7]));
    coordinator.shutdown().unwrap();
}

#[test]
fn test_at_most_one_request_outstanding() {
    let (mut coordinator, calls, _) = coordinator(view(512.0, 512.0, 1.0));
    let size = Size::new(256, 256);

    let mut skipped = 0;
    for i in 0..200 {
        coordinator.pan_by_pixels(1.0, 0.0);
        let mut frame_state = coordinator.frame_state(size);
        let presented = coordinator.render(&mut frame_state).unwrap().frames_presented();

        let in_flight = coordinator.requests_submitted() - presented;
        assert!(in_flight <= 1, "tick {}: {} requests in flight", i, in_flight);
        if frame_state.animate {
            skipped += 1;
            assert!(coordinator.is_outstanding());
        }
    }

    coordinator.wait_for_render(WAIT).unwrap();
    assert_eq!(
        coordinator.requests_submitted(),
        coordinator.display().frames_presented()
    );
    assert_eq!(renders(&calls).len() as u64, coordinator.requests_submitted());
    assert_eq!(coordinator.requests_submitted() + skipped, 200);
    coordinator.shutdown().unwrap();
}

#[test]
fn test_outstanding_request_sets_animate() {
    init_logging();
    let (backend, calls, release) = RecordingBackend::gated();
    let mut coordinator = CoordinatorBuilder::new()
        .with_view_state(view(512.0, 512.0, 1.0))
        .with_tile_source(Box::new(test_source()))
        .with_fetcher(Box::new(ScriptedFetcher::default()))
        .spawn(Box::new(backend), surface())
        .unwrap();
    let size = Size::new(256, 256);

    let mut first = coordinator.frame_state(size);
    coordinator.render(&mut first).unwrap();
    assert!(!first.animate);
    assert!(coordinator.is_outstanding());

    // The worker cannot answer while its render is held.
    let mut second = coordinator.frame_state(size);
    coordinator.render(&mut second).unwrap();
    assert!(second.animate);
    assert_eq!(coordinator.requests_submitted(), 1);

    release.send(()).unwrap();
    assert!(coordinator.wait_for_render(WAIT).unwrap());
    assert_eq!(renders(&calls).len(), 1);

    let mut third = coordinator.frame_state(size);
    coordinator.render(&mut third).unwrap();
    assert!(!third.animate);
    assert_eq!(coordinator.requests_submitted(), 2);

    drop(release);
    coordinator.shutdown().unwrap();
}

#[test]
fn test_compensation_after_acknowledgement() {
    // Rendered at center (10, 0), resolution 2; current view then moves to (0, 0), resolution 1.
    let (mut coordinator, _, _) = coordinator(view(10.0, 0.0, 2.0));
    let mut frame_state = coordinator.frame_state(Size::new(100, 100));
    coordinator.render(&mut frame_state).unwrap();
    assert!(coordinator.wait_for_render(WAIT).unwrap());
    assert!(coordinator.display().transform().is_identity());

    coordinator.set_center(Point::new(0.0, 0.0));
    coordinator.set_resolution(1.0);

    let transform = *coordinator.display().transform();
    assert_eq!(transform.dx, 10.0);
    assert_eq!(transform.dy, 0.0);
    assert_eq!(transform.scale, 2.0);
    assert_eq!(transform.d_rot, 0.0);
    assert_eq!(coordinator.display().css_transform(), "matrix(2, 0, -0, 2, 10, 0)");
    coordinator.shutdown().unwrap();
}

#[test]
fn test_late_acknowledgement_still_drives_compensation() {
    let (mut coordinator, _, _) = coordinator(view(0.0, 0.0, 1.0));
    let mut frame_state = coordinator.frame_state(Size::new(100, 100));
    coordinator.render(&mut frame_state).unwrap();

    // The view moves on before the acknowledgement is processed.
    coordinator.pan_by_pixels(5.0, 0.0);
    assert!(coordinator.wait_for_render(WAIT).unwrap());

    let rendered = coordinator.display().rendered_view().copied().unwrap();
    assert_eq!(rendered.center, Point::new(0.0, 0.0));
    assert_eq!(coordinator.display().transform().dx, -5.0);
    coordinator.shutdown().unwrap();
}

#[test]
fn test_tiles_pushed_before_ready_arrive_in_order() {
    init_logging();
    let (backend, calls) = RecordingBackend::new();
    let extent = Extent::new(0.0, 0.0, 1.0, 1.0);
    let mut coordinator = CoordinatorBuilder::new()
        .with_tile_source(Box::new(test_source()))
        .with_fetcher(Box::new(ScriptedFetcher::default()))
        .with_initial_tile(TileData {
            bytes: vec![0; 4],
            tile_coord: TileKey::new(0, 0, 0),
            extent,
        })
        .spawn(Box::new(backend), surface())
        .unwrap();

    let keys: Vec<_> = (0..5).map(|x| TileKey::new(3, x, 1)).collect();
    for key in &keys {
        coordinator
            .push_tile_data(TileData {
                bytes: vec![1, 2, 3],
                tile_coord: *key,
                extent,
            })
            .unwrap();
    }
    assert!(!coordinator.router().is_worker_ready());
    assert_eq!(coordinator.router().pending_count(), 5);

    coordinator.wait_until_ready(WAIT).unwrap();
    assert_eq!(coordinator.router().pending_count(), 0);
    assert!(eventually(|| ingested(&calls).len() == 6));

    let mut expected = vec![TileKey::new(0, 0, 0)];
    expected.extend(keys);
    assert_eq!(ingested(&calls), expected);
    coordinator.shutdown().unwrap();
}

#[test]
fn test_detached_buffer_cannot_be_pushed() {
    let mut buffer = TransferBuffer::new(vec![9; 16]);
    let bytes = buffer.detach().unwrap();
    assert_eq!(bytes.len(), 16);
    assert!(buffer.is_detached());

    let (tx, _rx) = crossbeam_channel::unbounded();
    let mut router = offscreen_map::TileDataRouter::new(tx);
    let err = router
        .push_tile_data(buffer, TileKey::new(0, 0, 0), Extent::new(0.0, 0.0, 1.0, 1.0))
        .unwrap_err();
    assert!(matches!(err, Error::ChannelTransferFailure(_)));
    assert_eq!(router.pending_count(), 0);
}

#[test]
fn test_initialization_failure_is_surfaced() {
    init_logging();
    let mut coordinator = CoordinatorBuilder::new()
        .with_tile_source(Box::new(test_source()))
        .with_fetcher(Box::new(ScriptedFetcher::default()))
        .spawn(Box::new(RecordingBackend::failing()), surface())
        .unwrap();

    let err = coordinator.wait_until_ready(WAIT).unwrap_err();
    assert!(matches!(err, Error::InitializationFailure(_)));
    assert!(matches!(
        coordinator.shutdown(),
        Err(Error::InitializationFailure(_))
    ));
}

#[test]
fn test_resize_follows_frame_size() {
    let (mut coordinator, calls, _) = coordinator(view(512.0, 512.0, 1.0));
    for size in [Size::new(256, 256), Size::new(256, 256), Size::new(300, 200)] {
        let mut frame_state = coordinator.frame_state(size);
        coordinator.render(&mut frame_state).unwrap();
        assert!(coordinator.wait_for_render(WAIT).unwrap());
    }
    let resizes: Vec<_> = calls
        .lock()
        .unwrap()
        .iter()
        .filter_map(|c| match c {
            BackendCall::Resize(size) => Some(*size),
            _ => None,
        })
        .collect();
    assert_eq!(resizes, vec![Size::new(256, 256), Size::new(300, 200)]);
    coordinator.shutdown().unwrap();
}
