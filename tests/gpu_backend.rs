//! wgpu backend checks. Each test returns early on machines without an adapter.

use snapfade::*;

const SIZE: UVec2 = UVec2::new(64, 32);

fn backend() -> Option<GpuBackend> {
    let _ = env_logger::builder().is_test(true).try_init();
    match GpuContext::headless(SIZE.x, SIZE.y) {
        Ok(gpu) => Some(GpuBackend::new(gpu)),
        Err(err) => {
            log::warn!("no GPU adapter, skipping: {err}");
            None
        }
    }
}

#[test]
fn buffers_and_images_are_tracked_by_handle() {
    let Some(mut backend) = backend() else {
        return;
    };
    assert_eq!(backend.viewport_size(), SIZE);

    let buffer = backend.create_offscreen_buffer(SIZE);
    assert_eq!(backend.buffer_size(buffer), Some(SIZE));

    let root = ViewRoot::shared(Color::RED);
    let other = ViewRoot::shared(Color::BLUE);
    backend.redirect(&root, buffer).unwrap();
    assert!(backend.target_for(&root).is_some());
    assert!(backend.target_for(&other).is_none());

    let image = backend.copy_to_still_image(buffer).unwrap();
    let texture = backend.still_image(image).expect("still image is live");
    assert_eq!((texture.width, texture.height), (SIZE.x, SIZE.y));

    backend.end_redirect(buffer);
    assert!(backend.target_for(&root).is_none());

    assert!(backend.release_still_image(image));
    assert!(!backend.release_still_image(image));
    assert!(backend.still_image(image).is_none());

    assert!(backend.release_buffer(buffer));
    assert!(!backend.release_buffer(buffer));
    assert_eq!(backend.buffer_size(buffer), None);
    assert!(matches!(
        backend.copy_to_still_image(buffer),
        Err(TransitionError::UnknownBuffer(_))
    ));
    assert!(matches!(
        backend.redirect(&root, buffer),
        Err(TransitionError::UnknownBuffer(_))
    ));
}

#[test]
fn redirect_moves_between_buffers() {
    let Some(mut backend) = backend() else {
        return;
    };
    let root = ViewRoot::shared(Color::RED);
    let first = backend.create_offscreen_buffer(SIZE);
    let second = backend.create_offscreen_buffer(UVec2::new(16, 16));
    assert_ne!(first, second);

    backend.redirect(&root, first).unwrap();
    backend.redirect(&root, second).unwrap();
    backend.end_redirect(second);
    // The root was only ever redirected to one buffer at a time.
    assert!(backend.target_for(&root).is_none());
}

#[test]
fn overlays_composite_without_validation_errors() {
    let Some(mut backend) = backend() else {
        return;
    };
    let buffer = backend.create_offscreen_buffer(SIZE);
    let image = backend.copy_to_still_image(buffer).unwrap();

    let root = ViewRoot::shared(Color::BLUE);
    let overlay = OverlayHandle::attach(&root, image, PickingMode::ClickThrough);
    overlay.set_opacity(0.5);
    root.borrow_mut().suppress_clear_for(1);

    assert!(!backend.should_clear(&root));
    assert!(backend.should_clear(&root));

    let gpu = backend.gpu();
    let target = RenderTarget::new(gpu, SIZE, "Test Screen");
    target.clear(gpu, wgpu::Color::BLACK);

    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Test Overlay Encoder"),
        });
    backend.draw_overlays(&root, &mut encoder, &target.view, SIZE);
    gpu.queue.submit(std::iter::once(encoder.finish()));
    let error = pollster::block_on(gpu.device.pop_error_scope());
    assert!(error.is_none(), "validation error: {error:?}");

    assert!(backend.release_still_image(image));
    assert!(backend.release_buffer(buffer));
}

#[test]
fn resize_keeps_existing_buffers() {
    let Some(mut backend) = backend() else {
        return;
    };
    let buffer = backend.create_offscreen_buffer(SIZE);
    backend.gpu_mut().resize(128, 64);
    assert_eq!(backend.viewport_size(), UVec2::new(128, 64));
    assert_eq!(backend.buffer_size(buffer), Some(SIZE));

    // Zero-sized resizes are ignored.
    backend.gpu_mut().resize(0, 64);
    assert_eq!(backend.viewport_size(), UVec2::new(128, 64));
}
