//! Synthetic full-run test of the frame protocol and resource lifecycle.
//!
//! Drives the per-frame state machine against a mock device that hands out
//! numbered handles and tracks every create/destroy. No GPU involved; the
//! point is the bookkeeping: fence discipline across a long run, zero
//! leaked handles at the end, and teardown in exact reverse creation order.

use std::collections::HashSet;

use vk_base::frame::{drive_frame, FrameFlow};
use vk_base::{VulkanError, VulkanResult};

const IMAGE_COUNT: usize = 2;

/// Mock device: numbered handles, creation/destruction logs.
#[derive(Default)]
struct MockDevice {
    next_handle: u64,
    created: Vec<(u64, &'static str)>,
    destroyed: Vec<u64>,
    live: HashSet<u64>,
}

impl MockDevice {
    fn create(&mut self, kind: &'static str) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.created.push((handle, kind));
        self.live.insert(handle);
        handle
    }

    fn destroy(&mut self, handle: u64) {
        assert!(self.live.remove(&handle), "double destroy of handle {handle}");
        self.destroyed.push(handle);
    }
}

/// Everything the renderer would own, as mock handles in creation order.
struct MockRenderer {
    device: MockDevice,
    creation_order: Vec<u64>,
    fences: Vec<u64>,
    command_buffers: Vec<u64>,
    fence_signaled: Vec<bool>,
    next_image: usize,
    frames_rendered: usize,
    present_failure_on: Option<usize>,
    gpu_calls_after_failure: usize,
    failed: bool,
}

impl MockRenderer {
    fn new() -> Self {
        let mut device = MockDevice::default();
        let mut creation_order = Vec::new();
        let mut track = |device: &mut MockDevice, kind| {
            let h = device.create(kind);
            creation_order.push(h);
            h
        };

        // Fixed startup order: instance, device, swapchain + views, depth,
        // render pass, framebuffers, pool, command buffers, fences,
        // semaphore pair.
        track(&mut device, "instance");
        track(&mut device, "device");
        track(&mut device, "swapchain");
        for _ in 0..IMAGE_COUNT {
            track(&mut device, "image_view");
        }
        track(&mut device, "depth_buffer");
        track(&mut device, "render_pass");
        for _ in 0..IMAGE_COUNT {
            track(&mut device, "framebuffer");
        }
        track(&mut device, "command_pool");
        let command_buffers: Vec<u64> = (0..IMAGE_COUNT)
            .map(|_| track(&mut device, "command_buffer"))
            .collect();
        let fences: Vec<u64> = (0..IMAGE_COUNT)
            .map(|_| track(&mut device, "fence"))
            .collect();
        track(&mut device, "semaphore_image_available");
        track(&mut device, "semaphore_render_finished");

        Self {
            device,
            creation_order,
            fences,
            command_buffers,
            // Fences are created pre-signaled so the first wait succeeds.
            fence_signaled: vec![true; IMAGE_COUNT],
            next_image: 0,
            frames_rendered: 0,
            present_failure_on: None,
            gpu_calls_after_failure: 0,
            failed: false,
        }
    }

    fn note_gpu_call(&mut self) {
        if self.failed {
            self.gpu_calls_after_failure += 1;
        }
    }

    /// Destroy everything in exact reverse creation order.
    fn teardown(mut self) -> MockDevice {
        for &handle in self.creation_order.iter().rev() {
            self.device.destroy(handle);
        }
        self.device
    }
}

impl FrameFlow for MockRenderer {
    fn acquire_image(&mut self) -> VulkanResult<u32> {
        self.note_gpu_call();
        let index = self.next_image as u32;
        self.next_image = (self.next_image + 1) % IMAGE_COUNT;
        Ok(index)
    }

    fn wait_fence(&mut self, image_index: u32) -> VulkanResult<()> {
        self.note_gpu_call();
        // An unbounded wait on a fence nobody will signal is the bug the
        // protocol must never produce; in the mock the previous submission
        // "completes" by the time the wait happens (one frame in flight).
        assert!(
            self.fence_signaled[image_index as usize],
            "wait on fence {image_index} that can never signal"
        );
        Ok(())
    }

    fn record(&mut self, image_index: u32) -> VulkanResult<()> {
        self.note_gpu_call();
        assert!(
            self.fence_signaled[image_index as usize],
            "command buffer {image_index} re-recorded while still in flight"
        );
        let _ = self.command_buffers[image_index as usize];
        Ok(())
    }

    fn reset_fence(&mut self, image_index: u32) -> VulkanResult<()> {
        self.note_gpu_call();
        self.fence_signaled[image_index as usize] = false;
        Ok(())
    }

    fn submit(&mut self, image_index: u32) -> VulkanResult<()> {
        self.note_gpu_call();
        let _ = self.fences[image_index as usize];
        // Single semaphore pair: at most one frame of overlap, so the work
        // retires before the next wait against this image.
        self.fence_signaled[image_index as usize] = true;
        Ok(())
    }

    fn present(&mut self, image_index: u32) -> VulkanResult<()> {
        self.note_gpu_call();
        let _ = image_index;
        if self.present_failure_on == Some(self.frames_rendered) {
            self.failed = true;
            // Exclude this call itself from the post-failure count.
            self.gpu_calls_after_failure = 0;
            return Err(VulkanError::Api(ash::vk::Result::ERROR_SURFACE_LOST_KHR));
        }
        self.frames_rendered += 1;
        Ok(())
    }
}

#[test]
fn hundred_frame_run_and_clean_teardown() {
    let mut renderer = MockRenderer::new();

    for _ in 0..100 {
        drive_frame(&mut renderer).unwrap();
    }
    assert_eq!(renderer.frames_rendered, 100);

    let expected_reverse: Vec<u64> = renderer.creation_order.iter().rev().copied().collect();
    let device = renderer.teardown();

    assert!(device.live.is_empty(), "leaked handles: {:?}", device.live);
    assert_eq!(device.destroyed, expected_reverse);
}

#[test]
fn per_image_slots_match_image_count() {
    let renderer = MockRenderer::new();
    assert_eq!(renderer.command_buffers.len(), IMAGE_COUNT);
    assert_eq!(renderer.fences.len(), IMAGE_COUNT);
    let framebuffers = renderer
        .device
        .created
        .iter()
        .filter(|(_, kind)| *kind == "framebuffer")
        .count();
    assert_eq!(framebuffers, IMAGE_COUNT);
}

#[test]
fn fatal_present_halts_the_loop() {
    let mut renderer = MockRenderer::new();
    renderer.present_failure_on = Some(3);

    let mut result = Ok(());
    let mut frames_attempted = 0;
    for _ in 0..100 {
        frames_attempted += 1;
        result = drive_frame(&mut renderer).map(|_| ());
        // Fatal path: a non-success result ends the run, no retry.
        if result.is_err() {
            break;
        }
    }

    assert!(matches!(
        result,
        Err(VulkanError::Api(ash::vk::Result::ERROR_SURFACE_LOST_KHR))
    ));
    assert_eq!(frames_attempted, 4);
    assert_eq!(renderer.frames_rendered, 3);
    assert_eq!(
        renderer.gpu_calls_after_failure, 0,
        "GPU calls issued after the fatal present"
    );

    // Teardown still releases everything.
    let device = renderer.teardown();
    assert!(device.live.is_empty());
}
