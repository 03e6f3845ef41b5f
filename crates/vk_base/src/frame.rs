//! Per-frame protocol
//!
//! One `render()` call walks a fixed sequence of states:
//!
//! Idle -> Acquiring -> WaitingForFence -> Recording -> Submitted ->
//! Presented -> Idle
//!
//! The sequence is expressed over the [`FrameFlow`] trait so the ordering
//! rules can be exercised against a mock without a device. The renderer
//! provides the real implementation; every operation maps to one Vulkan
//! call cluster.
//!
//! Ordering rules enforced here:
//! - the fence for image `i` is waited before command buffer `i` is touched;
//! - the fence is reset only after that wait succeeded, and before the
//!   buffer is resubmitted;
//! - any failure aborts the frame immediately and no further operation is
//!   issued.

use crate::context::VulkanResult;

/// The six per-frame operations, in the order [`drive_frame`] invokes them.
///
/// `acquire_image` blocks until the presentation engine hands back an image
/// index; `wait_fence` blocks until the previous submission against that
/// index has finished executing. Both are the protocol's only suspension
/// points outside teardown.
pub trait FrameFlow {
    /// Acquire the next presentable image, signaling the acquire semaphore
    fn acquire_image(&mut self) -> VulkanResult<u32>;

    /// Block until the submission fence for `image_index` signals
    fn wait_fence(&mut self, image_index: u32) -> VulkanResult<()>;

    /// Re-record command buffer `image_index`: begin, render pass, delegate
    /// commands, end
    fn record(&mut self, image_index: u32) -> VulkanResult<()>;

    /// Reset the submission fence for `image_index` ahead of resubmission
    fn reset_fence(&mut self, image_index: u32) -> VulkanResult<()>;

    /// Submit command buffer `image_index`, waiting on the acquire semaphore
    /// and signaling the render semaphore plus the fence
    fn submit(&mut self, image_index: u32) -> VulkanResult<()>;

    /// Queue the image for presentation, waiting on the render semaphore
    fn present(&mut self, image_index: u32) -> VulkanResult<()>;
}

/// Run one frame through the protocol, returning the image index rendered.
///
/// Errors are fatal to the frame: the `?` on each step guarantees nothing
/// further is issued once any operation reports a non-success result.
pub fn drive_frame<F: FrameFlow + ?Sized>(flow: &mut F) -> VulkanResult<u32> {
    let index = flow.acquire_image()?;
    flow.wait_fence(index)?;
    flow.record(index)?;
    flow.reset_fence(index)?;
    flow.submit(index)?;
    flow.present(index)?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VulkanError;
    use ash::vk;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Acquire(u32),
        WaitFence(u32),
        Record(u32),
        ResetFence(u32),
        Submit(u32),
        Present(u32),
    }

    /// Mock flow that hands out a scripted acquire sequence and records
    /// every operation in order.
    struct ScriptedFlow {
        acquire_script: Vec<u32>,
        next_acquire: usize,
        ops: Vec<Op>,
        fail_present_on_frame: Option<usize>,
        frames_presented: usize,
    }

    impl ScriptedFlow {
        fn new(acquire_script: Vec<u32>) -> Self {
            Self {
                acquire_script,
                next_acquire: 0,
                ops: Vec::new(),
                fail_present_on_frame: None,
                frames_presented: 0,
            }
        }
    }

    impl FrameFlow for ScriptedFlow {
        fn acquire_image(&mut self) -> VulkanResult<u32> {
            let index = self.acquire_script[self.next_acquire];
            self.next_acquire += 1;
            self.ops.push(Op::Acquire(index));
            Ok(index)
        }

        fn wait_fence(&mut self, image_index: u32) -> VulkanResult<()> {
            self.ops.push(Op::WaitFence(image_index));
            Ok(())
        }

        fn record(&mut self, image_index: u32) -> VulkanResult<()> {
            self.ops.push(Op::Record(image_index));
            Ok(())
        }

        fn reset_fence(&mut self, image_index: u32) -> VulkanResult<()> {
            self.ops.push(Op::ResetFence(image_index));
            Ok(())
        }

        fn submit(&mut self, image_index: u32) -> VulkanResult<()> {
            self.ops.push(Op::Submit(image_index));
            Ok(())
        }

        fn present(&mut self, image_index: u32) -> VulkanResult<()> {
            if self.fail_present_on_frame == Some(self.frames_presented) {
                return Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST));
            }
            self.ops.push(Op::Present(image_index));
            self.frames_presented += 1;
            Ok(())
        }
    }

    #[test]
    fn frame_runs_protocol_in_order() {
        let mut flow = ScriptedFlow::new(vec![0]);
        let index = drive_frame(&mut flow).unwrap();
        assert_eq!(index, 0);
        assert_eq!(
            flow.ops,
            vec![
                Op::Acquire(0),
                Op::WaitFence(0),
                Op::Record(0),
                Op::ResetFence(0),
                Op::Submit(0),
                Op::Present(0),
            ]
        );
    }

    #[test]
    fn fence_wait_precedes_every_command_buffer_reuse() {
        // Two-image swapchain, acquire sequence [0, 1, 0, 1].
        let mut flow = ScriptedFlow::new(vec![0, 1, 0, 1]);
        for _ in 0..4 {
            drive_frame(&mut flow).unwrap();
        }

        for image in 0..2u32 {
            let mut waited = false;
            for op in &flow.ops {
                match *op {
                    Op::WaitFence(i) if i == image => waited = true,
                    // Reuse of the buffer without an interleaved wait is the
                    // bug this protocol exists to prevent.
                    Op::Record(i) if i == image => {
                        assert!(waited, "record of buffer {image} without prior fence wait");
                        waited = false;
                    }
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn fence_reset_sits_between_wait_and_submit() {
        let mut flow = ScriptedFlow::new(vec![0, 1, 0, 1]);
        for _ in 0..4 {
            drive_frame(&mut flow).unwrap();
        }

        // For each frame's slice of six ops, reset must come after the wait
        // and before the submit for the same index.
        for frame_ops in flow.ops.chunks(6) {
            let wait_pos = frame_ops
                .iter()
                .position(|op| matches!(op, Op::WaitFence(_)))
                .unwrap();
            let reset_pos = frame_ops
                .iter()
                .position(|op| matches!(op, Op::ResetFence(_)))
                .unwrap();
            let submit_pos = frame_ops
                .iter()
                .position(|op| matches!(op, Op::Submit(_)))
                .unwrap();
            assert!(wait_pos < reset_pos);
            assert!(reset_pos < submit_pos);
        }
    }

    #[test]
    fn fatal_present_stops_the_frame_immediately() {
        let mut flow = ScriptedFlow::new(vec![0, 1]);
        flow.fail_present_on_frame = Some(0);

        let err = drive_frame(&mut flow).unwrap_err();
        assert!(matches!(err, VulkanError::Api(vk::Result::ERROR_DEVICE_LOST)));

        // Everything up to present ran once; no Present op was recorded and
        // nothing was issued after the failure.
        let ops_at_failure = flow.ops.clone();
        assert_eq!(
            ops_at_failure,
            vec![
                Op::Acquire(0),
                Op::WaitFence(0),
                Op::Record(0),
                Op::ResetFence(0),
                Op::Submit(0),
            ]
        );
    }

    #[test]
    fn acquire_failure_issues_no_fence_or_buffer_work() {
        struct FailingAcquire;
        impl FrameFlow for FailingAcquire {
            fn acquire_image(&mut self) -> VulkanResult<u32> {
                Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DATE_KHR))
            }
            fn wait_fence(&mut self, _: u32) -> VulkanResult<()> {
                panic!("wait_fence after failed acquire")
            }
            fn record(&mut self, _: u32) -> VulkanResult<()> {
                panic!("record after failed acquire")
            }
            fn reset_fence(&mut self, _: u32) -> VulkanResult<()> {
                panic!("reset_fence after failed acquire")
            }
            fn submit(&mut self, _: u32) -> VulkanResult<()> {
                panic!("submit after failed acquire")
            }
            fn present(&mut self, _: u32) -> VulkanResult<()> {
                panic!("present after failed acquire")
            }
        }

        let err = drive_frame(&mut FailingAcquire).unwrap_err();
        assert!(matches!(
            err,
            VulkanError::Api(vk::Result::ERROR_OUT_OF_DATE_KHR)
        ));
    }
}
