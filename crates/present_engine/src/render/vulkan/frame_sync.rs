//! Per-frame acquire, submit and present
//!
//! A fixed pool of [`FrameSlot`]s, independent of the swapchain image count, caps
//! how many frames the CPU may have in flight. Each iteration uses the slot under
//! the [`FrameCursor`]:
//!
//! 1. wait on the slot's fence, then acquire an image signaling `image_acquired`
//! 2. reset the fence and submit the image's pre-recorded commands, waiting on
//!    `image_acquired` and signaling `render_finished` and the fence
//! 3. present, waiting on `render_finished`
//!
//! An out-of-date acquire abandons the frame and rebuilds the swapchain. An
//! out-of-date or suboptimal present, or a pending resize, rebuilds it after the
//! present. The cursor advances once per iteration either way.
//!
//! [`drive_frame`] holds that control flow over any [`FrameTarget`];
//! [`FrameSynchronizer`] supplies the one backed by the live swapchain.

use ash::prelude::VkResult;
use ash::vk;

use super::buffer::VertexBuffer;
use super::command_recorder::CommandRecorder;
use super::device::LogicalDevice;
use super::error::{VulkanError, VulkanResult};
use super::swapchain_manager::{SurfaceContext, SwapchainManager};
use super::sync::FrameSlot;
use crate::window::WindowBackend;

/// Index of the frame slot in use, cycling through `0..frames_in_flight`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    current: usize,
    frames_in_flight: usize,
}

impl FrameCursor {
    /// Start at slot 0; at least one slot is always used
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            current: 0,
            frames_in_flight: frames_in_flight.max(1),
        }
    }

    /// Slot for the current iteration
    pub const fn current(&self) -> usize {
        self.current
    }

    /// Number of slots
    pub const fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Move to the next slot, wrapping around
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.frames_in_flight;
        self.current
    }
}

/// Result of asking the swapchain for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available; suboptimal images are still rendered
    Ready {
        /// Index of the acquired swapchain image
        image_index: u32,
        /// The swapchain no longer matches the surface exactly
        suboptimal: bool,
    },
    /// The swapchain can no longer present to the surface
    OutOfDate,
}

/// Result of presenting an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented and the swapchain still matches the surface
    Presented,
    /// Presented or rejected, and the swapchain must be rebuilt
    NeedsRecreate,
}

/// What happened during one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Submitted and presented
    Presented,
    /// Presented, then the swapchain was rebuilt
    PresentedAndRecreated,
    /// Acquire found the swapchain out of date; rebuilt without drawing
    Abandoned,
    /// A rebuild was needed but the window closed before it became drawable
    CloseRequested,
}

/// Interpret the result of `vkAcquireNextImageKHR`
pub fn classify_acquire(result: VkResult<(u32, bool)>) -> VulkanResult<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
            image_index,
            suboptimal,
        }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(result) => Err(VulkanError::FrameOperationFailed {
            operation: "acquire_next_image",
            result,
        }),
    }
}

/// Interpret the result of `vkQueuePresentKHR` together with the resize flag
pub fn classify_present(result: VkResult<bool>, resize_pending: bool) -> VulkanResult<PresentOutcome> {
    match result {
        Ok(false) if !resize_pending => Ok(PresentOutcome::Presented),
        Ok(_) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::NeedsRecreate),
        Err(result) => Err(VulkanError::FrameOperationFailed {
            operation: "queue_present",
            result,
        }),
    }
}

/// The GPU-facing half of one frame, addressed by frame slot
pub trait FrameTarget {
    /// Wait for `slot` to retire, then acquire the next image
    fn acquire(&mut self, slot: usize) -> VulkanResult<AcquireOutcome>;

    /// Submit the commands for `image_index` on `slot` and present the image
    fn submit_and_present(
        &mut self,
        slot: usize,
        image_index: u32,
        resize_pending: bool,
    ) -> VulkanResult<PresentOutcome>;

    /// Whether the window reported a resize that has not been handled
    fn resize_pending(&self) -> bool;

    /// Rebuild the swapchain; `false` when the window closed instead
    fn recreate(&mut self) -> VulkanResult<bool>;
}

/// Run one iteration against `target` on the cursor's slot, then advance the cursor
///
/// The cursor moves exactly once, whatever the outcome, errors included.
pub fn drive_frame<T: FrameTarget + ?Sized>(
    cursor: &mut FrameCursor,
    target: &mut T,
) -> VulkanResult<FrameOutcome> {
    let outcome = run_slot(cursor.current(), target);
    cursor.advance();
    outcome
}

fn run_slot<T: FrameTarget + ?Sized>(slot: usize, target: &mut T) -> VulkanResult<FrameOutcome> {
    let image_index = match target.acquire(slot)? {
        AcquireOutcome::Ready {
            image_index,
            suboptimal,
        } => {
            if suboptimal {
                log::trace!("Acquired suboptimal image {}", image_index);
            }
            image_index
        }
        AcquireOutcome::OutOfDate => {
            log::debug!("Swapchain out of date on acquire, abandoning frame");
            return Ok(if target.recreate()? {
                FrameOutcome::Abandoned
            } else {
                FrameOutcome::CloseRequested
            });
        }
    };

    let resize_pending = target.resize_pending();
    match target.submit_and_present(slot, image_index, resize_pending)? {
        PresentOutcome::Presented => Ok(FrameOutcome::Presented),
        PresentOutcome::NeedsRecreate => Ok(if target.recreate()? {
            FrameOutcome::PresentedAndRecreated
        } else {
            FrameOutcome::CloseRequested
        }),
    }
}

/// Drives the acquire/submit/present cycle over a fixed pool of frame slots
pub struct FrameSynchronizer {
    slots: Vec<FrameSlot>,
    cursor: FrameCursor,
}

impl FrameSynchronizer {
    /// Create `frames_in_flight` slots, each with a signaled fence
    pub fn new(device: &LogicalDevice, frames_in_flight: usize) -> VulkanResult<Self> {
        let cursor = FrameCursor::new(frames_in_flight);
        let slots = (0..cursor.frames_in_flight())
            .map(|_| FrameSlot::new(&device.device))
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!("Created {} frame slots", slots.len());
        Ok(Self { slots, cursor })
    }

    /// Slot used by the next iteration
    pub fn current_frame(&self) -> usize {
        self.cursor.current()
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.cursor.frames_in_flight()
    }

    /// Run one loop iteration, rebuilding the swapchain when it went stale
    ///
    /// The frame cursor advances whether the frame was presented, presented and
    /// followed by a rebuild, or abandoned. Errors are fatal.
    pub fn draw_frame<W: WindowBackend + ?Sized>(
        &mut self,
        ctx: SurfaceContext<'_>,
        window: &mut W,
        swapchains: &mut SwapchainManager,
        recorder: &mut CommandRecorder,
        vertex_buffer: Option<&VertexBuffer>,
    ) -> VulkanResult<FrameOutcome> {
        let mut target = SwapchainTarget {
            slots: &self.slots,
            ctx,
            window,
            swapchains,
            recorder,
            vertex_buffer,
        };
        drive_frame(&mut self.cursor, &mut target)
    }
}

/// The live swapchain, its recorded commands and the frame slots
struct SwapchainTarget<'a, W: WindowBackend + ?Sized> {
    slots: &'a [FrameSlot],
    ctx: SurfaceContext<'a>,
    window: &'a mut W,
    swapchains: &'a mut SwapchainManager,
    recorder: &'a mut CommandRecorder,
    vertex_buffer: Option<&'a VertexBuffer>,
}

impl<W: WindowBackend + ?Sized> FrameTarget for SwapchainTarget<'_, W> {
    fn acquire(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        let slot = &self.slots[slot];
        slot.commands_complete.wait()?;

        let swapchain = self.swapchains.bundle()?.swapchain();
        let result = unsafe {
            swapchain.loader().acquire_next_image(
                swapchain.handle(),
                u64::MAX,
                slot.image_acquired.handle(),
                vk::Fence::null(),
            )
        };
        classify_acquire(result)
    }

    fn submit_and_present(
        &mut self,
        slot: usize,
        image_index: u32,
        resize_pending: bool,
    ) -> VulkanResult<PresentOutcome> {
        let slot = &self.slots[slot];
        let device = self.ctx.device;
        let swapchain = self.swapchains.bundle()?.swapchain();
        let command_buffer = self.recorder.command_buffer(image_index).ok_or(
            VulkanError::SwapchainUnavailable("no command buffer recorded for the acquired image"),
        )?;

        slot.commands_complete.reset()?;

        let wait_semaphores = [slot.image_acquired.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [slot.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            device.device.queue_submit(
                device.graphics_queue,
                &[submit_info],
                slot.commands_complete.handle(),
            )
        }
        .map_err(VulkanError::frame("queue_submit"))?;

        let swapchains = [swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            swapchain
                .loader()
                .queue_present(device.present_queue, &present_info)
        };
        classify_present(result, resize_pending)
    }

    fn resize_pending(&self) -> bool {
        self.window.resize_pending()
    }

    fn recreate(&mut self) -> VulkanResult<bool> {
        self.swapchains
            .recreate(self.ctx, &mut *self.window, &mut *self.recorder, self.vertex_buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[test]
    fn test_cursor_cycles_through_slots() {
        let mut cursor = FrameCursor::new(2);
        assert_eq!(cursor.current(), 0);
        assert_eq!(cursor.advance(), 1);
        assert_eq!(cursor.advance(), 0);
        assert_eq!(cursor.advance(), 1);
    }

    #[test]
    fn test_cursor_stays_in_range() {
        for frames in 1..=4 {
            let mut cursor = FrameCursor::new(frames);
            for iteration in 1..=20 {
                let current = cursor.advance();
                assert!(current < frames);
                assert_eq!(current, iteration % frames);
            }
        }
    }

    #[test]
    fn test_cursor_zero_frames_uses_one_slot() {
        let mut cursor = FrameCursor::new(0);
        assert_eq!(cursor.frames_in_flight(), 1);
        assert_eq!(cursor.advance(), 0);
    }

    #[test]
    fn test_acquire_classification() {
        assert_eq!(
            classify_acquire(Ok((2, false))).unwrap(),
            AcquireOutcome::Ready {
                image_index: 2,
                suboptimal: false
            }
        );
        assert_eq!(
            classify_acquire(Ok((0, true))).unwrap(),
            AcquireOutcome::Ready {
                image_index: 0,
                suboptimal: true
            }
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            AcquireOutcome::OutOfDate
        );
        assert!(matches!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(VulkanError::FrameOperationFailed {
                operation: "acquire_next_image",
                result: vk::Result::ERROR_DEVICE_LOST,
            })
        ));
    }

    #[test]
    fn test_present_classification() {
        assert_eq!(classify_present(Ok(false), false).unwrap(), PresentOutcome::Presented);
        assert_eq!(classify_present(Ok(true), false).unwrap(), PresentOutcome::NeedsRecreate);
        assert_eq!(classify_present(Ok(false), true).unwrap(), PresentOutcome::NeedsRecreate);
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR), false).unwrap(),
            PresentOutcome::NeedsRecreate
        );
        assert!(classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR), true).is_err());
    }

    /// Scripted GPU side of the frame loop
    ///
    /// Acquire retires the slot's previous submission, as the fence wait does, and
    /// submitting to a slot that is still pending fails the test.
    struct ScriptedTarget {
        acquires: VecDeque<VulkanResult<AcquireOutcome>>,
        present_results: VecDeque<VkResult<bool>>,
        pending: Vec<bool>,
        max_pending: usize,
        resize: bool,
        close_on_recreate: bool,
        recreations: usize,
        submitted_slots: Vec<usize>,
    }

    impl ScriptedTarget {
        fn new(frames_in_flight: usize) -> Self {
            Self {
                acquires: VecDeque::new(),
                present_results: VecDeque::new(),
                pending: vec![false; frames_in_flight],
                max_pending: 0,
                resize: false,
                close_on_recreate: false,
                recreations: 0,
                submitted_slots: Vec::new(),
            }
        }

        fn ready(image_index: u32) -> VulkanResult<AcquireOutcome> {
            Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal: false,
            })
        }
    }

    impl FrameTarget for ScriptedTarget {
        fn acquire(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
            self.pending[slot] = false;
            self.acquires.pop_front().unwrap_or_else(|| Self::ready(0))
        }

        fn submit_and_present(
            &mut self,
            slot: usize,
            _image_index: u32,
            resize_pending: bool,
        ) -> VulkanResult<PresentOutcome> {
            assert!(!self.pending[slot], "slot {slot} reused before it retired");
            self.pending[slot] = true;
            self.submitted_slots.push(slot);
            self.max_pending = self.max_pending.max(self.pending.iter().filter(|&&p| p).count());

            let result = self.present_results.pop_front().unwrap_or(Ok(false));
            classify_present(result, resize_pending)
        }

        fn resize_pending(&self) -> bool {
            self.resize
        }

        fn recreate(&mut self) -> VulkanResult<bool> {
            if self.close_on_recreate {
                return Ok(false);
            }
            self.recreations += 1;
            self.resize = false;
            Ok(true)
        }
    }

    #[test]
    fn test_in_flight_submissions_bounded_by_slots() {
        let frames_in_flight = 2;
        let mut cursor = FrameCursor::new(frames_in_flight);
        let mut target = ScriptedTarget::new(frames_in_flight);
        for iteration in 0..50 {
            target.acquires.push_back(if iteration % 3 == 2 {
                Ok(AcquireOutcome::OutOfDate)
            } else {
                ScriptedTarget::ready(iteration % 3)
            });
        }

        for _ in 0..50 {
            drive_frame(&mut cursor, &mut target).unwrap();
        }

        assert_eq!(target.max_pending, frames_in_flight);
        assert_eq!(target.recreations, 16);
        assert!(target.submitted_slots.iter().all(|&slot| slot < frames_in_flight));
    }

    #[test]
    fn test_cursor_advances_once_per_iteration_for_every_outcome() {
        let mut cursor = FrameCursor::new(2);
        let mut target = ScriptedTarget::new(2);
        target.acquires.extend([
            ScriptedTarget::ready(0),
            Ok(AcquireOutcome::OutOfDate),
            ScriptedTarget::ready(1),
            ScriptedTarget::ready(2),
            Err(VulkanError::frame("acquire_next_image")(vk::Result::ERROR_DEVICE_LOST)),
        ]);
        target.present_results.extend([Ok(false), Ok(true), Ok(false)]);

        let mut outcomes = Vec::new();
        for _ in 0..5 {
            let before = cursor.current();
            outcomes.push(drive_frame(&mut cursor, &mut target).ok());
            assert_eq!(cursor.current(), (before + 1) % 2);
        }

        assert_eq!(
            outcomes,
            vec![
                Some(FrameOutcome::Presented),
                Some(FrameOutcome::Abandoned),
                Some(FrameOutcome::PresentedAndRecreated),
                Some(FrameOutcome::Presented),
                None,
            ]
        );
        assert_eq!(target.recreations, 2);
        assert_eq!(target.submitted_slots, vec![0, 0, 1]);
    }

    #[test]
    fn test_pending_resize_rebuilds_after_present() {
        let mut cursor = FrameCursor::new(2);
        let mut target = ScriptedTarget::new(2);
        target.resize = true;

        let outcome = drive_frame(&mut cursor, &mut target).unwrap();
        assert_eq!(outcome, FrameOutcome::PresentedAndRecreated);
        assert_eq!(target.submitted_slots, vec![0]);
        assert!(!target.resize);

        let outcome = drive_frame(&mut cursor, &mut target).unwrap();
        assert_eq!(outcome, FrameOutcome::Presented);
        assert_eq!(target.recreations, 1);
    }

    #[test]
    fn test_fatal_present_still_advances_cursor() {
        let mut cursor = FrameCursor::new(2);
        let mut target = ScriptedTarget::new(2);
        target
            .present_results
            .push_back(Err(vk::Result::ERROR_SURFACE_LOST_KHR));

        let result = drive_frame(&mut cursor, &mut target);
        assert!(matches!(
            result,
            Err(VulkanError::FrameOperationFailed {
                operation: "queue_present",
                result: vk::Result::ERROR_SURFACE_LOST_KHR,
            })
        ));
        assert_eq!(cursor.current(), 1);
        assert_eq!(target.recreations, 0);
    }

    #[test]
    fn test_close_during_rebuild_reports_close_requested() {
        let mut cursor = FrameCursor::new(2);
        let mut target = ScriptedTarget::new(2);
        target.close_on_recreate = true;
        target.acquires.push_back(Ok(AcquireOutcome::OutOfDate));
        target.present_results.push_back(Ok(true));

        assert_eq!(
            drive_frame(&mut cursor, &mut target).unwrap(),
            FrameOutcome::CloseRequested
        );
        assert_eq!(
            drive_frame(&mut cursor, &mut target).unwrap(),
            FrameOutcome::CloseRequested
        );
        assert_eq!(cursor.current(), 0);
        assert_eq!(target.submitted_slots, vec![1]);
    }
}
