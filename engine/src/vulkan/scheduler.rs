//! The per-frame render loop.
//!
//! One iteration waits on the slot's in-flight fence, acquires an image,
//! re-records the slot's command buffer, submits, presents and advances the
//! slot index. Fences and semaphores are always picked by slot; the
//! framebuffer is picked by the acquired image index.
//!
//! The GPU side lives behind [`FrameBackend`] so the state machine can run
//! against a recording mock.

use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::EngineError;

/// Shared flag checked between frames and after a timed-out wait.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cycles through `[0, count)`, one step per completed frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameIndex {
    current: usize,
    count: usize,
}

impl FrameIndex {
    pub fn new(count: usize) -> Self {
        Self {
            current: 0,
            count: count.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.count;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Rendering,
    NeedsSwapchainRebuild,
    ShuttingDown,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitStatus {
    Signaled,
    TimedOut,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcquireStatus {
    Acquired(u32),
    /// Usable, but the swapchain should be rebuilt after this frame.
    Suboptimal(u32),
    OutOfDate,
    TimedOut,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    Suboptimal,
    OutOfDate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { slot: usize, image_index: u32 },
    SwapchainOutOfDate,
    Rebuilt,
    TimedOut,
    ShutDown,
}

/// GPU operations one render iteration is made of.
pub trait FrameBackend {
    /// Number of frame slots, equal to the swapchain image count.
    fn frames_in_flight(&self) -> usize;

    fn wait_for_fence(&mut self, slot: usize, timeout_ns: u64) -> Result<WaitStatus, EngineError>;

    fn reset_fence(&mut self, slot: usize) -> Result<(), EngineError>;

    /// Signals the slot's image-available semaphore once the image is ready.
    fn acquire_image(&mut self, slot: usize, timeout_ns: u64) -> Result<AcquireStatus, EngineError>;

    fn record(&mut self, slot: usize, image_index: u32) -> Result<(), EngineError>;

    /// Waits on image-available, signals render-finished and the in-flight fence.
    fn submit(&mut self, slot: usize) -> Result<(), EngineError>;

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentStatus, EngineError>;

    /// Destroys and recreates every swapchain-dependent resource.
    fn rebuild_swapchain(&mut self) -> Result<(), EngineError>;
}

#[derive(Debug)]
pub struct FrameScheduler {
    state: SchedulerState,
    frame: FrameIndex,
    timeout_ns: u64,
    cancel: CancellationToken,
    frames_presented: u64,
}

impl FrameScheduler {
    pub fn new(frames_in_flight: usize, timeout_ns: u64, cancel: CancellationToken) -> Self {
        Self {
            state: SchedulerState::Rendering,
            frame: FrameIndex::new(frames_in_flight),
            timeout_ns,
            cancel,
            frames_presented: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn frame_index(&self) -> usize {
        self.frame.current()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Schedules a swapchain rebuild before the next frame, e.g. after a resize.
    pub fn request_rebuild(&mut self) {
        if self.state == SchedulerState::Rendering {
            self.state = SchedulerState::NeedsSwapchainRebuild;
        }
    }

    pub fn shutdown(&mut self) {
        self.state = SchedulerState::ShuttingDown;
    }

    /// Runs one step of the loop. Any error is fatal and leaves the
    /// scheduler shutting down.
    pub fn render_frame<B: FrameBackend>(
        &mut self,
        backend: &mut B,
    ) -> Result<FrameOutcome, EngineError> {
        if self.cancel.is_cancelled() {
            self.state = SchedulerState::ShuttingDown;
        }

        let result = match self.state {
            SchedulerState::ShuttingDown => return Ok(FrameOutcome::ShutDown),
            SchedulerState::NeedsSwapchainRebuild => self.rebuild(backend),
            SchedulerState::Rendering => self.draw(backend),
        };

        if result.is_err() {
            self.state = SchedulerState::ShuttingDown;
        }
        result
    }

    fn rebuild<B: FrameBackend>(&mut self, backend: &mut B) -> Result<FrameOutcome, EngineError> {
        backend.rebuild_swapchain()?;
        self.frame = FrameIndex::new(backend.frames_in_flight());
        self.state = SchedulerState::Rendering;
        debug!("Swapchain rebuilt with {} frames in flight.", self.frame.count());
        Ok(FrameOutcome::Rebuilt)
    }

    fn draw<B: FrameBackend>(&mut self, backend: &mut B) -> Result<FrameOutcome, EngineError> {
        let slot = self.frame.current();

        if backend.wait_for_fence(slot, self.timeout_ns)? == WaitStatus::TimedOut {
            return Ok(self.timed_out("in-flight fence"));
        }

        // The fence is only reset once an image is in hand, so a timed-out or
        // out-of-date acquisition leaves it signaled for the next attempt.
        let (image_index, suboptimal) = match backend.acquire_image(slot, self.timeout_ns)? {
            AcquireStatus::Acquired(index) => (index, false),
            AcquireStatus::Suboptimal(index) => (index, true),
            AcquireStatus::OutOfDate => {
                self.state = SchedulerState::NeedsSwapchainRebuild;
                return Ok(FrameOutcome::SwapchainOutOfDate);
            }
            AcquireStatus::TimedOut => return Ok(self.timed_out("image acquisition")),
        };

        backend.reset_fence(slot)?;
        backend.record(slot, image_index)?;
        backend.submit(slot)?;
        let presented = backend.present(slot, image_index)?;

        self.frame.advance();
        self.frames_presented += 1;

        if suboptimal || presented != PresentStatus::Presented {
            self.state = SchedulerState::NeedsSwapchainRebuild;
        }

        Ok(FrameOutcome::Presented { slot, image_index })
    }

    fn timed_out(&mut self, what: &str) -> FrameOutcome {
        if self.cancel.is_cancelled() {
            self.state = SchedulerState::ShuttingDown;
            FrameOutcome::ShutDown
        } else {
            debug!("Timed out waiting on {}.", what);
            FrameOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use vulkanalia::vk;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Reset(usize),
        Acquire(usize),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
        Rebuild,
    }

    struct MockBackend {
        images: usize,
        next_image: u32,
        calls: Vec<Call>,
        waits: VecDeque<WaitStatus>,
        acquires: VecDeque<AcquireStatus>,
        presents: VecDeque<PresentStatus>,
        fail_submit: bool,
        images_after_rebuild: usize,
        cancel_on_acquire: Option<CancellationToken>,
    }

    impl MockBackend {
        fn new(images: usize) -> Self {
            Self {
                images,
                next_image: 0,
                calls: Vec::new(),
                waits: VecDeque::new(),
                acquires: VecDeque::new(),
                presents: VecDeque::new(),
                fail_submit: false,
                images_after_rebuild: images,
                cancel_on_acquire: None,
            }
        }
    }

    impl FrameBackend for MockBackend {
        fn frames_in_flight(&self) -> usize {
            self.images
        }

        fn wait_for_fence(&mut self, slot: usize, _: u64) -> Result<WaitStatus, EngineError> {
            self.calls.push(Call::Wait(slot));
            Ok(self.waits.pop_front().unwrap_or(WaitStatus::Signaled))
        }

        fn reset_fence(&mut self, slot: usize) -> Result<(), EngineError> {
            self.calls.push(Call::Reset(slot));
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize, _: u64) -> Result<AcquireStatus, EngineError> {
            self.calls.push(Call::Acquire(slot));
            if let Some(token) = &self.cancel_on_acquire {
                token.cancel();
            }
            Ok(self.acquires.pop_front().unwrap_or_else(|| {
                let index = self.next_image;
                self.next_image = (self.next_image + 1) % self.images as u32;
                AcquireStatus::Acquired(index)
            }))
        }

        fn record(&mut self, slot: usize, image_index: u32) -> Result<(), EngineError> {
            self.calls.push(Call::Record(slot, image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> Result<(), EngineError> {
            self.calls.push(Call::Submit(slot));
            if self.fail_submit {
                Err(EngineError::Frame {
                    stage: "submit",
                    source: vk::ErrorCode::DEVICE_LOST,
                })
            } else {
                Ok(())
            }
        }

        fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentStatus, EngineError> {
            self.calls.push(Call::Present(slot, image_index));
            Ok(self.presents.pop_front().unwrap_or(PresentStatus::Presented))
        }

        fn rebuild_swapchain(&mut self) -> Result<(), EngineError> {
            self.calls.push(Call::Rebuild);
            self.images = self.images_after_rebuild;
            self.next_image = 0;
            Ok(())
        }
    }

    fn new_scheduler(frames: usize) -> FrameScheduler {
        FrameScheduler::new(frames, 1_000_000, CancellationToken::new())
    }

    #[test]
    fn frame_index_is_k_mod_count() {
        for count in 1..5 {
            let mut index = FrameIndex::new(count);
            for k in 0..20 {
                assert_eq!(index.current(), k % count);
                index.advance();
            }
        }
    }

    #[test]
    fn zero_frames_is_treated_as_one() {
        let mut index = FrameIndex::new(0);
        index.advance();
        assert_eq!(index.current(), 0);
    }

    #[test]
    fn one_iteration_follows_the_sync_protocol() {
        let mut backend = MockBackend::new(3);
        backend.acquires.push_back(AcquireStatus::Acquired(2));
        let mut scheduler = new_scheduler(3);

        let outcome = scheduler.render_frame(&mut backend).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented { slot: 0, image_index: 2 });
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Reset(0),
                Call::Record(0, 2),
                Call::Submit(0),
                Call::Present(0, 2),
            ]
        );
        assert_eq!(scheduler.frame_index(), 1);
    }

    #[test]
    fn out_of_date_acquire_rebuilds_before_rendering_again() {
        let mut backend = MockBackend::new(2);
        backend.acquires.push_back(AcquireStatus::OutOfDate);
        backend.images_after_rebuild = 3;
        let mut scheduler = new_scheduler(2);

        assert_eq!(
            scheduler.render_frame(&mut backend).unwrap(),
            FrameOutcome::SwapchainOutOfDate
        );
        assert_eq!(scheduler.state(), SchedulerState::NeedsSwapchainRebuild);
        assert!(!backend.calls.contains(&Call::Reset(0)));

        assert_eq!(scheduler.render_frame(&mut backend).unwrap(), FrameOutcome::Rebuilt);
        assert_eq!(scheduler.state(), SchedulerState::Rendering);
        assert_eq!(scheduler.frame.count(), 3);

        assert!(matches!(
            scheduler.render_frame(&mut backend).unwrap(),
            FrameOutcome::Presented { slot: 0, .. }
        ));
    }

    #[test]
    fn suboptimal_frames_are_presented_then_rebuilt() {
        let mut backend = MockBackend::new(2);
        backend.acquires.push_back(AcquireStatus::Suboptimal(1));
        let mut scheduler = new_scheduler(2);

        assert_eq!(
            scheduler.render_frame(&mut backend).unwrap(),
            FrameOutcome::Presented { slot: 0, image_index: 1 }
        );
        assert_eq!(scheduler.state(), SchedulerState::NeedsSwapchainRebuild);

        let mut backend = MockBackend::new(2);
        backend.presents.push_back(PresentStatus::OutOfDate);
        let mut scheduler = new_scheduler(2);

        scheduler.render_frame(&mut backend).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::NeedsSwapchainRebuild);
        assert_eq!(scheduler.frames_presented(), 1);
    }

    #[test]
    fn fence_timeout_does_not_advance() {
        let mut backend = MockBackend::new(2);
        backend.waits.push_back(WaitStatus::TimedOut);
        let mut scheduler = new_scheduler(2);

        assert_eq!(scheduler.render_frame(&mut backend).unwrap(), FrameOutcome::TimedOut);
        assert_eq!(scheduler.frame_index(), 0);
        assert_eq!(backend.calls, vec![Call::Wait(0)]);

        assert!(matches!(
            scheduler.render_frame(&mut backend).unwrap(),
            FrameOutcome::Presented { slot: 0, .. }
        ));
    }

    #[test]
    fn cancelled_token_stops_before_any_gpu_call() {
        let mut backend = MockBackend::new(2);
        let token = CancellationToken::new();
        let mut scheduler = FrameScheduler::new(2, 1_000, token.clone());

        token.cancel();
        assert_eq!(scheduler.render_frame(&mut backend).unwrap(), FrameOutcome::ShutDown);
        assert_eq!(scheduler.state(), SchedulerState::ShuttingDown);
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn cancellation_during_a_blocked_acquire_shuts_down() {
        let token = CancellationToken::new();
        let mut backend = MockBackend::new(2);
        backend.acquires.push_back(AcquireStatus::TimedOut);
        backend.cancel_on_acquire = Some(token.clone());
        let mut scheduler = FrameScheduler::new(2, 1_000, token);

        assert_eq!(scheduler.render_frame(&mut backend).unwrap(), FrameOutcome::ShutDown);
        assert_eq!(scheduler.state(), SchedulerState::ShuttingDown);
        assert_eq!(backend.calls, vec![Call::Wait(0), Call::Acquire(0)]);
    }

    #[test]
    fn submit_failure_is_fatal() {
        let mut backend = MockBackend::new(2);
        backend.fail_submit = true;
        let mut scheduler = new_scheduler(2);

        assert!(scheduler.render_frame(&mut backend).is_err());
        assert_eq!(scheduler.state(), SchedulerState::ShuttingDown);

        let calls = backend.calls.len();
        assert_eq!(scheduler.render_frame(&mut backend).unwrap(), FrameOutcome::ShutDown);
        assert_eq!(backend.calls.len(), calls);
    }

    #[test]
    fn resize_request_only_applies_while_rendering() {
        let mut scheduler = new_scheduler(2);
        scheduler.request_rebuild();
        assert_eq!(scheduler.state(), SchedulerState::NeedsSwapchainRebuild);

        scheduler.shutdown();
        scheduler.request_rebuild();
        assert_eq!(scheduler.state(), SchedulerState::ShuttingDown);
    }
}
