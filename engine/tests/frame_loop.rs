use std::collections::HashMap;

use engine::vulkan::scheduler::{
    AcquireStatus, CancellationToken, FrameBackend, FrameOutcome, FrameScheduler, PresentStatus,
    WaitStatus,
};
use engine::EngineError;

/// Fakes a swapchain whose fences are signaled by "the GPU" as soon as the
/// submission happens.
struct FakeGpu {
    images: usize,
    next_image: u32,
    fence_signaled: Vec<bool>,
    fence_waits: HashMap<usize, usize>,
    submissions: HashMap<usize, usize>,
    recorded: Vec<(usize, u32)>,
}

impl FakeGpu {
    fn new(images: usize) -> Self {
        Self {
            images,
            next_image: 0,
            fence_signaled: vec![true; images],
            fence_waits: HashMap::new(),
            submissions: HashMap::new(),
            recorded: Vec::new(),
        }
    }
}

impl FrameBackend for FakeGpu {
    fn frames_in_flight(&self) -> usize {
        self.images
    }

    fn wait_for_fence(&mut self, slot: usize, _: u64) -> Result<WaitStatus, EngineError> {
        *self.fence_waits.entry(slot).or_default() += 1;
        assert!(self.fence_signaled[slot], "waited on a fence that can never signal");
        Ok(WaitStatus::Signaled)
    }

    fn reset_fence(&mut self, slot: usize) -> Result<(), EngineError> {
        self.fence_signaled[slot] = false;
        Ok(())
    }

    fn acquire_image(&mut self, _: usize, _: u64) -> Result<AcquireStatus, EngineError> {
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.images as u32;
        Ok(AcquireStatus::Acquired(index))
    }

    fn record(&mut self, slot: usize, image_index: u32) -> Result<(), EngineError> {
        assert!(!self.fence_signaled[slot], "recorded into a slot whose fence was not reset");
        self.recorded.push((slot, image_index));
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> Result<(), EngineError> {
        *self.submissions.entry(slot).or_default() += 1;
        self.fence_signaled[slot] = true;
        Ok(())
    }

    fn present(&mut self, _: usize, _: u32) -> Result<PresentStatus, EngineError> {
        Ok(PresentStatus::Presented)
    }

    fn rebuild_swapchain(&mut self) -> Result<(), EngineError> {
        unreachable!("nothing invalidates the fake swapchain")
    }
}

fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

#[test]
fn two_image_swapchain_alternates_slots() {
    init_logging();
    let mut gpu = FakeGpu::new(2);
    let mut scheduler =
        FrameScheduler::new(gpu.frames_in_flight(), u64::MAX, CancellationToken::new());

    let mut observed = Vec::new();
    for _ in 0..5 {
        let outcome = scheduler.render_frame(&mut gpu).unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { .. }));
        observed.push(scheduler.frame_index());
    }

    assert_eq!(observed, vec![1, 0, 1, 0, 1]);
    assert_eq!(scheduler.frames_presented(), 5);

    // One wait per use of a slot: slot 0 used three times, slot 1 twice.
    assert_eq!(gpu.fence_waits[&0], 3);
    assert_eq!(gpu.fence_waits[&1], 2);
    assert_eq!(gpu.fence_waits, gpu.submissions);

    assert_eq!(gpu.recorded, vec![(0, 0), (1, 1), (0, 0), (1, 1), (0, 0)]);
}

#[test]
fn frame_index_tracks_completed_iterations() {
    for images in 1..=4 {
        let mut gpu = FakeGpu::new(images);
        let mut scheduler = FrameScheduler::new(images, u64::MAX, CancellationToken::new());

        for k in 0..12 {
            assert_eq!(scheduler.frame_index(), k % images);
            scheduler.render_frame(&mut gpu).unwrap();
        }
    }
}

#[test]
fn cancellation_from_another_thread_stops_the_loop() {
    init_logging();
    let mut gpu = FakeGpu::new(3);
    let token = CancellationToken::new();
    let mut scheduler = FrameScheduler::new(3, u64::MAX, token.clone());

    scheduler.render_frame(&mut gpu).unwrap();
    std::thread::spawn(move || token.cancel()).join().unwrap();

    assert_eq!(scheduler.render_frame(&mut gpu).unwrap(), FrameOutcome::ShutDown);
    assert_eq!(scheduler.frames_presented(), 1);
}
