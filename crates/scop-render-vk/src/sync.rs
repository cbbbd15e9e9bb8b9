// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::vk;

use crate::VkError;

/// Synchronization primitives of one frame slot.
#[derive(Debug)]
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// The fence starts signaled so the first wait on a fresh slot returns.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        let sem_ci = vk::SemaphoreCreateInfo::default();
        let fence_ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };
        let image_available = device
            .create_semaphore(&sem_ci, None)
            .context("create_semaphore(image_available)")?;
        let render_finished = match device.create_semaphore(&sem_ci, None) {
            Ok(s) => s,
            Err(e) => {
                device.destroy_semaphore(image_available, None);
                return Err(e).context("create_semaphore(render_finished)");
            }
        };
        let in_flight = match device.create_fence(&fence_ci, None) {
            Ok(f) => f,
            Err(e) => {
                device.destroy_semaphore(image_available, None);
                device.destroy_semaphore(render_finished, None);
                return Err(e).context("create_fence(in_flight)");
            }
        };
        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    pub unsafe fn destroy(self, device: &ash::Device) {
        device.destroy_semaphore(self.image_available, None);
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_fence(self.in_flight, None);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Recording,
    Submitted,
}

impl FramePhase {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Submitted => "submitted",
        }
    }
}

/// Round-robin frame slot bookkeeping.
///
/// Every submission gets a serial number; `pending_serial(slot)` is the
/// submission whose fence must signal before the slot can record again.
#[derive(Debug)]
pub struct FrameCursor {
    slot: usize,
    phase: FramePhase,
    next_serial: u64,
    last_submit: Vec<Option<u64>>,
}

impl FrameCursor {
    pub fn new(slots: usize) -> Self {
        Self {
            slot: 0,
            phase: FramePhase::Idle,
            next_serial: 0,
            last_submit: vec![None; slots.max(1)],
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn slot_count(&self) -> usize {
        self.last_submit.len()
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Serial of the frame that last used `slot`, if any.
    pub fn pending_serial(&self, slot: usize) -> Option<u64> {
        self.last_submit[slot]
    }

    fn expect(&self, expected: FramePhase) -> Result<(), VkError> {
        if self.phase != expected {
            return Err(VkError::FrameOrder {
                expected: expected.name(),
                actual: self.phase.name(),
            });
        }
        Ok(())
    }

    /// Fails unless the previous frame has been submitted and advanced.
    pub fn ensure_idle(&self) -> Result<(), VkError> {
        self.expect(FramePhase::Idle)
    }

    /// Idle -> Recording.
    pub fn begin(&mut self) -> Result<(), VkError> {
        self.expect(FramePhase::Idle)?;
        self.phase = FramePhase::Recording;
        Ok(())
    }

    /// Recording -> Submitted; returns the serial assigned to this frame.
    pub fn submit(&mut self) -> Result<u64, VkError> {
        self.expect(FramePhase::Recording)?;
        let serial = self.next_serial;
        self.next_serial += 1;
        self.last_submit[self.slot] = Some(serial);
        self.phase = FramePhase::Submitted;
        Ok(serial)
    }

    /// Recording -> Idle on the same slot; the frame was never submitted.
    pub fn abort(&mut self) -> Result<(), VkError> {
        self.expect(FramePhase::Recording)?;
        self.phase = FramePhase::Idle;
        Ok(())
    }

    /// Submitted -> Idle on the next slot.
    pub fn advance(&mut self) -> Result<(), VkError> {
        self.expect(FramePhase::Submitted)?;
        self.slot = (self.slot + 1) % self.last_submit.len();
        self.phase = FramePhase::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_frame(cursor: &mut FrameCursor) -> (usize, Option<u64>, u64) {
        let slot = cursor.slot();
        let waits_on = cursor.pending_serial(slot);
        cursor.begin().unwrap();
        let serial = cursor.submit().unwrap();
        cursor.advance().unwrap();
        (slot, waits_on, serial)
    }

    #[test]
    fn third_frame_waits_on_first() {
        let mut cursor = FrameCursor::new(2);
        let (s1, w1, f1) = run_frame(&mut cursor);
        let (s2, w2, f2) = run_frame(&mut cursor);
        let (s3, w3, _) = run_frame(&mut cursor);

        assert_eq!((s1, s2, s3), (0, 1, 0));
        assert_eq!(w1, None);
        assert_eq!(w2, None);
        assert_eq!(w3, Some(f1));
        assert_ne!(w3, Some(f2));
    }

    #[test]
    fn aborted_acquire_keeps_slot() {
        let mut cursor = FrameCursor::new(2);
        // out-of-date acquire: nothing begun, slot unchanged
        assert_eq!(cursor.slot(), 0);
        assert_eq!(cursor.phase(), FramePhase::Idle);
        run_frame(&mut cursor);
        assert_eq!(cursor.slot(), 1);
    }

    #[test]
    fn phases_must_follow_order() {
        let mut cursor = FrameCursor::new(2);
        assert!(matches!(cursor.submit(), Err(VkError::FrameOrder { .. })));
        assert!(cursor.advance().is_err());
        cursor.begin().unwrap();
        assert!(cursor.begin().is_err());
        cursor.submit().unwrap();
        assert_eq!(cursor.phase(), FramePhase::Submitted);
        cursor.advance().unwrap();
        assert_eq!(cursor.phase(), FramePhase::Idle);
    }

    #[test]
    fn second_begin_is_refused_before_waiting() {
        let mut cursor = FrameCursor::new(2);
        assert!(cursor.ensure_idle().is_ok());
        cursor.begin().unwrap();
        assert!(matches!(
            cursor.ensure_idle(),
            Err(VkError::FrameOrder {
                expected: "idle",
                actual: "recording"
            })
        ));
        cursor.submit().unwrap();
        assert!(cursor.ensure_idle().is_err());
        cursor.advance().unwrap();
        assert!(cursor.ensure_idle().is_ok());
    }

    #[test]
    fn failed_submit_returns_slot_unchanged() {
        let mut cursor = FrameCursor::new(2);
        cursor.begin().unwrap();
        cursor.abort().unwrap();
        assert_eq!(cursor.phase(), FramePhase::Idle);
        assert_eq!(cursor.slot(), 0);
        assert_eq!(cursor.pending_serial(0), None);
        assert!(cursor.abort().is_err());
        run_frame(&mut cursor);
        assert_eq!(cursor.slot(), 1);
    }
}
