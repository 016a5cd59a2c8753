//! In-memory `ComputeDevice` that records every call.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::bridge::DisplaySurface;
use crate::device::{BufferKind, ComputeDevice, FrameParams, KernelArgs};
use crate::error::{DeviceError, InitError};
use crate::work_size::WorkSize;

#[derive(Debug)]
pub struct RecordedBuffer {
    id: usize,
    pub label: String,
    pub kind: BufferKind,
    size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    LoadProgram,
    Create(String),
    Write(String),
    Release(String),
    AcquireImage,
    ReleaseImage,
    Dispatch { params: FrameParams, groups: [u32; 2] },
    Wait,
}

#[derive(Default)]
pub struct RecordingDevice {
    events: RefCell<Vec<DeviceEvent>>,
    /// Every create/write as (label, bytes), in order
    uploads: RefCell<Vec<(String, Vec<u8>)>>,
    contents: RefCell<HashMap<usize, Vec<u8>>>,
    next_id: Cell<usize>,

    fail_program: bool,
    failing_dispatches: Cell<u32>,
    failing_acquires: Cell<u32>,
    failing_writes: Cell<u32>,
    /// Creations left to succeed before the next one fails
    create_failure: Cell<Option<u32>>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_broken_program() -> Self {
        Self {
            fail_program: true,
            ..Self::default()
        }
    }

    /// Make the next `count` dispatches fail.
    pub fn fail_dispatches(&self, count: u32) {
        self.failing_dispatches.set(count);
    }

    /// Make the next `count` image acquisitions fail.
    pub fn fail_acquires(&self, count: u32) {
        self.failing_acquires.set(count);
    }

    /// Make the next `count` buffer writes fail.
    pub fn fail_writes(&self, count: u32) {
        self.failing_writes.set(count);
    }

    /// Let `skip` more buffer creations succeed, then fail the one after.
    pub fn fail_create_after(&self, skip: u32) {
        self.create_failure.set(Some(skip));
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
        self.uploads.borrow_mut().clear();
    }

    pub fn dispatches(&self) -> Vec<FrameParams> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                DeviceEvent::Dispatch { params, .. } => Some(*params),
                _ => None,
            })
            .collect()
    }

    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.borrow().clone()
    }

    /// Labels of released buffers, in release order.
    pub fn releases(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                DeviceEvent::Release(label) => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn live_buffers(&self) -> usize {
        self.contents.borrow().len()
    }

    fn record(&self, event: DeviceEvent) {
        self.events.borrow_mut().push(event);
    }

    fn allocate(&self, label: &str, kind: BufferKind, contents: Vec<u8>) -> RecordedBuffer {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        self.record(DeviceEvent::Create(label.to_string()));
        self.uploads.borrow_mut().push((label.to_string(), contents.clone()));

        let size = contents.len() as u64;
        self.contents.borrow_mut().insert(id, contents);
        RecordedBuffer {
            id,
            label: label.to_string(),
            kind,
            size,
        }
    }

    fn take_create_failure(&self) -> Result<(), DeviceError> {
        match self.create_failure.get() {
            Some(0) => {
                self.create_failure.set(None);
                Err(DeviceError::OutOfMemory("create failed".to_string()))
            }
            Some(skip) => {
                self.create_failure.set(Some(skip - 1));
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn take_failure(counter: &Cell<u32>) -> bool {
        let remaining = counter.get();
        if remaining > 0 {
            counter.set(remaining - 1);
            true
        } else {
            false
        }
    }
}

impl ComputeDevice for RecordingDevice {
    type Buffer = RecordedBuffer;

    fn load_program(&mut self, _source: &str) -> Result<(), InitError> {
        self.record(DeviceEvent::LoadProgram);
        if self.fail_program {
            return Err(InitError::KernelCompile {
                diagnostics: "error: expected ';'".to_string(),
            });
        }
        Ok(())
    }

    fn create_buffer(
        &self,
        label: &str,
        kind: BufferKind,
        contents: &[u8],
    ) -> Result<RecordedBuffer, DeviceError> {
        self.take_create_failure()?;
        Ok(self.allocate(label, kind, contents.to_vec()))
    }

    fn create_zeroed(&self, label: &str, kind: BufferKind, size: u64) -> Result<RecordedBuffer, DeviceError> {
        self.take_create_failure()?;
        Ok(self.allocate(label, kind, vec![0; size as usize]))
    }

    fn write_buffer(&self, buffer: &RecordedBuffer, data: &[u8]) -> Result<(), DeviceError> {
        if Self::take_failure(&self.failing_writes) {
            return Err(DeviceError::OutOfMemory("write failed".to_string()));
        }
        let mut contents = self.contents.borrow_mut();
        let stored = contents
            .get_mut(&buffer.id)
            .ok_or_else(|| DeviceError::Validation(format!("'{}' was released", buffer.label)))?;
        if data.len() as u64 > buffer.size {
            return Err(DeviceError::Validation(format!("write overruns '{}'", buffer.label)));
        }
        stored[..data.len()].copy_from_slice(data);

        self.record(DeviceEvent::Write(buffer.label.clone()));
        self.uploads.borrow_mut().push((buffer.label.clone(), data.to_vec()));
        Ok(())
    }

    fn release_buffer(&self, buffer: RecordedBuffer) {
        self.contents.borrow_mut().remove(&buffer.id);
        self.record(DeviceEvent::Release(buffer.label));
    }

    fn buffer_size(&self, buffer: &RecordedBuffer) -> u64 {
        buffer.size
    }

    fn read_buffer(&self, buffer: &RecordedBuffer) -> Result<Vec<u8>, DeviceError> {
        self.contents
            .borrow()
            .get(&buffer.id)
            .cloned()
            .ok_or_else(|| DeviceError::Readback(format!("'{}' was released", buffer.label)))
    }

    fn acquire_image(&self, _image: &RecordedBuffer) -> Result<(), DeviceError> {
        if Self::take_failure(&self.failing_acquires) {
            return Err(DeviceError::Validation("acquire failed".to_string()));
        }
        self.record(DeviceEvent::AcquireImage);
        Ok(())
    }

    fn release_image(&self, _image: &RecordedBuffer) -> Result<(), DeviceError> {
        self.record(DeviceEvent::ReleaseImage);
        Ok(())
    }

    fn dispatch(&self, args: &KernelArgs<'_, RecordedBuffer>, work: WorkSize) -> Result<(), DeviceError> {
        if Self::take_failure(&self.failing_dispatches) {
            return Err(DeviceError::OutOfMemory("dispatch failed".to_string()));
        }
        if args.image.kind != BufferKind::Image {
            return Err(DeviceError::Validation("binding 0 is not the image".to_string()));
        }
        self.record(DeviceEvent::Dispatch {
            params: args.params,
            groups: work.groups(),
        });
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), DeviceError> {
        self.record(DeviceEvent::Wait);
        Ok(())
    }
}

/// Display surface that remembers what it was bound to and drawn.
#[derive(Default)]
pub struct FakeDisplay {
    pub bound: Vec<(u32, u32)>,
    pub draws: usize,
    pub fail_draws: bool,
}

impl DisplaySurface<RecordedBuffer> for FakeDisplay {
    type Error = std::io::Error;

    fn bind_image(&mut self, _image: &RecordedBuffer, width: u32, height: u32) {
        self.bound.push((width, height));
    }

    fn draw(&mut self, _image: &RecordedBuffer) -> Result<(), Self::Error> {
        if self.fail_draws {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "surface lost"));
        }
        self.draws += 1;
        Ok(())
    }
}
