//! The image shared between the compute kernel and the display surface.
//!
//! Compute and display run on the same wgpu device, so one storage buffer
//! serves both: the kernel binds it read-write, the display pass binds it
//! read-only. Exclusive access is still explicit. The compute side must
//! `acquire` the image before a dispatch and `release` it afterwards, and
//! the display only gets to see it while released.

use crate::device::{BufferKind, ComputeDevice};
use crate::error::{BridgeError, FrameError};

/// Bytes per pixel: RGBA, `f32` per channel.
pub const IMAGE_PIXEL_BYTES: u64 = 16;

/// Which side currently owns the shared image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOwner {
    Display,
    Compute,
}

/// The display side of the hand-off.
pub trait DisplaySurface<B> {
    type Error: std::error::Error + 'static;

    /// Point the display at a (new) image. Called after every resize.
    fn bind_image(&mut self, image: &B, width: u32, height: u32);

    /// Draw the bound image to the screen.
    fn draw(&mut self, image: &B) -> Result<(), Self::Error>;
}

/// Owns the shared image and its resize lifecycle.
pub struct FrameBufferBridge<B> {
    image: Option<B>,
    width: u32,
    height: u32,
    owner: ImageOwner,

    /// Incremented whenever the image is recreated
    generation: u64,
    /// Generation the display surface was last bound to
    bound_generation: Option<u64>,
}

impl<B> Default for FrameBufferBridge<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> FrameBufferBridge<B> {
    pub fn new() -> Self {
        Self {
            image: None,
            width: 0,
            height: 0,
            owner: ImageOwner::Display,
            generation: 0,
            bound_generation: None,
        }
    }

    /// Current image size in pixels.
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn owner(&self) -> ImageOwner {
        self.owner
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn image(&self) -> Option<&B> {
        self.image.as_ref()
    }

    /// Replace the image with one of the new size.
    ///
    /// Refused while the compute side holds the image. If the new image
    /// cannot be created the old one stays current.
    pub fn resize<D>(&mut self, device: &D, width: u32, height: u32) -> Result<(), FrameError>
    where
        D: ComputeDevice<Buffer = B>,
    {
        if self.owner == ImageOwner::Compute {
            return Err(BridgeError::Busy.into());
        }
        if width == 0 || height == 0 {
            return Err(BridgeError::EmptyExtent { width, height }.into());
        }

        let size = width as u64 * height as u64 * IMAGE_PIXEL_BYTES;
        let image = device.create_zeroed("Shared Image", BufferKind::Image, size)?;

        if let Some(old) = self.image.replace(image) {
            device.release_buffer(old);
        }
        self.width = width;
        self.height = height;
        self.generation += 1;

        log::debug!("Shared image resized to {}x{} (generation {})", width, height, self.generation);
        Ok(())
    }

    /// Give the compute device exclusive access.
    pub fn acquire<D>(&mut self, device: &D) -> Result<(), FrameError>
    where
        D: ComputeDevice<Buffer = B>,
    {
        let image = self.image.as_ref().ok_or(BridgeError::Unbound)?;
        if self.owner == ImageOwner::Compute {
            return Err(BridgeError::Busy.into());
        }

        device.acquire_image(image)?;
        self.owner = ImageOwner::Compute;
        Ok(())
    }

    /// Return the image to the display.
    ///
    /// Ownership moves back even if the device call fails, so one bad frame
    /// cannot lock the display out for good.
    pub fn release<D>(&mut self, device: &D) -> Result<(), FrameError>
    where
        D: ComputeDevice<Buffer = B>,
    {
        if self.owner != ImageOwner::Compute {
            return Err(BridgeError::NotAcquired.into());
        }
        let image = self.image.as_ref().ok_or(BridgeError::Unbound)?;

        self.owner = ImageOwner::Display;
        device.release_image(image)?;
        Ok(())
    }

    /// Whether the display surface still points at an older image.
    pub fn needs_rebind(&self) -> bool {
        self.image.is_some() && self.bound_generation != Some(self.generation)
    }

    /// Hand the current image to the display surface.
    pub fn bind_to_display_target<S>(&mut self, target: &mut S) -> Result<(), BridgeError>
    where
        S: DisplaySurface<B> + ?Sized,
    {
        let image = self.image.as_ref().ok_or(BridgeError::Unbound)?;
        target.bind_image(image, self.width, self.height);
        self.bound_generation = Some(self.generation);
        Ok(())
    }

    /// The image, if the display side may read it right now.
    pub fn display_image(&self) -> Result<&B, BridgeError> {
        if self.owner == ImageOwner::Compute {
            return Err(BridgeError::Busy);
        }
        self.image.as_ref().ok_or(BridgeError::Unbound)
    }

    /// Free the image. Used on shutdown.
    pub fn release_image<D>(&mut self, device: &D)
    where
        D: ComputeDevice<Buffer = B>,
    {
        if let Some(image) = self.image.take() {
            device.release_buffer(image);
        }
        self.owner = ImageOwner::Display;
        self.bound_generation = None;
    }
}
