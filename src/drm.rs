//! `#[repr(C)]` mirrors of the libdrm mode-setting structures the hook touches.
//!
//! Layouts follow `xf86drmMode.h`. Instances are allocated and freed by libdrm;
//! nothing here owns them.

use bitflags::bitflags;
use std::borrow::Cow;
use std::os::raw::{c_char, c_int};

/// Length of the fixed mode name buffer (`DRM_DISPLAY_MODE_LEN`).
pub const DISPLAY_MODE_LEN: usize = 32;

bitflags! {
    /// Mode type bits from `drm_mode.h`.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeType: u32 {
        const BUILTIN   = 1 << 0;
        const CLOCK_C   = (1 << 1) | Self::BUILTIN.bits();
        const CRTC_C    = (1 << 2) | Self::BUILTIN.bits();
        /// The mode the connector's consumer should pick by default.
        const PREFERRED = 1 << 3;
        const DEFAULT   = 1 << 4;
        const USERDEF   = 1 << 5;
        const DRIVER    = 1 << 6;
    }
}

/// `drmModeModeInfo`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ModeInfo {
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,
    pub vrefresh: u32,
    pub flags: u32,
    pub type_: u32,
    pub name: [c_char; DISPLAY_MODE_LEN],
}

impl ModeInfo {
    /// Builds a mode with only the fields the selection cares about filled in.
    pub fn new(width: u16, height: u16, refresh: u32, mode_type: ModeType) -> Self {
        let mut mode = Self {
            clock: 0,
            hdisplay: width,
            hsync_start: 0,
            hsync_end: 0,
            htotal: 0,
            hskew: 0,
            vdisplay: height,
            vsync_start: 0,
            vsync_end: 0,
            vtotal: 0,
            vscan: 0,
            vrefresh: refresh,
            flags: 0,
            type_: mode_type.bits(),
            name: [0; DISPLAY_MODE_LEN],
        };
        mode.set_name(&format!("{}x{}", width, height));
        mode
    }

    /// Mode type bits; unknown bits are preserved.
    pub fn mode_type(&self) -> ModeType {
        ModeType::from_bits_retain(self.type_)
    }

    pub fn set_mode_type(&mut self, mode_type: ModeType) {
        self.type_ = mode_type.bits();
    }

    /// Mode name up to the first NUL, decoded lossily.
    pub fn name(&self) -> Cow<'_, str> {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(DISPLAY_MODE_LEN);
        // SAFETY: c_char and u8 share size and alignment, and `len` is in bounds.
        let bytes = unsafe { std::slice::from_raw_parts(self.name.as_ptr().cast::<u8>(), len) };
        String::from_utf8_lossy(bytes)
    }

    /// Copies `name` into the fixed buffer, truncating so a terminator always fits.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; DISPLAY_MODE_LEN];
        for (dst, &src) in self
            .name
            .iter_mut()
            .zip(name.as_bytes().iter().take(DISPLAY_MODE_LEN - 1))
        {
            *dst = src as c_char;
        }
    }
}

/// `drmModeConnection`
pub type Connection = c_int;

/// `drmModeSubPixel`
pub type SubPixel = c_int;

/// `drmModeConnector`
#[repr(C)]
#[derive(Debug)]
pub struct Connector {
    pub connector_id: u32,
    pub encoder_id: u32,
    pub connector_type: u32,
    pub connector_type_id: u32,
    pub connection: Connection,
    pub mm_width: u32,
    pub mm_height: u32,
    pub subpixel: SubPixel,
    pub count_modes: c_int,
    pub modes: *mut ModeInfo,
    pub count_props: c_int,
    pub props: *mut u32,
    pub prop_values: *mut u64,
    pub count_encoders: c_int,
    pub encoders: *mut u32,
}

impl Connector {
    /// Number of modes the connector advertises; negative counts read as zero.
    pub fn mode_count(&self) -> usize {
        if self.modes.is_null() {
            0
        } else {
            usize::try_from(self.count_modes).unwrap_or(0)
        }
    }

    /// Exclusive view of the mode array owned by libdrm.
    ///
    /// # Safety
    /// `modes` must point to at least `count_modes` initialized entries that
    /// stay alive and unaliased for the returned borrow.
    pub unsafe fn modes_mut(&mut self) -> &mut [ModeInfo] {
        let count = self.mode_count();
        if count == 0 {
            return &mut [];
        }
        std::slice::from_raw_parts_mut(self.modes, count)
    }

    /// Shared view of the mode array.
    ///
    /// # Safety
    /// Same requirements as [`Connector::modes_mut`].
    pub unsafe fn modes(&self) -> &[ModeInfo] {
        let count = self.mode_count();
        if count == 0 {
            return &[];
        }
        std::slice::from_raw_parts(self.modes, count)
    }
}
