// SPDX-License-Identifier: MPL-2.0
//! Linux fbdev output.
//!
//! The device is queried with `FBIOGET_VSCREENINFO`/`FBIOGET_FSCREENINFO`
//! and its memory mapped shared, so [`FrameSink::row_mut`] writes go straight
//! to the screen.

use crate::error::{Error, Result};
use crate::player::blit::FrameSink;
use crate::player::decode::PixelLayout;
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::Path;

const FBIOGET_VSCREENINFO: u64 = 0x4600;
const FBIOGET_FSCREENINFO: u64 = 0x4602;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct FbBitfield {
    offset: u32,
    length: u32,
    msb_right: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct FbVarScreeninfo {
    xres: u32,
    yres: u32,
    xres_virtual: u32,
    yres_virtual: u32,
    xoffset: u32,
    yoffset: u32,
    bits_per_pixel: u32,
    grayscale: u32,
    red: FbBitfield,
    green: FbBitfield,
    blue: FbBitfield,
    transp: FbBitfield,
    nonstd: u32,
    activate: u32,
    height: u32,
    width: u32,
    accel_flags: u32,
    pixclock: u32,
    left_margin: u32,
    right_margin: u32,
    upper_margin: u32,
    lower_margin: u32,
    hsync_len: u32,
    vsync_len: u32,
    sync: u32,
    vmode: u32,
    rotate: u32,
    colorspace: u32,
    reserved: [u32; 4],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct FbFixScreeninfo {
    id: [u8; 16],
    smem_start: libc::c_ulong,
    smem_len: u32,
    type_: u32,
    type_aux: u32,
    visual: u32,
    xpanstep: u16,
    ypanstep: u16,
    ywrapstep: u16,
    line_length: u32,
    mmio_start: libc::c_ulong,
    mmio_len: u32,
    accel: u32,
    capabilities: u16,
    reserved: [u16; 2],
}

/// Memory-mapped framebuffer device.
pub struct Framebuffer {
    _file: File,
    map: *mut u8,
    map_len: usize,
    rows: usize,
    cols: usize,
    bytes_per_pixel: usize,
    line_length: usize,
    xoffset: usize,
    yoffset: usize,
    layout: PixelLayout,
}

fn query<T: Default>(fd: libc::c_int, request: u64, what: &str) -> Result<T> {
    let mut info = T::default();
    // SAFETY: `info` is a repr(C) struct matching the kernel layout for `request`.
    let ret = unsafe { libc::ioctl(fd, request as _, std::ptr::addr_of_mut!(info)) };
    if ret < 0 {
        return Err(Error::Device(format!(
            "{what} failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(info)
}

impl Framebuffer {
    /// Opens and maps the framebuffer at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the device cannot be opened, queried or
    /// mapped, or uses a depth other than 8, 16 or 32 bits.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| Error::Device(format!("cannot open {}: {e}", path.display())))?;
        let fd = file.as_raw_fd();

        let var: FbVarScreeninfo = query(fd, FBIOGET_VSCREENINFO, "FBIOGET_VSCREENINFO")?;
        let fix: FbFixScreeninfo = query(fd, FBIOGET_FSCREENINFO, "FBIOGET_FSCREENINFO")?;

        let layout = PixelLayout::from_bits_per_pixel(var.bits_per_pixel).ok_or_else(|| {
            Error::Device(format!("unsupported depth: {} bpp", var.bits_per_pixel))
        })?;
        let bytes_per_pixel = layout.bytes_per_pixel();
        let map_len = fix.smem_len as usize;
        let line_length = fix.line_length as usize;
        let rows = var.yres as usize;
        let cols = var.xres as usize;
        let xoffset = var.xoffset as usize;
        let yoffset = var.yoffset as usize;

        let needed = (yoffset + rows) * line_length;
        if needed > map_len || (xoffset + cols) * bytes_per_pixel > line_length {
            return Err(Error::Device(format!(
                "visible area {cols}x{rows} does not fit the framebuffer memory"
            )));
        }

        // SAFETY: maps `map_len` bytes of an open device; checked against MAP_FAILED.
        let map = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if map == libc::MAP_FAILED {
            return Err(Error::Device(format!(
                "mmap failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        tracing::info!(
            device = %path.display(),
            cols,
            rows,
            bits_per_pixel = var.bits_per_pixel,
            "framebuffer opened"
        );

        Ok(Self {
            _file: file,
            map: map.cast(),
            map_len,
            rows,
            cols,
            bytes_per_pixel,
            line_length,
            xoffset,
            yoffset,
            layout,
        })
    }

    /// Pixel layout the scaler must produce for this device.
    #[must_use]
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }
}

impl FrameSink for Framebuffer {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    fn row_mut(&mut self, row: usize) -> &mut [u8] {
        let row = row.min(self.rows.saturating_sub(1));
        let start = (row + self.yoffset) * self.line_length + self.xoffset * self.bytes_per_pixel;
        let len = self.cols * self.bytes_per_pixel;
        // SAFETY: `open` checked that every visible row lies inside the mapping,
        // and `&mut self` gives exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.map.add(start), len) }
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        // SAFETY: `map` came from mmap with `map_len` and is unmapped once.
        unsafe { libc::munmap(self.map.cast(), self.map_len) };
    }
}
