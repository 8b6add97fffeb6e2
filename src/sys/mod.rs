//! Native constants, record layouts and foreign functions
//!
//! The constant tables are plain numbers and compile on every platform, so
//! the translators (and their tests) work everywhere; the `extern` blocks
//! and record-walking helpers are gated to the platforms that actually
//! provide the corresponding system call.

pub mod fanotify;
pub mod inotify;
pub mod kqueue;

use once_cell::sync::Lazy;

/// A `(major, minor)` kernel version, for gating calling conventions
///
/// Parsed from `uname(2)` on first use. Comparison follows tuple order, so
/// `KERNEL_VERSION >= (3, 15)` reads the way the kernel headers' macro does.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) static KERNEL_VERSION: Lazy<(u32, u32)> = Lazy::new(|| {
    let mut utsname = std::mem::MaybeUninit::<libc::utsname>::uninit();

    // uname only fails on a bad pointer; fall back to "modern" if it does.
    if unsafe { libc::uname(utsname.as_mut_ptr()) } != 0 {
        return (u32::MAX, u32::MAX);
    }
    let utsname = unsafe { utsname.assume_init() };

    let release: Vec<u8> = utsname
        .release
        .iter()
        .take_while(|c| **c != 0)
        .map(|c| *c as u8)
        .collect();

    parse_release(&String::from_utf8_lossy(&release)).unwrap_or((u32::MAX, u32::MAX))
});

/// Extracts `(major, minor)` from a release string like `"5.15.0-86-generic"`
fn parse_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split(|c: char| !c.is_ascii_digit());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}
