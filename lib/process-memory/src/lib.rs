//! Process peak memory querying.
//!
//! This crate provides a cross-platform way to query the peak RSS (resident set size) of the current process: the
//! largest amount of physical memory the process has held at any point up to the query.
//!
//! ## Linux
//!
//! On Linux, the `VmHWM` ("high water mark") field of [`/proc/self/status`](https://docs.kernel.org/filesystems/proc.html)
//! is read. If procfs is unavailable, `getrusage(2)` is used instead, which reports the same figure.
//!
//! ## macOS
//!
//! On macOS, `getrusage(2)` is used. Unlike Linux, `ru_maxrss` is already expressed in bytes there.
//!
//! ## Windows
//!
//! On Windows, the `PeakWorkingSetSize` counter from `GetProcessMemoryInfo` is used.
//!
//! ## Other platforms
//!
//! Peak memory usage is not available, and the querier always returns `None`.

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
pub use linux::Querier;

#[cfg(target_os = "macos")]
mod darwin;

#[cfg(target_os = "macos")]
pub use darwin::Querier;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "windows")]
pub use windows::Querier;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
mod unsupported {
    /// A memory usage querier.
    #[derive(Default)]
    pub struct Querier;

    impl Querier {
        /// Gets the peak resident set size of this process, in bytes.
        ///
        /// Always `None` on this platform.
        pub fn peak_resident_set_size(&mut self) -> Option<usize> {
            None
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub use unsupported::Querier;
