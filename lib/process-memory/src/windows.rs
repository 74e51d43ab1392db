use std::mem::MaybeUninit;

use windows_sys::Win32::System::{
    ProcessStatus::{GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS},
    Threading::GetCurrentProcess,
};

/// A memory usage querier.
#[derive(Default)]
pub struct Querier;

impl Querier {
    /// Gets the peak working set size of this process, in bytes.
    ///
    /// If the peak working set size cannot be determined, `None` is returned. This should generally be considered an
    /// incredibly rare/unlikely event.
    pub fn peak_resident_set_size(&mut self) -> Option<usize> {
        let mut pmc = MaybeUninit::<PROCESS_MEMORY_COUNTERS>::uninit();
        let pmc_len = std::mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32;

        // SAFETY: We're passing a valid pointer, and struct length, for the counters output.
        let result = unsafe { GetProcessMemoryInfo(GetCurrentProcess(), pmc.as_mut_ptr(), pmc_len) };
        match result {
            0 => None,
            _ => {
                // SAFETY: `GetProcessMemoryInfo` succeeded, so the structure has been populated.
                let pmc = unsafe { pmc.assume_init() };
                Some(pmc.PeakWorkingSetSize)
            }
        }
    }
}
