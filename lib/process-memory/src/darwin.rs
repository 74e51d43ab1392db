use std::mem::MaybeUninit;

/// A memory usage querier.
#[derive(Default)]
pub struct Querier;

impl Querier {
    /// Gets the peak resident set size of this process, in bytes.
    ///
    /// If the peak resident set size cannot be determined, `None` is returned. This should generally be considered an
    /// incredibly rare/unlikely event.
    pub fn peak_resident_set_size(&mut self) -> Option<usize> {
        let mut usage = MaybeUninit::<libc::rusage>::uninit();

        // SAFETY: We're passing a valid pointer to a `rusage` struct for the kernel to fill in.
        let result = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
        if result != 0 {
            return None;
        }

        // SAFETY: `getrusage` succeeded, so the structure has been populated.
        let usage = unsafe { usage.assume_init() };

        // On macOS, `ru_maxrss` is in bytes.
        usize::try_from(usage.ru_maxrss).ok().filter(|bytes| *bytes > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::Querier;

    #[test]
    fn basic() {
        let mut querier = Querier::default();
        assert!(querier.peak_resident_set_size().is_some());
    }
}
