use std::{
    fs::{self, File},
    io::{self, Read},
    mem::MaybeUninit,
};

const STATUS_PATH: &str = "/proc/self/status";
const PEAK_RSS_LINE_PREFIX: &[u8] = b"VmHWM:";

enum StatSource {
    Status(Scanner<File>),
    Rusage,
}

/// A memory usage querier.
pub struct Querier {
    source: StatSource,
}

impl Querier {
    /// Gets the peak resident set size of this process, in bytes.
    ///
    /// If the peak resident set size cannot be determined, `None` is returned. This could be for a number of underlying
    /// reasons, but should generally be considered an incredibly rare/unlikely event.
    pub fn peak_resident_set_size(&mut self) -> Option<usize> {
        match &mut self.source {
            StatSource::Status(scanner) => {
                if scanner.reset_with_path(STATUS_PATH).is_err() {
                    return peak_rss_from_rusage();
                }
                peak_rss_from_status(scanner).or_else(peak_rss_from_rusage)
            }
            StatSource::Rusage => peak_rss_from_rusage(),
        }
    }
}

impl Default for Querier {
    fn default() -> Self {
        let source = if fs::metadata(STATUS_PATH).is_ok() {
            StatSource::Status(Scanner::new())
        } else {
            StatSource::Rusage
        };

        Self { source }
    }
}

fn peak_rss_from_status<T: Read>(scanner: &mut Scanner<T>) -> Option<usize> {
    // There's exactly one `VmHWM:` line, formatted as `VmHWM:\t   12345 kB`.
    let raw_line = scanner.next_matching_line(PEAK_RSS_LINE_PREFIX).ok()??;
    let raw_value = skip_to_line_value(raw_line)?;
    parse_kb_value_as_bytes(raw_value)
}

fn peak_rss_from_rusage() -> Option<usize> {
    let mut usage = MaybeUninit::<libc::rusage>::uninit();

    // SAFETY: We're passing a valid pointer to a `rusage` struct for the kernel to fill in.
    let result = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if result != 0 {
        return None;
    }

    // SAFETY: `getrusage` succeeded, so the structure has been populated.
    let usage = unsafe { usage.assume_init() };

    // On Linux, `ru_maxrss` is in kilobytes.
    usize::try_from(usage.ru_maxrss)
        .ok()
        .filter(|kb| *kb > 0)
        .map(|kb| kb * 1024)
}

fn parse_kb_value_as_bytes(raw_value: &[u8]) -> Option<usize> {
    // The raw value here will be in the form of `XXXXXX kB`, so take everything up to the first space.
    let space_idx = raw_value.iter().position(|&b| b == b' ')?;
    std::str::from_utf8(&raw_value[..space_idx])
        .ok()?
        .parse::<usize>()
        .ok()
        .map(|value| value * 1024)
}

fn skip_to_line_value(raw_line: &[u8]) -> Option<&[u8]> {
    raw_line
        .iter()
        .position(|b| b.is_ascii_digit())
        .map(|idx| &raw_line[idx..])
}

/// Line scanner over a reader, reusing a single fixed-capacity buffer across resets.
struct Scanner<T> {
    io: Option<T>,
    eof: bool,
    buf: Vec<u8>,
    pending_consume: Option<usize>,
}

impl<T> Scanner<T>
where
    T: Read,
{
    fn new() -> Self {
        Self {
            io: None,
            eof: false,
            buf: Vec::with_capacity(4096),
            pending_consume: None,
        }
    }

    fn reset(&mut self, io: T) {
        self.buf.clear();
        self.eof = false;
        self.pending_consume = None;
        self.io = Some(io);
    }

    fn fill_buf(&mut self) -> io::Result<()> {
        if self.eof || self.buf.len() == self.buf.capacity() {
            return Ok(());
        }

        let io = match self.io.as_mut() {
            Some(io) => io,
            None => return Err(io::Error::new(io::ErrorKind::Other, "no reader set in scanner")),
        };

        // SAFETY: There's no invalid bit patterns for `u8`.
        let read_buf = unsafe { &mut *(self.buf.spare_capacity_mut() as *mut [MaybeUninit<u8>] as *mut [u8]) };
        let n = io.read(read_buf)?;
        if n == 0 {
            self.eof = true;
        }

        // SAFETY: `n` bytes were just written into the spare capacity, so the new length only covers initialized bytes.
        unsafe {
            self.buf.set_len(self.buf.len() + n);
        }

        Ok(())
    }

    fn next_matching_line(&mut self, prefix: &[u8]) -> io::Result<Option<&[u8]>> {
        loop {
            if let Some(consume) = self.pending_consume.take() {
                self.buf.drain(..consume);
            }

            self.fill_buf()?;

            if self.eof && self.buf.is_empty() {
                return Ok(None);
            }

            let maybe_newline_idx = self.buf.iter().position(|&b| b == b'\n');
            match maybe_newline_idx {
                Some(newline_idx) => {
                    self.pending_consume = Some(newline_idx + 1);
                    if self.buf.starts_with(prefix) {
                        return Ok(Some(&self.buf[..newline_idx]));
                    }
                }
                None if self.eof => {
                    // Final line without a trailing newline.
                    let matched = self.buf.starts_with(prefix);
                    self.pending_consume = Some(self.buf.len());
                    if matched {
                        return Ok(Some(&self.buf[..]));
                    }
                }
                None if self.buf.len() == self.buf.capacity() => {
                    // A single line longer than the buffer: it can't be one we care about, so drop what we have and
                    // keep reading until the line ends.
                    self.buf.clear();
                }
                None => {}
            }
        }
    }
}

impl Scanner<File> {
    fn reset_with_path(&mut self, path: &str) -> io::Result<()> {
        let file = File::open(path)?;
        self.reset(file);

        Ok(())
    }
}
