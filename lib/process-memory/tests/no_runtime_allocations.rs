//! Allocation test for `Querier`.
//!
//! Note: this is an integration test as the global allocator must be overridden to track all allocations made, and
//! doing so in normal unit tests could interfere with other tests.

use dhat::{HeapStats, Profiler};
use process_memory::Querier;

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

#[test]
fn no_runtime_allocations() {
    // Once constructed, repeatedly querying the peak usage must not allocate: the guard queries it on every check.
    let mut querier = Querier::default();

    let _profiler = Profiler::builder().testing().build();
    let first = querier.peak_resident_set_size().unwrap();
    let second = querier.peak_resident_set_size().unwrap();
    let third = querier.peak_resident_set_size().unwrap();
    let stats = HeapStats::get();

    dhat::assert_eq!(stats.total_blocks, 0);
    dhat::assert_eq!(stats.total_bytes, 0);
    dhat::assert_eq!(stats.curr_blocks, 0);
    dhat::assert!(first <= second && second <= third);
}
