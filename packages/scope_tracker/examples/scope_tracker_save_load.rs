//! Persisting raw events to a file and computing the tables offline.

#![allow(
    missing_docs,
    reason = "No need for API documentation in example code"
)]

use std::thread;
use std::time::Duration;

use scope_tracker::scope;

fn simulate_request(payload: u64) -> u64 {
    scope!();
    thread::sleep(Duration::from_millis(1 + payload % 3));
    payload.wrapping_mul(31)
}

fn main() {
    let mut acc = 0;
    for payload in 0..30 {
        acc ^= simulate_request(payload);
    }
    println!("acc: {acc}");

    let mut path = std::env::temp_dir();
    path.push("scope_tracker_example_events.bin");

    // Saving drains the recorded events into the file.
    scope_tracker::save_to_file(&path).expect("failed to write event file");
    println!("events saved to {}", path.display());

    // A separate process could do this at any later time.
    scope_tracker::print_results_from_file(&path).expect("failed to load event file");

    let _ = std::fs::remove_file(&path);
}
