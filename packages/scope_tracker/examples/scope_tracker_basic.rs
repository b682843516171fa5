//! Basic single-threaded usage: instrument a few functions, print the tables.

#![allow(
    missing_docs,
    reason = "No need for API documentation in example code"
)]

use std::thread;
use std::time::Duration;

use scope_tracker::scope;

fn load_configuration() {
    scope!();
    thread::sleep(Duration::from_millis(5));
}

fn process_record(index: u64) -> u64 {
    scope!();
    thread::sleep(Duration::from_millis(1));
    index * 2
}

fn flush_output() {
    scope!("flush");
    thread::sleep(Duration::from_millis(2));
}

fn main() {
    load_configuration();

    let mut checksum = 0;
    for index in 0..20 {
        checksum += process_record(index);
    }
    flush_output();

    println!("checksum: {checksum}");
    scope_tracker::print_results();
}
