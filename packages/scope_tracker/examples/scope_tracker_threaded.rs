//! Multithreaded prime counting with the same site executing on every worker.

#![allow(
    missing_docs,
    reason = "No need for API documentation in example code"
)]

use std::thread;

use scope_tracker::scope;

fn is_prime(n: u64) -> bool {
    scope!();
    if n < 2 {
        return false;
    }
    let mut divisor = 2;
    while divisor * divisor <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 1;
    }
    true
}

fn count_primes(range: std::ops::Range<u64>) -> usize {
    scope!();
    range.filter(|&n| is_prime(n)).count()
}

fn main() {
    const WORKERS: u64 = 4;
    const CHUNK: u64 = 50_000;

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| thread::spawn(move || count_primes(worker * CHUNK..(worker + 1) * CHUNK)))
        .collect();

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    println!("primes below {}: {total}", WORKERS * CHUNK);
    scope_tracker::print_results();
}
