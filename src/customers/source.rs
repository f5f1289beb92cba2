//! Customer generator.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::customers::model::Customer;

/// Produces customers with consecutive ids, cycling through `names`.
///
/// The Nth call returns id `N` and `names[N % names.len()]`.
#[derive(Debug)]
pub struct CustomerSource {
    counter: AtomicU64,
    names: Vec<String>,
}

impl CustomerSource {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            counter: AtomicU64::new(0),
            names,
        }
    }

    pub fn next(&self) -> Customer {
        let id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let name = match self.names.len() {
            0 => String::new(),
            len => self.names[(id % len as u64) as usize].clone(),
        };
        Customer { id, name }
    }

    /// Number of customers produced so far.
    pub fn produced(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}
