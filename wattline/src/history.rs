//! Small utilities to manage bounded history buffers for charts.

use std::collections::VecDeque;

use crate::types::Reading;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if dq.len() == cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

// Production/consumption samples in whole watts, newest last
pub struct PowerHistory {
    pub production: VecDeque<u64>,
    pub consumption: VecDeque<u64>,
    pub peak: u64,
    cap: usize,
}

impl PowerHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            production: VecDeque::with_capacity(cap),
            consumption: VecDeque::with_capacity(cap),
            peak: 0,
            cap,
        }
    }

    pub fn push(&mut self, r: &Reading) {
        let prod = r.current_production().round() as u64;
        let cons = r.current_consumption().round() as u64;
        push_capped(&mut self.production, prod, self.cap);
        push_capped(&mut self.consumption, cons, self.cap);
        self.peak = self.peak.max(prod).max(cons);
    }

    pub fn len(&self) -> usize {
        self.production.len()
    }

    pub fn is_empty(&self) -> bool {
        self.production.is_empty()
    }
}
