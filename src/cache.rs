use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use sha2::Digest as _;

use crate::formats::PaginationResult;
use crate::paginate::{PaginationConfig, paginate};

/// Memoizes pagination by content and config so unchanged content is not
/// re-paginated. Oldest entries are evicted first.
#[derive(Debug)]
pub struct PaginationCache {
    capacity: usize,
    entries: HashMap<String, Arc<PaginationResult>>,
    order: VecDeque<String>,
}

impl PaginationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_or_paginate(
        &mut self,
        content: &str,
        config: &PaginationConfig,
    ) -> Arc<PaginationResult> {
        let key = cache_key(content, config);
        if let Some(hit) = self.entries.get(&key) {
            tracing::debug!(key = &key[..12], "pagination cache hit");
            return Arc::clone(hit);
        }

        let result = Arc::new(paginate(content, config));
        self.entries.insert(key.clone(), Arc::clone(&result));
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
        result
    }
}

pub fn cache_key(content: &str, config: &PaginationConfig) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(b"\0");
    for value in [
        config.target_words as u64,
        config.min_words as u64,
        config.max_words as u64,
        u64::from(config.words_per_minute),
    ] {
        hasher.update(value.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}
