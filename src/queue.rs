/*
 *  queue.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Order-stable display rotation queue
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::collections::HashSet;

use crate::flight::{Flight, QueueEntry};

/// Survivors keep their relative order, vanished flights drop out,
/// newcomers join the tail in fetch order. One entry per key.
pub fn merge(previous: &[QueueEntry], fresh: &[Flight]) -> Vec<QueueEntry> {
    let fresh_keys: HashSet<&str> = fresh
        .iter()
        .map(Flight::key)
        .filter(|k| !k.is_empty())
        .collect();

    let mut seen: HashSet<String> = HashSet::with_capacity(fresh_keys.len());
    let mut merged: Vec<QueueEntry> = Vec::with_capacity(fresh_keys.len());

    for entry in previous {
        if fresh_keys.contains(entry.key.as_str()) && seen.insert(entry.key.clone()) {
            merged.push(entry.clone());
        }
    }
    for flight in fresh {
        let key = flight.key();
        if !key.is_empty() && seen.insert(key.to_string()) {
            merged.push(QueueEntry::from(flight));
        }
    }
    merged
}

/// Rotation order held across polling cycles. Only the fetch step writes it.
#[derive(Debug, Default, Clone)]
pub struct DisplayQueue {
    entries: Vec<QueueEntry>,
}

impl DisplayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge_in(&mut self, fresh: &[Flight]) {
        self.entries = merge(&self.entries, fresh);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }
}
