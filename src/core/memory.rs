// core/memory.rs

// Remembers where each food item was discovered and which items are still
// waiting to be delivered. The catalog is rebuilt from detector batches during
// discovery; the request queue is built from a delivery request string.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A discovered target location
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FoodLocation {
    /// Item name used in delivery requests
    pub name: String,
    /// X position (meters, world frame)
    pub x: f64,
    /// Y position (meters, world frame)
    pub y: f64,
}

/// Detector batch with parallel name and coordinate arrays
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct FoodLocationBatch {
    /// Item names
    pub names: Vec<String>,
    /// X coordinates, one per name
    pub xs: Vec<f64>,
    /// Y coordinates, one per name
    pub ys: Vec<f64>,
}

/// Why a batch was not applied
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    /// Parallel arrays of different lengths
    LengthMismatch {
        /// Number of names
        names: usize,
        /// Number of x coordinates
        xs: usize,
        /// Number of y coordinates
        ys: usize,
    },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CatalogError::LengthMismatch { names, xs, ys } => write!(
                f,
                "food location batch has {} names, {} xs and {} ys",
                names, xs, ys
            ),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Ordered mapping from item name to location. Insertion order is kept and the
/// first entry wins when a batch repeats a name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<FoodLocation>,
}

impl Catalog {
    /// Empty catalog
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Replaces every entry with the batch contents. A malformed batch leaves
    /// the catalog untouched.
    pub fn replace_with(&mut self, batch: &FoodLocationBatch) -> Result<(), CatalogError> {
        if batch.names.len() != batch.xs.len() || batch.names.len() != batch.ys.len() {
            return Err(CatalogError::LengthMismatch {
                names: batch.names.len(),
                xs: batch.xs.len(),
                ys: batch.ys.len(),
            });
        }

        let mut entries: Vec<FoodLocation> = Vec::with_capacity(batch.names.len());
        for ((name, &x), &y) in batch.names.iter().zip(&batch.xs).zip(&batch.ys) {
            if entries.iter().any(|entry| &entry.name == name) {
                debug!("Duplicate catalog entry {} ignored", name);
                continue;
            }
            entries.push(FoodLocation { name: name.clone(), x, y });
        }

        if entries != self.entries {
            info!("Catalog updated: {} locations", entries.len());
        }
        self.entries = entries;
        Ok(())
    }

    /// Location of `name`, if discovered
    pub fn get(&self, name: &str) -> Option<&FoodLocation> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Number of distinct names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True before any batch was applied
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Locations in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &FoodLocation> {
        self.entries.iter()
    }
}

/// One slot of the request queue
#[derive(Clone, Debug, PartialEq)]
pub enum QueueEntry {
    /// A requested item name
    Item(String),
    /// Appended once at creation; nothing after it can match
    Terminal,
}

/// Requested item names in delivery order, closed by a terminal sentinel
#[derive(Clone, Debug, PartialEq)]
pub struct RequestQueue {
    entries: VecDeque<QueueEntry>,
}

impl RequestQueue {
    /// Splits a comma-separated request. Names are trimmed and blanks dropped.
    pub fn from_request(request: &str) -> Self {
        let mut entries: VecDeque<QueueEntry> = request
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| QueueEntry::Item(name.to_string()))
            .collect();
        entries.push_back(QueueEntry::Terminal);
        RequestQueue { entries }
    }

    /// Takes the next entry
    pub fn pop_front(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// True once the sentinel has been consumed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remaining entries, sentinel included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Item names not yet consumed, sentinel excluded
    pub fn pending_items(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                QueueEntry::Item(name) => Some(name.as_str()),
                QueueEntry::Terminal => None,
            })
            .collect()
    }
}
