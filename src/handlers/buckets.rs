//! # Bucket Aggregation
//!
//! Groups resupply order rows into named counters:
//!
//! | bucket               | key              | counts                                  |
//! |----------------------|------------------|-----------------------------------------|
//! | `pid`                | product id       | orders                                  |
//! | `sku`                | SKU              | members carrying the SKU                |
//! | `active_members_sku` | product + SKU    | members with a future bill date         |
//! | `canceled`           | product + SKU    | canceled members                        |
//! | `sku_qty_purchased`  | SKU              | summed purchased quantity               |
//! | `purchased`          | product + SKU    | members who purchased                   |
//!
//! Aggregation is pure accumulation, so totals do not depend on row order.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::Serialize;

use crate::handlers::sku::parse_sku_string;
use crate::models::{OrderRow, OrderStatus};

/// Composite key for per-product SKU buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductSku {
    pub product_id: i32,
    pub sku: String,
}

impl ProductSku {
    pub fn new(product_id: i32, sku: impl Into<String>) -> Self {
        Self {
            product_id,
            sku: sku.into(),
        }
    }
}

impl fmt::Display for ProductSku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.product_id, self.sku)
    }
}

/// Keys that may be counted. Empty SKUs are never inserted.
pub trait BucketKey: Clone + Eq + Hash + fmt::Display {
    fn is_countable(&self) -> bool;
}

impl BucketKey for i32 {
    fn is_countable(&self) -> bool {
        true
    }
}

impl BucketKey for String {
    fn is_countable(&self) -> bool {
        !self.is_empty()
    }
}

impl BucketKey for ProductSku {
    fn is_countable(&self) -> bool {
        !self.sku.is_empty()
    }
}

/// Accumulated counts per key, remembering the order keys were first seen.
#[derive(Debug, Clone)]
pub struct Bucket<K> {
    counts: HashMap<K, i64>,
    first_seen: Vec<K>,
}

impl<K: BucketKey> Bucket<K> {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            first_seen: Vec::new(),
        }
    }

    /// Add `amount` to `key`. Uncountable keys are ignored.
    pub fn add(&mut self, key: K, amount: i64) {
        if !key.is_countable() {
            return;
        }

        match self.counts.get_mut(&key) {
            Some(count) => *count += amount,
            None => {
                self.first_seen.push(key.clone());
                self.counts.insert(key, amount);
            }
        }
    }

    pub fn increment(&mut self, key: K) {
        self.add(key, 1);
    }

    /// Count for `key`, or `None` if it was never counted.
    pub fn get(&self, key: &K) -> Option<i64> {
        self.counts.get(key).copied()
    }

    /// Count for `key`, treating an absent key as zero.
    pub fn count(&self, key: &K) -> i64 {
        self.get(key).unwrap_or(0)
    }

    /// Keys in the order they were first counted.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.first_seen.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, i64)> {
        self.first_seen.iter().map(|key| (key, self.count(key)))
    }

    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }
}

impl<K: BucketKey> Default for Bucket<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Buckets compare by their counts; first-seen order is not part of equality.
impl<K: BucketKey> PartialEq for Bucket<K> {
    fn eq(&self, other: &Self) -> bool {
        self.counts == other.counts
    }
}

impl<K: BucketKey> Serialize for Bucket<K> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, count) in self.iter() {
            map.serialize_entry(&key.to_string(), &count)?;
        }
        map.end()
    }
}

/// The full set of buckets for one report run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketSet {
    pub pid: Bucket<i32>,
    pub sku: Bucket<String>,
    pub active_members_sku: Bucket<ProductSku>,
    pub canceled: Bucket<ProductSku>,
    pub sku_qty_purchased: Bucket<String>,
    pub purchased: Bucket<ProductSku>,
}

impl BucketSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the buckets for a full row sequence.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a OrderRow>) -> Self {
        let mut buckets = Self::new();
        for row in rows {
            buckets.add_row(row);
        }
        buckets
    }

    /// Count one order row into the buckets.
    pub fn add_row(&mut self, row: &OrderRow) {
        let pid = row.product_id;
        self.pid.increment(pid);

        // Each SKU on a recurring order counts the member once.
        let recur = parse_sku_string(row.recur_sku_string.as_deref());
        for (sku, qty) in &recur {
            self.sku.increment(sku.clone());

            if row.is_active_member() {
                self.active_members_sku.increment(ProductSku::new(pid, sku));
            }

            if row.status == OrderStatus::Canceled {
                self.canceled.increment(ProductSku::new(pid, sku));
            }

            if row.status == OrderStatus::Active {
                self.record_purchase(pid, sku, *qty);
            }
        }

        // Completed one-time purchases only count when nothing recurs.
        if !recur.is_empty() {
            return;
        }

        let onetime = parse_sku_string(row.onetime_sku_string.as_deref());
        if matches!(
            row.status,
            OrderStatus::AwaitingProcessing | OrderStatus::Completed
        ) {
            for (sku, qty) in &onetime {
                self.record_purchase(pid, sku, *qty);
            }
        }
    }

    fn record_purchase(&mut self, pid: i32, sku: &str, qty: Option<i64>) {
        self.sku_qty_purchased.add(sku.to_string(), qty.unwrap_or(0));
        self.purchased.increment(ProductSku::new(pid, sku));
    }

    pub fn is_empty(&self) -> bool {
        self.pid.is_empty()
    }
}
