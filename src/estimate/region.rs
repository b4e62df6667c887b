//! Inter-region distance model
//!
//! Folds a sparse set of pairwise region distances into the average-distance
//! penalties used by the communication model: a volume factor (5% per
//! 1000 km) and an added propagation latency (5 ms per 1000 km).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EstimateError, Result};

/// Extra communication overhead per 1000 km of average distance
const DISTANCE_OVERHEAD_PER_1000_KM: f64 = 0.05;

/// Propagation delay in milliseconds per 1000 km of fiber
const LATENCY_MS_PER_1000_KM: f64 = 5.0;

/// Overhead weight applied to log2(region_count)
const CROSS_REGION_WEIGHT: f64 = 0.1;

const FIELD: &str = "region_distances_km";

/// Symmetric map of region pair to distance in km
///
/// Regions are identified 1-based. Pairs are stored canonically (lower id
/// first), so a lookup for `(2, 1)` finds the distance stored for `(1, 2)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct RegionDistances {
    pairs: BTreeMap<(u32, u32), f64>,
}

impl RegionDistances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the distance between regions `a` and `b` (either order)
    pub fn set(&mut self, a: u32, b: u32, km: f64) -> Result<()> {
        let key = canonical_pair(a, b)?;
        self.pairs.insert(key, km);
        Ok(())
    }

    /// Builder form of [`RegionDistances::set`]
    pub fn with(mut self, a: u32, b: u32, km: f64) -> Result<Self> {
        self.set(a, b, km)?;
        Ok(self)
    }

    /// Distance between two regions, looked up in either direction
    pub fn get(&self, a: u32, b: u32) -> Option<f64> {
        let key = if a < b { (a, b) } else { (b, a) };
        self.pairs.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Canonical `(i, j, km)` triples with `i < j`
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, f64)> + '_ {
        self.pairs.iter().map(|(&(a, b), &km)| (a, b, km))
    }

    /// Check distances are non-negative and reference existing regions
    pub fn validate(&self, region_count: u32) -> Result<()> {
        for (a, b, km) in self.iter() {
            if !km.is_finite() || km < 0.0 {
                return Err(EstimateError::invalid(
                    FIELD,
                    format!("distance {}-{} must be non-negative, got {}", a, b, km),
                ));
            }
            if b > region_count {
                return Err(EstimateError::invalid(
                    FIELD,
                    format!(
                        "pair {}-{} references a region beyond region_count {}",
                        a, b, region_count
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Parse an "i-j" pair key
    pub fn parse_key(key: &str) -> Result<(u32, u32)> {
        let (a, b) = key
            .split_once('-')
            .ok_or_else(|| EstimateError::invalid(FIELD, format!("malformed pair key '{}'", key)))?;
        let parse = |s: &str| {
            s.trim().parse::<u32>().map_err(|_| {
                EstimateError::invalid(FIELD, format!("malformed pair key '{}'", key))
            })
        };
        canonical_pair(parse(a)?, parse(b)?)
    }
}

fn canonical_pair(a: u32, b: u32) -> Result<(u32, u32)> {
    if a == 0 || b == 0 {
        return Err(EstimateError::invalid(
            FIELD,
            format!("region ids are 1-based, got pair {}-{}", a, b),
        ));
    }
    if a == b {
        return Err(EstimateError::invalid(
            FIELD,
            format!("pair {}-{} names the same region twice", a, b),
        ));
    }
    Ok(if a < b { (a, b) } else { (b, a) })
}

impl TryFrom<BTreeMap<String, f64>> for RegionDistances {
    type Error = EstimateError;

    fn try_from(raw: BTreeMap<String, f64>) -> Result<Self> {
        let mut distances = RegionDistances::new();
        for (key, km) in raw {
            let (a, b) = Self::parse_key(&key)?;
            // Both orientations may be listed; they must agree
            if let Some(existing) = distances.get(a, b) {
                if existing != km {
                    return Err(EstimateError::invalid(
                        FIELD,
                        format!("conflicting distances for {}-{}: {} vs {}", a, b, existing, km),
                    ));
                }
            }
            distances.set(a, b, km)?;
        }
        Ok(distances)
    }
}

impl From<RegionDistances> for BTreeMap<String, f64> {
    fn from(distances: RegionDistances) -> Self {
        distances
            .iter()
            .map(|(a, b, km)| (format!("{}-{}", a, b), km))
            .collect()
    }
}

/// Average-distance penalties for one cluster layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionDistanceModel {
    /// Average canonical pair distance, if any pair is known and regions > 1
    pub average_distance_km: Option<f64>,
    /// 1 + (avg / 1000) * 0.05, or 1.0 without distances
    pub distance_factor: f64,
    /// Average added propagation delay across pairs
    pub distance_latency_ms: f64,
    /// log2(region_count)
    pub cross_region_overhead: f64,
    /// (1 + 0.1 * log2(region_count)) * distance_factor
    pub region_communication_factor: f64,
}

impl RegionDistanceModel {
    pub fn new(distances: &RegionDistances, region_count: u32) -> Self {
        let region_count = region_count.max(1);

        let average_distance_km = if region_count > 1 && !distances.is_empty() {
            let total: f64 = distances.iter().map(|(_, _, km)| km).sum();
            Some(total / distances.len() as f64)
        } else {
            None
        };

        let (distance_factor, distance_latency_ms) = match average_distance_km {
            Some(avg) => (
                1.0 + (avg / 1000.0) * DISTANCE_OVERHEAD_PER_1000_KM,
                (avg / 1000.0) * LATENCY_MS_PER_1000_KM,
            ),
            None => (1.0, 0.0),
        };

        let cross_region_overhead = (region_count as f64).log2();
        let region_communication_factor =
            (1.0 + CROSS_REGION_WEIGHT * cross_region_overhead) * distance_factor;

        Self {
            average_distance_km,
            distance_factor,
            distance_latency_ms,
            cross_region_overhead,
            region_communication_factor,
        }
    }
}
