//! `SearchDimension` / `SearchDimensions` (spec.md §4.1): the mapping from
//! integer grid indices to physical configuration values. All search
//! arithmetic (distance, step vectors, clamping) happens in index space;
//! values only appear when a coordinate is turned into a `RunConfig`.

use std::collections::BTreeMap;

use search_types::{SearchError, SearchResult};

use crate::coordinate::Coordinate;

/// Sentinel for "no upper bound" (original: `sys.maxsize`).
pub const DIMENSION_NO_MAX: i64 = i32::MAX as i64;

/// How a dimension's index maps to its physical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// `value_at(i) == i + 1`.
    Linear,
    /// `value_at(i) == 2^i`.
    Exponential,
}

/// A single named axis of the search grid. Pure: `value_at` is a function of
/// `i` alone, never of prior calls or other dimensions (spec.md §4.1 invariant
/// #1, testable property #1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDimension {
    pub name: String,
    pub growth: Growth,
    pub min_idx: i64,
    pub max_idx: i64,
}

impl SearchDimension {
    pub fn new(name: impl Into<String>, growth: Growth, min_idx: i64, max_idx: i64) -> Self {
        Self {
            name: name.into(),
            growth,
            min_idx,
            max_idx,
        }
    }

    pub fn linear(name: impl Into<String>, min_idx: i64, max_idx: i64) -> Self {
        Self::new(name, Growth::Linear, min_idx, max_idx)
    }

    pub fn exponential(name: impl Into<String>, min_idx: i64, max_idx: i64) -> Self {
        Self::new(name, Growth::Exponential, min_idx, max_idx)
    }

    fn in_range(&self, i: i64) -> bool {
        i >= self.min_idx && i <= self.max_idx
    }

    /// Fails with `IndexOutOfRange` if `i` is outside `[min_idx, max_idx]`.
    pub fn value_at(&self, i: i64) -> SearchResult<i64> {
        if !self.in_range(i) {
            return Err(SearchError::IndexOutOfRange {
                dimension: self.name.clone(),
                index: i,
                min: self.min_idx,
                max: self.max_idx,
            });
        }
        Ok(match self.growth {
            Growth::Linear => i + 1,
            Growth::Exponential => 1i64 << i,
        })
    }

    /// Clamp an arbitrary index into this dimension's bounds.
    pub fn clamp(&self, i: i64) -> i64 {
        i.clamp(self.min_idx, self.max_idx)
    }
}

/// Ordered sequence of dimensions, each tagged with the opaque key (typically
/// a model name) that owns it. `values_for` groups a coordinate's values by
/// that key.
#[derive(Debug, Clone, Default)]
pub struct SearchDimensions {
    keys: Vec<String>,
    dims: Vec<SearchDimension>,
}

impl SearchDimensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, dim: SearchDimension) {
        self.keys.push(key.into());
        self.dims.push(dim);
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&SearchDimension> {
        self.dims.get(i)
    }

    pub fn key_at(&self, i: usize) -> Option<&str> {
        self.keys.get(i).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SearchDimension)> {
        self.keys.iter().map(|s| s.as_str()).zip(self.dims.iter())
    }

    /// `key -> {name -> value}` for every dimension's current value under
    /// `coordinate`. Fails with `DimensionMismatch` if lengths differ.
    pub fn values_for(
        &self,
        coordinate: &Coordinate,
    ) -> SearchResult<BTreeMap<String, BTreeMap<String, i64>>> {
        if coordinate.len() != self.len() {
            return Err(SearchError::DimensionMismatch {
                expected: self.len(),
                actual: coordinate.len(),
            });
        }
        let mut out: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
        for (i, ((key, dim), idx)) in self.iter().zip(coordinate.iter()).enumerate() {
            let value = dim.value_at(*idx)?;
            out.entry(key.to_string())
                .or_default()
                .insert(dim.name.clone(), value);
            let _ = i;
        }
        Ok(out)
    }

    /// Clamp every component of `coordinate` into its dimension's bounds.
    pub fn clamp(&self, coordinate: &Coordinate) -> Coordinate {
        let clamped: Vec<i64> = coordinate
            .iter()
            .enumerate()
            .map(|(i, v)| self.dims[i].clamp(*v))
            .collect();
        Coordinate::new(clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_value_is_index_plus_one() {
        let d = SearchDimension::linear("batch", 0, 10);
        assert_eq!(d.value_at(0).unwrap(), 1);
        assert_eq!(d.value_at(5).unwrap(), 6);
    }

    #[test]
    fn exponential_value_is_power_of_two() {
        let d = SearchDimension::exponential("concurrency", 0, 10);
        assert_eq!(d.value_at(0).unwrap(), 1);
        assert_eq!(d.value_at(3).unwrap(), 8);
    }

    #[test]
    fn out_of_range_is_index_out_of_range_error() {
        let d = SearchDimension::linear("batch", 0, 4);
        assert!(matches!(
            d.value_at(5),
            Err(SearchError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            d.value_at(-1),
            Err(SearchError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn purity_same_index_same_value() {
        let d = SearchDimension::exponential("concurrency", 0, 10);
        assert_eq!(d.value_at(4).unwrap(), d.value_at(4).unwrap());
    }

    #[test]
    fn values_for_groups_by_key_and_fails_on_length_mismatch() {
        let mut dims = SearchDimensions::new();
        dims.push("model_a", SearchDimension::linear("max_batch_size", 0, 10));
        dims.push(
            "model_a",
            SearchDimension::exponential("instance_count", 0, 10),
        );

        let c = Coordinate::new(vec![2, 3]);
        let values = dims.values_for(&c).unwrap();
        assert_eq!(values["model_a"]["max_batch_size"], 3);
        assert_eq!(values["model_a"]["instance_count"], 8);

        let bad = Coordinate::new(vec![2]);
        assert!(matches!(
            dims.values_for(&bad),
            Err(SearchError::DimensionMismatch { .. })
        ));
    }
}
