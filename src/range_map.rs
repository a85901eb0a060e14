//! Interval map over the logical partition space.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::subject::LogicalRange;

/// Maps disjoint [`LogicalRange`]s to values.
///
/// Inserting a range overwrites whatever was mapped to the overlapped part
/// before, trimming or splitting older entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeMap<V> {
    /// Entries keyed by range start.
    entries: BTreeMap<i32, (LogicalRange, V)>,
}

impl<V> Default for RangeMap<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V> RangeMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the value whose range contains `point`.
    pub fn get(&self, point: i32) -> Option<&V> {
        self.entry(point).map(|(_, value)| value)
    }

    /// Returns the range containing `point` and its value.
    pub fn entry(&self, point: i32) -> Option<(LogicalRange, &V)> {
        self.entries
            .range(..=point)
            .next_back()
            .filter(|(_, (range, _))| range.contains(point))
            .map(|(_, (range, value))| (*range, value))
    }

    /// Iterates entries in ascending range order.
    pub fn iter(&self) -> impl Iterator<Item = (LogicalRange, &V)> + '_ {
        self.entries.values().map(|(range, value)| (*range, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.entries.values().map(|(_, value)| value)
    }

    /// Smallest range enclosing every entry.
    pub fn span(&self) -> Option<LogicalRange> {
        let (first, _) = self.entries.values().next()?;
        let (last, _) = self.entries.values().next_back()?;

        Some(LogicalRange::new_unchecked(first.start(), last.end()))
    }

    /// Whether any point of `range` is mapped.
    pub fn overlaps(&self, range: LogicalRange) -> bool {
        // entries are disjoint, so the last one starting before `range.end()`
        // reaches furthest
        self.entries
            .range(..range.end())
            .next_back()
            .is_some_and(|(_, (mapped, _))| mapped.overlaps(&range))
    }

    /// Whether every point of `range` is mapped.
    pub fn covers(&self, range: LogicalRange) -> bool {
        let mut cursor = range.start();
        let first = match self.entries.range(..=cursor).next_back() {
            Some((start, _)) => *start,
            None => return false,
        };

        for (start, (mapped, _)) in self.entries.range(first..) {
            if *start > cursor {
                return false;
            }

            cursor = cursor.max(mapped.end());
            if cursor >= range.end() {
                return true;
            }
        }

        false
    }
}

impl<V: Clone> RangeMap<V> {
    /// Maps `range` to `value`, overwriting the overlapped part of older entries.
    pub fn insert(&mut self, range: LogicalRange, value: V) {
        // an older entry starting before `range` may reach into it
        let straddling = self
            .entries
            .range(..range.start())
            .next_back()
            .filter(|(_, (older, _))| older.end() > range.start())
            .map(|(start, _)| *start);
        if let Some(start) = straddling {
            if let Some((older, older_value)) = self.entries.remove(&start) {
                if older.end() > range.end() {
                    self.entries.insert(
                        range.end(),
                        (
                            LogicalRange::new_unchecked(range.end(), older.end()),
                            older_value.clone(),
                        ),
                    );
                }
                self.entries.insert(
                    start,
                    (LogicalRange::new_unchecked(start, range.start()), older_value),
                );
            }
        }

        let covered = self
            .entries
            .range(range.start()..range.end())
            .map(|(start, _)| *start)
            .collect::<Vec<_>>();
        for start in covered {
            if let Some((older, older_value)) = self.entries.remove(&start) {
                if older.end() > range.end() {
                    self.entries.insert(
                        range.end(),
                        (
                            LogicalRange::new_unchecked(range.end(), older.end()),
                            older_value,
                        ),
                    );
                }
            }
        }

        self.entries.insert(range.start(), (range, value));
    }
}

impl<V: Clone> FromIterator<(LogicalRange, V)> for RangeMap<V> {
    fn from_iter<T: IntoIterator<Item = (LogicalRange, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (range, value) in iter {
            map.insert(range, value);
        }
        map
    }
}

#[derive(Serialize)]
struct EntryRef<'a, V> {
    range: LogicalRange,
    value: &'a V,
}

#[derive(Deserialize)]
struct Entry<V> {
    range: LogicalRange,
    value: V,
}

impl<V: Serialize> Serialize for RangeMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|(range, value)| EntryRef { range, value }))
    }
}

impl<'de, V> Deserialize<'de> for RangeMap<V>
where
    V: Deserialize<'de> + Clone,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<Entry<V>>::deserialize(deserializer)?;

        let mut map = Self::new();
        for Entry { range, value } in entries {
            if map.overlaps(range) {
                return Err(de::Error::custom(format_args!(
                    "logical range {range} overlaps an earlier entry"
                )));
            }
            map.insert(range, value);
        }

        Ok(map)
    }
}
