/// A sparse running sum of floating point values addressed by two keys, such as
/// (fuel, end use). Missing key pairs read as 0.0.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(transparent)]
#[serde(bound(
    serialize = "K1: Serialize + Hash + Eq, K2: Serialize + Hash + Eq",
    deserialize = "K1: Deserialize<'de> + Hash + Eq, K2: Deserialize<'de> + Hash + Eq"
))]
pub struct Dict2d<K1, K2> {
    store: IndexMap<K1, IndexMap<K2, f64>>,
}

impl<K1, K2> Default for Dict2d<K1, K2> {
    fn default() -> Self {
        Self {
            store: IndexMap::new(),
        }
    }
}

// IndexMap only compares when its keys are hashable, which a derive cannot express.
impl<K1: Hash + Eq, K2: Hash + Eq> PartialEq for Dict2d<K1, K2> {
    fn eq(&self, other: &Self) -> bool {
        self.store == other.store
    }
}

impl<K1: Hash + Eq + Copy, K2: Hash + Eq + Copy> Dict2d<K1, K2> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds `value` to the amount held at `(key1, key2)`, returning the new amount.
    pub fn add(&mut self, key1: K1, key2: K2, value: f64) -> f64 {
        let amount = self.store.entry(key1).or_default().entry(key2).or_insert(0.0);
        *amount += value;
        *amount
    }

    pub fn get(&self, key1: K1, key2: K2) -> f64 {
        self.store
            .get(&key1)
            .and_then(|inner| inner.get(&key2))
            .copied()
            .unwrap_or(0.0)
    }

    /// Totals keyed on the first key.
    pub fn sum_key1(&self) -> IndexMap<K1, f64> {
        self.store
            .iter()
            .map(|(key1, inner)| (*key1, inner.values().sum()))
            .collect()
    }

    /// Adds every value held by `other` into this accumulator.
    pub fn merge(&mut self, other: &Self) -> &mut Self {
        for (key1, inner) in &other.store {
            for (key2, value) in inner {
                self.add(*key1, *key2, *value);
            }
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (K1, K2, f64)> + '_ {
        self.store
            .iter()
            .flat_map(|(key1, inner)| inner.iter().map(move |(key2, value)| (*key1, *key2, *value)))
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{EndUse, Fuel};
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn fuel_use() -> Dict2d<Fuel, EndUse> {
        let mut fuel_use = Dict2d::new();
        fuel_use.add(Fuel::Propane, EndUse::SpaceHtg, 55.4);
        fuel_use.add(Fuel::Propane, EndUse::Cooking, 14.3);
        fuel_use.add(Fuel::Oil1, EndUse::SpaceHtg, 44.3);
        fuel_use.add(Fuel::Oil1, EndUse::Dhw, 8.1);
        fuel_use
    }

    #[rstest]
    fn should_accumulate_at_key_pair(mut fuel_use: Dict2d<Fuel, EndUse>) {
        assert_relative_eq!(fuel_use.add(Fuel::Oil1, EndUse::SpaceHtg, 0.7), 45.0, max_relative = 1e-12);
        assert_relative_eq!(fuel_use.get(Fuel::Oil1, EndUse::SpaceHtg), 45.0, max_relative = 1e-12);
    }

    #[rstest]
    fn should_read_missing_pairs_as_zero(fuel_use: Dict2d<Fuel, EndUse>) {
        assert_eq!(fuel_use.get(Fuel::Coal, EndUse::SpaceHtg), 0.0);
        assert_eq!(fuel_use.get(Fuel::Propane, EndUse::Dhw), 0.0);
        assert!(Dict2d::<Fuel, EndUse>::new().is_empty());
    }

    #[rstest]
    fn should_sum_over_first_key(fuel_use: Dict2d<Fuel, EndUse>) {
        let by_fuel = fuel_use.sum_key1();
        assert_relative_eq!(by_fuel[&Fuel::Propane], 69.7, max_relative = 1e-12);
        assert_relative_eq!(by_fuel[&Fuel::Oil1], 52.4, max_relative = 1e-12);
        assert_eq!(by_fuel.len(), 2);
    }

    #[rstest]
    fn should_merge_other_accumulator(fuel_use: Dict2d<Fuel, EndUse>) {
        let mut total = fuel_use.clone();
        total.merge(&fuel_use);
        assert_relative_eq!(total.get(Fuel::Propane, EndUse::Cooking), 28.6, max_relative = 1e-12);
        assert_eq!(total.iter().count(), 4);
    }

    #[rstest]
    fn should_serialize_as_nested_map(fuel_use: Dict2d<Fuel, EndUse>) {
        let json = serde_json::to_value(&fuel_use).unwrap();
        assert_eq!(json["propane"]["cooking"], 14.3);
        let round_trip: Dict2d<Fuel, EndUse> = serde_json::from_value(json).unwrap();
        assert_eq!(round_trip, fuel_use);
    }

    #[rstest]
    fn should_compare_equal_whatever_the_insertion_order(fuel_use: Dict2d<Fuel, EndUse>) {
        let mut reordered = Dict2d::new();
        reordered.add(Fuel::Oil1, EndUse::Dhw, 8.1);
        reordered.add(Fuel::Oil1, EndUse::SpaceHtg, 44.3);
        reordered.add(Fuel::Propane, EndUse::Cooking, 14.3);
        reordered.add(Fuel::Propane, EndUse::SpaceHtg, 55.4);
        assert_eq!(reordered, fuel_use);

        reordered.add(Fuel::Propane, EndUse::Cooking, 1.0);
        assert_ne!(reordered, fuel_use);
    }
}
