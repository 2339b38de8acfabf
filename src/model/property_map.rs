//! PropertyMap: the key-value store on nodes and relationships.

use std::collections::HashMap;
use super::Value;

/// A map of property names to values.
pub type PropertyMap = HashMap<String, Value>;

/// Build a PropertyMap from (key, value) pairs, skipping `Null` values so
/// absent qualifiers never become stored properties.
pub fn props<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> PropertyMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .filter(|(_, v)| !v.is_null())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_props_skips_nulls() {
        let map = props([("a", Value::from(1)), ("b", Value::Null)]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
    }
}
