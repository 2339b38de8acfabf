//! Hash strings of the matcher stages.
//!
//! Each stage hashes a different selection of entity fields. Slot hashes
//! leave the value out so the modification matchers can pair entities
//! that sit in the same place but changed.

use crate::hash::digest;

use super::super::entity::{CsEntity, SubGraphEntity, SubGraphLeafEntity, ValueEntity};

const SEPARATOR: char = '|';

fn order(order: Option<i64>) -> String {
    order.map(|o| o.to_string()).unwrap_or_default()
}

fn join<S: AsRef<str>>(parts: &[S]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        out.push_str(part.as_ref());
    }
    digest(&out)
}

/// Stage 1: the whole entity.
pub fn cs_entity(entity: &CsEntity) -> String {
    let mut values: Vec<(String, &str)> = entity.values.iter().map(|v| (order(v.order), v.value.as_str())).collect();
    values.sort();
    let values: Vec<String> = values.into_iter().map(|(o, v)| format!("{o}:{v}")).collect();

    let key = entity.key();
    let entity_order = entity.entity_order.to_string();
    join(&[&key, &entity_order, &values.join(","), &entity.content])
}

/// Stage 2: one value of an entity.
pub fn cs_value(value: &ValueEntity) -> String {
    join(&[&value.key, &value.entity_order.to_string(), &order(value.order), &value.value])
}

/// Stage 3: the slot of one value of an entity.
pub fn cs_value_slot(value: &ValueEntity) -> String {
    join(&[&value.key, &value.entity_order.to_string(), &order(value.order)])
}

/// Stage 4: a record-level value.
pub fn flat_value(value: &ValueEntity) -> String {
    join(&[&value.predicate, &order(value.order), &value.value])
}

/// Stage 5: the slot of a record-level value.
pub fn flat_value_slot(value: &ValueEntity) -> String {
    join(&[&value.predicate, &order(value.order)])
}

pub fn sub_graph(entity: &SubGraphEntity) -> String {
    join(&[&entity.key, &entity.predicates, &order(entity.order), &entity.content])
}

pub fn sub_graph_leaf(leaf: &SubGraphLeafEntity) -> String {
    join(&[&leaf.key, &leaf.predicates, &order(leaf.order), &leaf.leaf_path, &leaf.content])
}

pub fn sub_graph_leaf_slot(leaf: &SubGraphLeafEntity) -> String {
    join(&[&leaf.key, &leaf.predicates, &order(leaf.order), &leaf.leaf_path])
}

/// Compared by the modification matchers once a slot is paired.
pub fn value_content(value: &ValueEntity) -> String {
    value.value.clone()
}

pub fn leaf_content(leaf: &SubGraphLeafEntity) -> String {
    leaf.content.clone()
}
