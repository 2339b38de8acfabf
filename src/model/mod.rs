//! # Property Graph Model
//!
//! Plain DTOs for the property graph that GDM statements are stored in.
//! No I/O, no state, no async.

pub mod node;
pub mod relationship;
pub mod path;
pub mod value;
pub mod property_map;
pub mod node_type;
pub mod keys;

pub use node::{Node, NodeId};
pub use relationship::{Relationship, RelId, Direction};
pub use path::Path;
pub use value::Value;
pub use property_map::{PropertyMap, props};
pub use node_type::NodeType;
