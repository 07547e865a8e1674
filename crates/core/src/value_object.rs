//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two instances
/// with the same attribute values are the same value. `Money` is the canonical
/// example here; entities (orders, shipments) carry identity instead.
///
/// To "modify" a value object, construct a new one. The bounds keep value
/// objects cheap to copy, comparable, and debuggable.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
