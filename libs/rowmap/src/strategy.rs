use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use crate::normalize::normalize_name;
use crate::stream::ColumnStream;
use crate::value::{Decimal, RowMap, Timestamp, Value};

/// Decoding algorithm selected for a target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Single field, exact type cast.
    CastValue,
    /// Single integral field converted to a discriminant.
    Enum,
    /// Single binary field copied into an owned buffer.
    ByteArray,
    /// Single binary field exposed as a read-only stream.
    Stream,
    /// Raw value (one field) or open property bag (several fields).
    Dynamic,
    /// Concrete string-keyed map of the window.
    Dictionary,
    /// Positional heterogeneous slots.
    Tuple,
    /// Values collected into constructor arguments, constructed once.
    PositionalRecord,
    /// Instance created up front, members assigned one by one.
    DtoProperties,
}

/// Name and value type of a property or constructor parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub name: &'static str,
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl MemberInfo {
    pub fn of<M: 'static>(name: &'static str) -> Self {
        Self {
            name,
            type_id: TypeId::of::<M>(),
            type_name: std::any::type_name::<M>(),
        }
    }
}

/// Structural kind of a declared shape, as seen by [`classify`].
#[derive(Debug, Clone, Copy)]
pub enum ShapeKind<'a> {
    Cast,
    Bytes,
    Stream,
    Dynamic,
    Dictionary,
    Tuple,
    Enum,
    Composite {
        properties: &'a [MemberInfo],
        /// Parameter lists of the public constructors. A parameterless
        /// factory is an empty list.
        constructors: &'a [&'a [MemberInfo]],
    },
}

/// What the classifier knows about a type.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo<'a> {
    pub type_id: TypeId,
    pub kind: ShapeKind<'a>,
}

static BUILTIN: LazyLock<HashMap<TypeId, Strategy>> = LazyLock::new(|| {
    HashMap::from([
        (TypeId::of::<bool>(), Strategy::CastValue),
        (TypeId::of::<u8>(), Strategy::CastValue),
        (TypeId::of::<i16>(), Strategy::CastValue),
        (TypeId::of::<i32>(), Strategy::CastValue),
        (TypeId::of::<i64>(), Strategy::CastValue),
        (TypeId::of::<f32>(), Strategy::CastValue),
        (TypeId::of::<f64>(), Strategy::CastValue),
        (TypeId::of::<String>(), Strategy::CastValue),
        (TypeId::of::<Decimal>(), Strategy::CastValue),
        (TypeId::of::<Timestamp>(), Strategy::CastValue),
        (TypeId::of::<Vec<u8>>(), Strategy::ByteArray),
        (TypeId::of::<ColumnStream>(), Strategy::Stream),
        (TypeId::of::<Value>(), Strategy::Dynamic),
        (TypeId::of::<RowMap>(), Strategy::Dictionary),
        (TypeId::of::<HashMap<String, Value>>(), Strategy::Dictionary),
        (TypeId::of::<BTreeMap<String, Value>>(), Strategy::Dictionary),
    ])
});

/// Strategy of a built-in type, if `type_id` is one.
pub fn builtin_strategy(type_id: TypeId) -> Option<Strategy> {
    BUILTIN.get(&type_id).copied()
}

/// Select the decoding strategy for a type. First match wins:
///
/// 1. built-in table, then marker shapes (cast, bytes, stream, dynamic, dictionary)
/// 2. tuple
/// 3. enum
/// 4. positional record: exactly one constructor, same arity as the property
///    set, every parameter matching a property by normalized name and type
/// 5. DTO properties
pub fn classify(info: &TypeInfo<'_>) -> Strategy {
    if let Some(strategy) = builtin_strategy(info.type_id) {
        return strategy;
    }
    match info.kind {
        ShapeKind::Cast => Strategy::CastValue,
        ShapeKind::Bytes => Strategy::ByteArray,
        ShapeKind::Stream => Strategy::Stream,
        ShapeKind::Dynamic => Strategy::Dynamic,
        ShapeKind::Dictionary => Strategy::Dictionary,
        ShapeKind::Tuple => Strategy::Tuple,
        ShapeKind::Enum => Strategy::Enum,
        ShapeKind::Composite {
            properties,
            constructors,
        } => {
            if is_positional_record(properties, constructors) {
                Strategy::PositionalRecord
            } else {
                Strategy::DtoProperties
            }
        }
    }
}

fn is_positional_record(properties: &[MemberInfo], constructors: &[&[MemberInfo]]) -> bool {
    let [params] = constructors else {
        return false;
    };
    params.len() == properties.len()
        && params.iter().all(|param| {
            let key = normalize_name(param.name);
            properties
                .iter()
                .any(|prop| prop.type_id == param.type_id && normalize_name(prop.name) == key)
        })
}
