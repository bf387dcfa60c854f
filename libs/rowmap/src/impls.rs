use std::collections::{BTreeMap, HashMap};

use crate::shape::{Args, Mappable, NullableShape, Shape, TupleShape};
use crate::stream::ColumnStream;
use crate::value::{Decimal, RowMap, Timestamp, Value};

macro_rules! cast_mappable {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl Mappable for $ty {
                fn shape() -> Shape<Self> {
                    Shape::Cast(|value| match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(other),
                    })
                }
            }
        )+
    };
}

cast_mappable! {
    bool => Bool,
    u8 => UInt8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    Decimal => Decimal,
    Timestamp => Timestamp,
    String => Text,
}

impl Mappable for Vec<u8> {
    fn shape() -> Shape<Self> {
        Shape::Bytes(|bytes| bytes)
    }
}

impl Mappable for ColumnStream {
    fn shape() -> Shape<Self> {
        Shape::Stream(|stream| stream)
    }
}

impl Mappable for Value {
    fn shape() -> Shape<Self> {
        Shape::Dynamic(|value| value)
    }

    fn null_value() -> Option<Self> {
        Some(Value::Null)
    }
}

impl Mappable for RowMap {
    fn shape() -> Shape<Self> {
        Shape::Dictionary(|map| map)
    }
}

impl Mappable for HashMap<String, Value> {
    fn shape() -> Shape<Self> {
        Shape::Dictionary(|map| map.into_iter().collect())
    }
}

impl Mappable for BTreeMap<String, Value> {
    fn shape() -> Shape<Self> {
        Shape::Dictionary(|map| map.into_iter().collect())
    }
}

impl<U: Mappable> Mappable for Option<U> {
    fn shape() -> Shape<Self> {
        Shape::Nullable(NullableShape::new())
    }

    fn null_value() -> Option<Self> {
        Some(None)
    }
}

macro_rules! tuple_mappable {
    ($(($($name:ident $idx:tt),+)),+ $(,)?) => {
        $(
            impl<$($name: Mappable),+> Mappable for ($($name,)+) {
                fn shape() -> Shape<Self> {
                    Shape::Tuple(
                        TupleShape::new(|args: &mut Args| Ok(($(args.take::<$name>($idx)?,)+)))
                            $(.slot::<$name>())+,
                    )
                }
            }
        )+
    };
}

tuple_mappable! {
    (A 0),
    (A 0, B 1),
    (A 0, B 1, C 2),
    (A 0, B 1, C 2, D 3),
    (A 0, B 1, C 2, D 3, E 4),
    (A 0, B 1, C 2, D 3, E 4, F 5),
    (A 0, B 1, C 2, D 3, E 4, F 5, G 6),
    (A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7),
}
