use crate::value::{Decimal, RowMap, Timestamp, Value};

/// Named value bound to a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl ToValue) -> Self {
        Self {
            name: name.into(),
            value: value.to_value(),
        }
    }
}

/// Shallow encoding of one value.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

macro_rules! to_value_copy {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::from(*self)
                }
            }
        )+
    };
}

to_value_copy!(bool, u8, i16, i32, i64, f32, f64, Decimal, Timestamp);

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

/// A row that can be written as statement parameters, in column order.
pub trait ToParams {
    fn to_params(&self) -> Vec<Parameter>;

    fn param_count(&self) -> usize {
        self.to_params().len()
    }
}

impl ToParams for RowMap {
    fn to_params(&self) -> Vec<Parameter> {
        self.iter()
            .map(|(name, value)| Parameter::new(name, value))
            .collect()
    }

    fn param_count(&self) -> usize {
        self.len()
    }
}

impl<T: ToParams + ?Sized> ToParams for &T {
    fn to_params(&self) -> Vec<Parameter> {
        (**self).to_params()
    }

    fn param_count(&self) -> usize {
        (**self).param_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_encode_as_null() {
        assert_eq!(Some(3i32).to_value(), Value::Int32(3));
        assert_eq!(None::<String>.to_value(), Value::Null);
        assert_eq!("x".to_value(), Value::Text("x".into()));
        assert_eq!(Decimal::new(125, 2).to_value(), Value::Decimal(Decimal::new(125, 2)));
    }

    #[test]
    fn row_map_params_keep_column_order() {
        let row: RowMap = [("b", Value::Int32(1)), ("a", Value::Null)]
            .into_iter()
            .collect();
        let params = row.to_params();
        assert_eq!(row.param_count(), 2);
        assert_eq!(
            params,
            vec![
                Parameter::new("b", 1i32),
                Parameter::new("a", Value::Null),
            ]
        );
    }
}
