use std::any::Any;
use std::sync::Arc;

use crate::decoder::{Decoder, ErasedDecoder, TypeDescriptor};
use crate::error::MapError;
use crate::registry::Resolver;
use crate::row::RowSource;
use crate::strategy::MemberInfo;
use crate::stream::ColumnStream;
use crate::value::{RowMap, Value};

/// Type-erased decoded value, as stored in argument slots.
pub type Boxed = Box<dyn Any + Send>;

/// A type that can be decoded from a window of row fields.
///
/// Implemented for scalars, `Option`, `Vec<u8>`, [`Value`], string-keyed maps,
/// [`ColumnStream`] and tuples up to eight slots. User types implement it by
/// hand or through `#[derive(Mappable)]`.
pub trait Mappable: Sized + Send + 'static {
    /// Declares how values of this type are built from row fields.
    fn shape() -> Shape<Self>;

    /// Value returned when the window holds no data.
    ///
    /// `None` (the default) means the type has no null representation and an
    /// empty window is an `UnexpectedNull` error.
    fn null_value() -> Option<Self> {
        None
    }
}

/// Declared shape of a mappable type.
pub enum Shape<T> {
    /// Exact cast of one raw value. `Err` hands the value back on mismatch.
    Cast(fn(Value) -> Result<T, Value>),
    /// Discriminant lookup. `None` for an unknown discriminant.
    Enum(fn(i64) -> Option<T>),
    /// Owned copy of one binary field.
    Bytes(fn(Vec<u8>) -> T),
    /// Stream over one binary field.
    Stream(fn(ColumnStream) -> T),
    /// Raw value, or `Value::Object` for multi-field windows.
    Dynamic(fn(Value) -> T),
    /// Ordered map of the whole window.
    Dictionary(fn(RowMap) -> T),
    Tuple(TupleShape<T>),
    Composite(CompositeShape<T>),
    Nullable(NullableShape<T>),
}

pub(crate) type Binder = fn(&mut Resolver<'_>) -> Result<Arc<dyn ErasedDecoder>, MapError>;

pub(crate) type Setter<T> =
    Box<dyn Fn(&mut T, &dyn RowSource, usize) -> Result<(), MapError> + Send + Sync>;

pub(crate) type Materialize<T> =
    Box<dyn Fn(&dyn RowSource, usize, usize) -> Result<Option<T>, MapError> + Send + Sync>;

pub(crate) type Seed = Box<dyn Fn() -> Option<Boxed> + Send + Sync>;

fn bind_erased<M: Mappable>(resolver: &mut Resolver<'_>) -> Result<Arc<dyn ErasedDecoder>, MapError> {
    let decoder: Arc<dyn ErasedDecoder> = resolver.resolve::<M>()?;
    Ok(decoder)
}

// ---------------------------------------------------------------------------
// Composite (records and DTOs)
// ---------------------------------------------------------------------------

/// Properties and constructors of a struct-like type.
///
/// The classifier picks a positional record when there is exactly one
/// constructor matching the property set, and property assignment otherwise.
pub struct CompositeShape<T> {
    pub(crate) properties: Vec<Property<T>>,
    pub(crate) constructors: Vec<Constructor<T>>,
}

pub(crate) struct Property<T> {
    pub(crate) info: MemberInfo,
    pub(crate) bind: Box<dyn FnOnce(&mut Resolver<'_>) -> Result<Setter<T>, MapError> + Send>,
}

pub(crate) enum Constructor<T> {
    /// Parameterless constructor, members assigned afterwards.
    Factory(fn() -> T),
    Positional {
        params: Vec<CtorParam>,
        build: fn(&mut Args) -> Result<T, MapError>,
    },
}

impl<T: Mappable> CompositeShape<T> {
    pub fn new() -> Self {
        Self {
            properties: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// Settable member named `name` holding an `M`.
    pub fn property<M: Mappable>(mut self, name: &'static str, set: fn(&mut T, M)) -> Self {
        let bind = move |resolver: &mut Resolver<'_>| -> Result<Setter<T>, MapError> {
            let decoder: Arc<Decoder<M>> = resolver.resolve::<M>()?;
            let setter: Setter<T> = Box::new(
                move |target: &mut T, row: &dyn RowSource, index: usize| {
                    set(target, decoder.decode(row, index, 1)?);
                    Ok(())
                },
            );
            Ok(setter)
        };
        self.properties.push(Property {
            info: MemberInfo::of::<M>(name),
            bind: Box::new(bind),
        });
        self
    }

    /// Parameterless constructor (typically `Default::default`).
    pub fn factory(mut self, factory: fn() -> T) -> Self {
        self.constructors.push(Constructor::Factory(factory));
        self
    }

    /// Constructor taking `params` positionally. `build` pulls each argument
    /// out of [`Args`] by slot index.
    pub fn constructor(
        mut self,
        params: Vec<CtorParam>,
        build: fn(&mut Args) -> Result<T, MapError>,
    ) -> Self {
        self.constructors
            .push(Constructor::Positional { params, build });
        self
    }
}

impl<T: Mappable> Default for CompositeShape<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Constructor<T> {
    pub(crate) fn param_infos(&self) -> Vec<MemberInfo> {
        match self {
            Constructor::Factory(_) => Vec::new(),
            Constructor::Positional { params, .. } => {
                params.iter().map(|p| p.info.clone()).collect()
            }
        }
    }
}

/// One constructor parameter.
pub struct CtorParam {
    pub(crate) info: MemberInfo,
    pub(crate) bind: Binder,
    pub(crate) seed: Seed,
}

impl CtorParam {
    /// Parameter seeded with the type's own null value (`None` for options).
    pub fn of<M: Mappable>(name: &'static str) -> Self {
        Self {
            info: MemberInfo::of::<M>(name),
            bind: bind_erased::<M>,
            seed: Box::new(|| M::null_value().map(|v| Box::new(v) as Boxed)),
        }
    }

    /// Parameter seeded with `default()` when no field supplies it.
    pub fn with_default<M: Mappable>(name: &'static str, default: fn() -> M) -> Self {
        Self {
            info: MemberInfo::of::<M>(name),
            bind: bind_erased::<M>,
            seed: Box::new(move || Some(Box::new(default()) as Boxed)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }
}

/// Positional argument array handed to constructors.
pub struct Args {
    type_name: &'static str,
    slots: Vec<(&'static str, Option<Boxed>)>,
}

impl Args {
    pub(crate) fn new(type_name: &'static str, slots: Vec<(&'static str, Option<Boxed>)>) -> Self {
        Self { type_name, slots }
    }

    pub(crate) fn set(&mut self, slot: usize, value: Boxed) {
        if let Some(entry) = self.slots.get_mut(slot) {
            entry.1 = Some(value);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Move the argument out of `slot`.
    ///
    /// An empty slot (no field value and no default) is `UnexpectedNull`.
    pub fn take<M: 'static>(&mut self, slot: usize) -> Result<M, MapError> {
        let type_name = self.type_name;
        let (name, value) = self.slots.get_mut(slot).ok_or_else(|| {
            MapError::configuration(type_name, format!("no argument slot {slot}"))
        })?;
        let name = *name;
        let boxed = value.take().ok_or_else(|| MapError::UnexpectedNull {
            type_name,
            field: name.to_string(),
        })?;
        boxed.downcast::<M>().map(|v| *v).map_err(|_| {
            MapError::configuration(
                type_name,
                format!(
                    "argument '{name}' is not a {}",
                    std::any::type_name::<M>()
                ),
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Tuple
// ---------------------------------------------------------------------------

/// Ordered slots of a tuple-like type.
pub struct TupleShape<T> {
    pub(crate) slots: Vec<Binder>,
    pub(crate) assemble: fn(&mut Args) -> Result<T, MapError>,
}

impl<T: Mappable> TupleShape<T> {
    pub fn new(assemble: fn(&mut Args) -> Result<T, MapError>) -> Self {
        Self {
            slots: Vec::new(),
            assemble,
        }
    }

    /// Append a slot decoded as `M`.
    pub fn slot<M: Mappable>(mut self) -> Self {
        self.slots.push(bind_erased::<M>);
        self
    }
}

// ---------------------------------------------------------------------------
// Nullable wrapper
// ---------------------------------------------------------------------------

/// `Option<U>`: the shape of `U`, with a null representation.
pub struct NullableShape<T> {
    pub(crate) bind: fn(&mut Resolver<'_>) -> Result<(TypeDescriptor, Materialize<T>), MapError>,
}

impl<U: Mappable> NullableShape<Option<U>> {
    pub fn new() -> Self {
        Self {
            bind: bind_nullable::<U>,
        }
    }
}

impl<U: Mappable> Default for NullableShape<Option<U>> {
    fn default() -> Self {
        Self::new()
    }
}

fn bind_nullable<U: Mappable>(
    resolver: &mut Resolver<'_>,
) -> Result<(TypeDescriptor, Materialize<Option<U>>), MapError> {
    let inner: Arc<Decoder<U>> = resolver.resolve::<U>()?;
    let descriptor = inner.descriptor().clone();
    let materialize: Materialize<Option<U>> = Box::new(
        move |row: &dyn RowSource, index: usize, count: usize| {
            Ok(Some(inner.materialize(row, index, count)?))
        },
    );
    Ok((descriptor, materialize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_moves_each_argument_once() {
        let mut args = Args::new(
            "app::Pair",
            vec![("id", Some(Box::new(7i32) as Boxed)), ("name", None)],
        );

        assert_eq!(args.take::<i32>(0).unwrap(), 7);
        assert!(matches!(
            args.take::<i32>(0),
            Err(MapError::UnexpectedNull { field, .. }) if field == "id"
        ));
        assert!(matches!(
            args.take::<String>(1),
            Err(MapError::UnexpectedNull { field, .. }) if field == "name"
        ));
    }

    #[test]
    fn take_rejects_wrong_type_and_slot() {
        let mut args = Args::new("app::One", vec![("id", Some(Box::new(7i32) as Boxed))]);
        assert!(matches!(
            args.take::<i64>(0),
            Err(MapError::Configuration { .. })
        ));
        assert!(matches!(
            args.take::<i32>(5),
            Err(MapError::Configuration { .. })
        ));
    }

    #[test]
    fn params_seed_from_null_value_or_default() {
        let optional = CtorParam::of::<Option<String>>("nick");
        let seeded = (optional.seed)().unwrap();
        assert_eq!(*seeded.downcast::<Option<String>>().unwrap(), None);

        let required = CtorParam::of::<String>("name");
        assert!((required.seed)().is_none());

        let defaulted = CtorParam::with_default::<i32>("level", || 3);
        let seeded = (defaulted.seed)().unwrap();
        assert_eq!(*seeded.downcast::<i32>().unwrap(), 3);
        assert_eq!(defaulted.name(), "level");
    }
}
