use std::any::TypeId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::error::MapError;
use crate::normalize::normalize_name;
use crate::registry::Resolver;
use crate::row::RowSource;
use crate::shape::{
    Args, Boxed, CompositeShape, Constructor, CtorParam, Mappable, Materialize, Seed, Setter,
    Shape, TupleShape,
};
use crate::strategy::{MemberInfo, ShapeKind, Strategy, TypeInfo, classify};
use crate::stream::ColumnStream;
use crate::value::{RowMap, Value};
use crate::window::{TupleWindow, infer_width};

/// Resolved facts about a target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub type_name: &'static str,
    pub type_id: TypeId,
    /// Name of the type with any `Option` wrapper stripped.
    pub core_type_name: &'static str,
    pub nullable: bool,
    pub strategy: Strategy,
    /// Fields consumed per value. `None` = variable width.
    pub field_count: Option<usize>,
}

/// Decoder for one target type. Immutable, shared through the registry.
pub struct Decoder<T> {
    descriptor: TypeDescriptor,
    plan: Plan<T>,
}

enum Plan<T> {
    Cast(fn(Value) -> Result<T, Value>),
    Enum(fn(i64) -> Option<T>),
    Bytes(fn(Vec<u8>) -> T),
    Stream(fn(ColumnStream) -> T),
    Dynamic(fn(Value) -> T),
    Dictionary(fn(RowMap) -> T),
    Tuple(TuplePlan<T>),
    Record(RecordPlan<T>),
    Dto(DtoPlan<T>),
    Nullable(Materialize<T>),
}

struct TuplePlan<T> {
    slots: Vec<Arc<dyn ErasedDecoder>>,
    assemble: fn(&mut Args) -> Result<T, MapError>,
    terminator: Option<Arc<str>>,
}

struct RecordSlot {
    name: &'static str,
    decoder: Arc<dyn ErasedDecoder>,
    seed: Seed,
}

type Build<T> = Box<dyn Fn(&mut Args) -> Result<T, MapError> + Send + Sync>;

struct RecordPlan<T> {
    members: HashMap<String, usize>,
    slots: Vec<RecordSlot>,
    build: Build<T>,
}

struct DtoPlan<T> {
    members: HashMap<String, usize>,
    setters: Vec<Setter<T>>,
    factory: fn() -> T,
}

/// Object-safe view of a [`Decoder`], for slots whose type is only known at
/// resolution time.
pub trait ErasedDecoder: Send + Sync {
    fn descriptor(&self) -> &TypeDescriptor;

    fn decode_any(
        &self,
        row: &dyn RowSource,
        index: usize,
        count: usize,
    ) -> Result<Boxed, MapError>;
}

impl<T: Mappable> ErasedDecoder for Decoder<T> {
    fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    fn decode_any(
        &self,
        row: &dyn RowSource,
        index: usize,
        count: usize,
    ) -> Result<Boxed, MapError> {
        Ok(Box::new(self.decode(row, index, count)?))
    }
}

impl<T: Mappable> Decoder<T> {
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Fixed number of fields a value consumes, `None` for variable width.
    pub fn field_count(&self) -> Option<usize> {
        self.descriptor.field_count
    }

    /// Decode one value from the window `[index, index + count)`.
    pub fn decode(&self, row: &dyn RowSource, index: usize, count: usize) -> Result<T, MapError> {
        self.check_window(row, index, count)?;
        match self.materialize(row, index, count)? {
            Some(value) => Ok(value),
            None => T::null_value().ok_or_else(|| self.unexpected_null(row, index, count)),
        }
    }

    fn check_window(&self, row: &dyn RowSource, index: usize, count: usize) -> Result<(), MapError> {
        let type_name = self.descriptor.type_name;
        let row_len = row.field_count();
        if index.checked_add(count).is_none_or(|end| end > row_len) {
            return Err(MapError::FieldOutOfRange {
                type_name,
                index,
                count,
                row_len,
            });
        }
        // Tuples measure their window without terminator columns.
        if self.descriptor.strategy == Strategy::Tuple {
            return Ok(());
        }
        match self.descriptor.field_count {
            Some(expected) if expected != count => Err(MapError::FieldCountMismatch {
                type_name,
                expected,
                actual: count,
            }),
            _ => Ok(()),
        }
    }

    fn unexpected_null(&self, row: &dyn RowSource, index: usize, count: usize) -> MapError {
        let field = if count == 1 {
            row.field_name(index).to_string()
        } else {
            format!("all {count} fields from index {index}")
        };
        MapError::UnexpectedNull {
            type_name: self.descriptor.type_name,
            field,
        }
    }

    fn cast_failure(&self, row: &dyn RowSource, index: usize, source_type: String) -> MapError {
        MapError::CastFailure {
            type_name: self.descriptor.type_name,
            source_type,
            field: row.field_name(index).to_string(),
            index,
        }
    }

    /// Decode without the window check. `None` is the null signal: the
    /// window held no data and the caller decides what that becomes.
    pub(crate) fn materialize(
        &self,
        row: &dyn RowSource,
        index: usize,
        count: usize,
    ) -> Result<Option<T>, MapError> {
        match &self.plan {
            Plan::Cast(cast) => {
                let Some(raw) = read_single(row, index)? else {
                    return Ok(None);
                };
                let source = raw.type_label();
                cast(raw)
                    .map(Some)
                    .map_err(|_| self.cast_failure(row, index, source.to_string()))
            }
            Plan::Enum(from) => {
                let Some(raw) = read_single(row, index)? else {
                    return Ok(None);
                };
                let Some(n) = raw.as_i64() else {
                    return Err(self.cast_failure(row, index, raw.type_label().to_string()));
                };
                from(n).map(Some).ok_or_else(|| {
                    self.cast_failure(row, index, format!("{}({n})", raw.type_label()))
                })
            }
            Plan::Bytes(wrap) => {
                if row.is_null(index) {
                    return Ok(None);
                }
                Ok(Some(wrap(read_bytes(row, index)?)))
            }
            Plan::Stream(wrap) => {
                if row.is_null(index) {
                    return Ok(None);
                }
                let stream = match row.open_stream(index)? {
                    Some(live) => ColumnStream::live(live),
                    None => ColumnStream::buffered(read_bytes(row, index)?),
                };
                Ok(Some(wrap(stream)))
            }
            Plan::Dynamic(wrap) => {
                if count == 1 {
                    return Ok(read_single(row, index)?.map(wrap));
                }
                Ok(collect_fields(row, index, count)?.map(|bag| wrap(Value::Object(bag))))
            }
            Plan::Dictionary(wrap) => Ok(collect_fields(row, index, count)?.map(wrap)),
            Plan::Tuple(plan) => plan.decode(&self.descriptor, row, index, count).map(Some),
            Plan::Record(plan) => plan.decode(self.descriptor.type_name, row, index, count),
            Plan::Dto(plan) => plan.decode(self.descriptor.type_name, row, index, count),
            Plan::Nullable(materialize) => materialize(row, index, count),
        }
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    pub(crate) fn build(shape: Shape<T>, resolver: &mut Resolver<'_>) -> Result<Self, MapError> {
        let type_name = std::any::type_name::<T>();
        let type_id = TypeId::of::<T>();
        let classify_as = |kind: ShapeKind<'_>| classify(&TypeInfo { type_id, kind });

        let (strategy, field_count, plan) = match shape {
            Shape::Cast(f) => (classify_as(ShapeKind::Cast), Some(1), Plan::Cast(f)),
            Shape::Enum(f) => (classify_as(ShapeKind::Enum), Some(1), Plan::Enum(f)),
            Shape::Bytes(f) => (classify_as(ShapeKind::Bytes), Some(1), Plan::Bytes(f)),
            Shape::Stream(f) => (classify_as(ShapeKind::Stream), Some(1), Plan::Stream(f)),
            Shape::Dynamic(f) => (classify_as(ShapeKind::Dynamic), None, Plan::Dynamic(f)),
            Shape::Dictionary(f) => (classify_as(ShapeKind::Dictionary), None, Plan::Dictionary(f)),
            Shape::Tuple(tuple) => {
                let plan = TuplePlan::bind(tuple, resolver)?;
                let field_count = plan
                    .slots
                    .iter()
                    .map(|slot| slot.descriptor().field_count)
                    .sum::<Option<usize>>();
                (classify_as(ShapeKind::Tuple), field_count, Plan::Tuple(plan))
            }
            Shape::Composite(composite) => {
                let (strategy, plan) = bind_composite(type_name, composite, resolver)?;
                (strategy, None, plan)
            }
            Shape::Nullable(nullable) => {
                let (inner, materialize) = (nullable.bind)(resolver)?;
                return Ok(Self {
                    descriptor: TypeDescriptor {
                        type_name,
                        type_id,
                        core_type_name: inner.core_type_name,
                        nullable: true,
                        strategy: inner.strategy,
                        field_count: inner.field_count,
                    },
                    plan: Plan::Nullable(materialize),
                });
            }
        };

        if strategy != plan.strategy() {
            return Err(MapError::configuration(
                type_name,
                format!(
                    "declared shape decodes as {:?} but the type classifies as {strategy:?}",
                    plan.strategy()
                ),
            ));
        }

        Ok(Self {
            descriptor: TypeDescriptor {
                type_name,
                type_id,
                core_type_name: type_name,
                nullable: T::null_value().is_some(),
                strategy,
                field_count,
            },
            plan,
        })
    }
}

impl<T> Plan<T> {
    fn strategy(&self) -> Strategy {
        match self {
            Plan::Cast(_) => Strategy::CastValue,
            Plan::Enum(_) => Strategy::Enum,
            Plan::Bytes(_) => Strategy::ByteArray,
            Plan::Stream(_) => Strategy::Stream,
            Plan::Dynamic(_) => Strategy::Dynamic,
            Plan::Dictionary(_) => Strategy::Dictionary,
            Plan::Tuple(_) => Strategy::Tuple,
            Plan::Record(_) => Strategy::PositionalRecord,
            Plan::Dto(_) => Strategy::DtoProperties,
            // Never classified directly: the wrapper reports its inner strategy.
            Plan::Nullable(_) => Strategy::CastValue,
        }
    }
}

fn read_single(row: &dyn RowSource, index: usize) -> Result<Option<Value>, MapError> {
    if row.is_null(index) {
        return Ok(None);
    }
    let raw = row.raw_value(index)?;
    Ok((!raw.is_null()).then_some(raw))
}

/// Length probe, then fetch into a buffer of exactly that size.
fn read_bytes(row: &dyn RowSource, index: usize) -> Result<Vec<u8>, MapError> {
    let len = row.get_bytes(index, 0, None)?;
    let mut buf = vec![0u8; len];
    let copied = row.get_bytes(index, 0, Some(&mut buf))?;
    buf.truncate(copied);
    Ok(buf)
}

/// Every field of the window by name. `None` when all of them are null.
fn collect_fields(
    row: &dyn RowSource,
    index: usize,
    count: usize,
) -> Result<Option<RowMap>, MapError> {
    let mut map = RowMap::with_capacity(count);
    let mut any = false;
    for i in index..index + count {
        let value = match read_single(row, i)? {
            Some(value) => {
                any = true;
                value
            }
            None => Value::Null,
        };
        map.insert(row.field_name(i), value);
    }
    Ok(any.then_some(map))
}

/// Normalized member name → position. Duplicates are a configuration error.
fn member_map<'a>(
    type_name: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<HashMap<String, usize>, MapError> {
    let mut members = HashMap::new();
    for (position, name) in names.enumerate() {
        match members.entry(normalize_name(name)) {
            Entry::Vacant(slot) => {
                slot.insert(position);
            }
            Entry::Occupied(slot) => {
                return Err(MapError::configuration(
                    type_name,
                    format!("member '{name}' collides with another member as '{}'", slot.key()),
                ));
            }
        }
    }
    Ok(members)
}

fn lookup_member(
    type_name: &'static str,
    members: &HashMap<String, usize>,
    row: &dyn RowSource,
    index: usize,
) -> Result<usize, MapError> {
    let field = row.field_name(index);
    members
        .get(&normalize_name(field))
        .copied()
        .ok_or_else(|| MapError::UnknownField {
            type_name,
            field: field.to_string(),
            index,
        })
}

fn bind_composite<T: Mappable>(
    type_name: &'static str,
    shape: CompositeShape<T>,
    resolver: &mut Resolver<'_>,
) -> Result<(Strategy, Plan<T>), MapError> {
    let properties: Vec<MemberInfo> = shape.properties.iter().map(|p| p.info.clone()).collect();
    let params: Vec<Vec<MemberInfo>> = shape
        .constructors
        .iter()
        .map(Constructor::param_infos)
        .collect();
    let constructors: Vec<&[MemberInfo]> = params.iter().map(Vec::as_slice).collect();
    let strategy = classify(&TypeInfo {
        type_id: TypeId::of::<T>(),
        kind: ShapeKind::Composite {
            properties: &properties,
            constructors: &constructors,
        },
    });

    let plan = match strategy {
        Strategy::PositionalRecord => {
            let Some(constructor) = shape.constructors.into_iter().next() else {
                return Err(MapError::configuration(type_name, "no constructor"));
            };
            Plan::Record(RecordPlan::bind(type_name, constructor, resolver)?)
        }
        _ => {
            let factory = shape
                .constructors
                .iter()
                .find_map(|c| match c {
                    Constructor::Factory(f) => Some(*f),
                    Constructor::Positional { .. } => None,
                })
                .ok_or_else(|| {
                    MapError::configuration(
                        type_name,
                        "no constructor matches the properties and there is no parameterless factory",
                    )
                })?;
            let members = member_map(type_name, properties.iter().map(|p| p.name))?;
            let setters = shape
                .properties
                .into_iter()
                .map(|p| (p.bind)(resolver))
                .collect::<Result<Vec<_>, _>>()?;
            Plan::Dto(DtoPlan {
                members,
                setters,
                factory,
            })
        }
    };
    Ok((strategy, plan))
}

// ---------------------------------------------------------------------------
// Composite decoding
// ---------------------------------------------------------------------------

impl<T: Mappable> DtoPlan<T> {
    fn decode(
        &self,
        type_name: &'static str,
        row: &dyn RowSource,
        index: usize,
        count: usize,
    ) -> Result<Option<T>, MapError> {
        let mut target = (self.factory)();
        let mut any = false;
        for i in index..index + count {
            let member = lookup_member(type_name, &self.members, row, i)?;
            if row.is_null(i) {
                continue;
            }
            (self.setters[member])(&mut target, row, i)?;
            any = true;
        }
        Ok(any.then_some(target))
    }
}

impl<T: Mappable> RecordPlan<T> {
    fn bind(
        type_name: &'static str,
        constructor: Constructor<T>,
        resolver: &mut Resolver<'_>,
    ) -> Result<Self, MapError> {
        let (params, build): (Vec<CtorParam>, Build<T>) = match constructor {
            Constructor::Positional { params, build } => {
                let build: Build<T> = Box::new(build);
                (params, build)
            }
            Constructor::Factory(factory) => {
                let build: Build<T> = Box::new(move |_: &mut Args| Ok::<T, MapError>(factory()));
                (Vec::new(), build)
            }
        };
        let members = member_map(type_name, params.iter().map(|p| p.info.name))?;
        let slots = params
            .into_iter()
            .map(|p| {
                Ok(RecordSlot {
                    name: p.info.name,
                    decoder: (p.bind)(resolver)?,
                    seed: p.seed,
                })
            })
            .collect::<Result<Vec<_>, MapError>>()?;
        Ok(Self {
            members,
            slots,
            build,
        })
    }

    fn decode(
        &self,
        type_name: &'static str,
        row: &dyn RowSource,
        index: usize,
        count: usize,
    ) -> Result<Option<T>, MapError> {
        let mut args = Args::new(
            type_name,
            self.slots.iter().map(|s| (s.name, (s.seed)())).collect(),
        );
        let mut any = false;
        for i in index..index + count {
            let slot = lookup_member(type_name, &self.members, row, i)?;
            if row.is_null(i) {
                continue;
            }
            args.set(slot, self.slots[slot].decoder.decode_any(row, i, 1)?);
            any = true;
        }
        if !any {
            return Ok(None);
        }
        (self.build)(&mut args).map(Some)
    }
}

// ---------------------------------------------------------------------------
// Tuple decoding
// ---------------------------------------------------------------------------

const SLOT_NAMES: [&str; 8] = [
    "item1", "item2", "item3", "item4", "item5", "item6", "item7", "item8",
];

impl<T: Mappable> TuplePlan<T> {
    fn bind(shape: TupleShape<T>, resolver: &mut Resolver<'_>) -> Result<Self, MapError> {
        let slots = shape
            .slots
            .iter()
            .map(|bind| bind(resolver))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            slots,
            assemble: shape.assemble,
            terminator: resolver.terminator(),
        })
    }

    fn decode(
        &self,
        descriptor: &TypeDescriptor,
        row: &dyn RowSource,
        index: usize,
        count: usize,
    ) -> Result<T, MapError> {
        let type_name = descriptor.type_name;
        // A fully fixed tuple that already fits the raw window has no separators.
        let terminator = match descriptor.field_count {
            Some(width) if width == count => None,
            _ => self.terminator.as_deref(),
        };
        let window = TupleWindow::scan(row, index, count, terminator);
        let total = window.len();
        if let Some(expected) = descriptor.field_count {
            if expected != total {
                return Err(MapError::FieldCountMismatch {
                    type_name,
                    expected,
                    actual: total,
                });
            }
        }

        let widths: Vec<Option<usize>> = self
            .slots
            .iter()
            .map(|slot| slot.descriptor().field_count)
            .collect();
        let mut values = Vec::with_capacity(self.slots.len());
        let mut cur = 0;
        for (k, slot) in self.slots.iter().enumerate() {
            let width = match widths[k] {
                Some(w) => w,
                None => infer_width(type_name, &widths, k, cur, &window)?,
            };
            if cur + width > total {
                return Err(MapError::FieldCountMismatch {
                    type_name,
                    expected: cur + width,
                    actual: total,
                });
            }
            let (start, len) = window.span(cur, width);
            let name = SLOT_NAMES.get(k).copied().unwrap_or("item");
            values.push((name, Some(slot.decode_any(row, start, len)?)));
            cur += width;
        }
        if cur != total {
            return Err(MapError::FieldCountMismatch {
                type_name,
                expected: cur,
                actual: total,
            });
        }

        let mut args = Args::new(type_name, values);
        (self.assemble)(&mut args)
    }
}
