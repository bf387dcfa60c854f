use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::RowMapConfig;
use crate::decoder::{Decoder, ErasedDecoder, TypeDescriptor};
use crate::error::MapError;
use crate::row::RowSource;
use crate::shape::{Boxed, Mappable};

/// Default name of tuple terminator columns.
pub const DEFAULT_TERMINATOR: &str = "NULL";

struct Entry {
    typed: Arc<dyn Any + Send + Sync>,
    erased: Arc<dyn ErasedDecoder>,
}

/// Decoders by target type, built on first request and kept for the
/// registry's lifetime.
///
/// Owned by the caller and shared by reference. Concurrent first use of a
/// type may build its decoder more than once; the first one stored wins and
/// every caller gets that instance.
pub struct DecoderRegistry {
    terminator: Option<Arc<str>>,
    decoders: RwLock<HashMap<TypeId, Entry>>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self {
            terminator: Some(Arc::from(DEFAULT_TERMINATOR)),
            decoders: RwLock::new(HashMap::new()),
        }
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("terminator", &self.terminator)
            .field("decoders", &self.len())
            .finish()
    }
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &RowMapConfig) -> Self {
        Self {
            terminator: config.terminator().map(Arc::from),
            decoders: RwLock::new(HashMap::new()),
        }
    }

    /// Decoder for `T`, resolving it (and every type it contains) on first use.
    pub fn decoder<T: Mappable>(&self) -> Result<Arc<Decoder<T>>, MapError> {
        Resolver::new(self).resolve::<T>()
    }

    pub fn decode<T: Mappable>(
        &self,
        row: &dyn RowSource,
        index: usize,
        count: usize,
    ) -> Result<T, MapError> {
        self.decoder::<T>()?.decode(row, index, count)
    }

    /// Decode `T` from every field of the row.
    pub fn decode_row<T: Mappable>(&self, row: &dyn RowSource) -> Result<T, MapError> {
        self.decode(row, 0, row.field_count())
    }

    /// Decode a type known only by id. The type must have been resolved
    /// before, through [`register`](Self::register) or any typed call.
    pub fn decode_dynamic(
        &self,
        type_id: TypeId,
        row: &dyn RowSource,
        index: usize,
        count: usize,
    ) -> Result<Boxed, MapError> {
        let decoder = self
            .read()
            .get(&type_id)
            .map(|entry| Arc::clone(&entry.erased))
            .ok_or_else(|| {
                MapError::configuration(
                    "<unregistered>",
                    format!("no decoder registered for {type_id:?}"),
                )
            })?;
        decoder.decode_any(row, index, count)
    }

    /// Resolve `T` up front and return its descriptor.
    pub fn register<T: Mappable>(&self) -> Result<TypeDescriptor, MapError> {
        Ok(self.decoder::<T>()?.descriptor().clone())
    }

    pub fn field_count<T: Mappable>(&self) -> Result<Option<usize>, MapError> {
        Ok(self.decoder::<T>()?.field_count())
    }

    pub fn descriptor_of(&self, type_id: TypeId) -> Option<TypeDescriptor> {
        self.read()
            .get(&type_id)
            .map(|entry| entry.erased.descriptor().clone())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn lookup<T: Mappable>(&self) -> Option<Arc<Decoder<T>>> {
        let typed = Arc::clone(&self.read().get(&TypeId::of::<T>())?.typed);
        typed.downcast::<Decoder<T>>().ok()
    }

    fn store<T: Mappable>(&self, decoder: Decoder<T>) -> Result<Arc<Decoder<T>>, MapError> {
        let decoder = Arc::new(decoder);
        let typed = {
            let mut guard = self.write();
            let entry = guard.entry(TypeId::of::<T>()).or_insert_with(|| {
                let descriptor = decoder.descriptor();
                tracing::debug!(
                    type_name = descriptor.type_name,
                    strategy = ?descriptor.strategy,
                    field_count = ?descriptor.field_count,
                    "decoder resolved"
                );
                Entry {
                    typed: Arc::clone(&decoder) as Arc<dyn Any + Send + Sync>,
                    erased: Arc::clone(&decoder) as Arc<dyn ErasedDecoder>,
                }
            });
            Arc::clone(&entry.typed)
        };
        typed.downcast::<Decoder<T>>().map_err(|_| {
            MapError::configuration(
                std::any::type_name::<T>(),
                "registry entry holds a decoder of another type",
            )
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeId, Entry>> {
        match self.decoders.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("decoder registry read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, Entry>> {
        match self.decoders.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("decoder registry write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// One resolution pass. Tracks the types being built so a type that
/// contains itself fails instead of recursing forever.
pub(crate) struct Resolver<'r> {
    registry: &'r DecoderRegistry,
    pending: Vec<(TypeId, &'static str)>,
}

impl<'r> Resolver<'r> {
    fn new(registry: &'r DecoderRegistry) -> Self {
        Self {
            registry,
            pending: Vec::new(),
        }
    }

    pub(crate) fn resolve<T: Mappable>(&mut self) -> Result<Arc<Decoder<T>>, MapError> {
        if let Some(decoder) = self.registry.lookup::<T>() {
            return Ok(decoder);
        }

        let type_id = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();
        if let Some(start) = self.pending.iter().position(|(id, _)| *id == type_id) {
            let path = self.pending[start..]
                .iter()
                .map(|(_, name)| *name)
                .chain(std::iter::once(type_name))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(MapError::CyclicType { type_name, path });
        }

        self.pending.push((type_id, type_name));
        let built = Decoder::build(T::shape(), self);
        self.pending.pop();
        self.registry.store(built?)
    }

    pub(crate) fn terminator(&self) -> Option<Arc<str>> {
        self.registry.terminator.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::MemoryRow;
    use crate::shape::{CompositeShape, Shape};
    use crate::strategy::Strategy;
    use crate::value::Value;

    struct Parent {
        child: Option<Box<Child>>,
    }

    struct Child {
        parent: Option<Box<Parent>>,
    }

    impl Mappable for Box<Child> {
        fn shape() -> Shape<Self> {
            Shape::Composite(
                CompositeShape::new()
                    .factory(|| Box::new(Child { parent: None }))
                    .property::<Parent>("parent", |this: &mut Self, v: Parent| {
                        this.parent = Some(Box::new(v));
                    }),
            )
        }
    }

    impl Mappable for Parent {
        fn shape() -> Shape<Self> {
            Shape::Composite(
                CompositeShape::new()
                    .factory(|| Parent { child: None })
                    .property::<Box<Child>>("child", |this: &mut Self, v: Box<Child>| {
                        this.child = Some(v);
                    }),
            )
        }
    }

    #[test]
    fn decoders_are_built_once() {
        let registry = DecoderRegistry::new();
        let first = registry.decoder::<i32>().unwrap();
        let second = registry.decoder::<i32>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concurrent_first_use_shares_one_instance() {
        let registry = DecoderRegistry::new();
        let decoders: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| registry.decoder::<(i32, Option<String>)>().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for decoder in &decoders[1..] {
            assert!(Arc::ptr_eq(&decoders[0], decoder));
        }
    }

    #[test]
    fn children_resolve_before_parent() {
        let registry = DecoderRegistry::new();
        registry.decoder::<(i64, Option<String>)>().unwrap();
        for id in [
            TypeId::of::<i64>(),
            TypeId::of::<String>(),
            TypeId::of::<Option<String>>(),
            TypeId::of::<(i64, Option<String>)>(),
        ] {
            assert!(registry.descriptor_of(id).is_some());
        }
    }

    #[test]
    fn cyclic_types_are_reported() {
        let registry = DecoderRegistry::new();
        let err = registry.decoder::<Parent>().err().unwrap();
        match err {
            MapError::CyclicType { path, .. } => {
                assert!(path.contains("Parent"), "{path}");
                assert!(path.contains("Child"), "{path}");
                assert_eq!(path.matches("->").count(), 2, "{path}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(registry.descriptor_of(TypeId::of::<Parent>()).is_none());
    }

    #[test]
    fn register_then_decode_by_id() {
        let registry = DecoderRegistry::new();
        let descriptor = registry.register::<Option<i64>>().unwrap();
        assert!(descriptor.nullable);
        assert_eq!(descriptor.strategy, Strategy::CastValue);
        assert_eq!(descriptor.core_type_name, "i64");

        let row = MemoryRow::new().with("n", 5i64);
        let value = registry
            .decode_dynamic(TypeId::of::<Option<i64>>(), &row, 0, 1)
            .unwrap();
        assert_eq!(*value.downcast::<Option<i64>>().unwrap(), Some(5));
    }

    #[test]
    fn decode_dynamic_needs_registration() {
        let registry = DecoderRegistry::new();
        let row = MemoryRow::new().with("n", 5i64);
        assert!(matches!(
            registry.decode_dynamic(TypeId::of::<u8>(), &row, 0, 1),
            Err(MapError::Configuration { .. })
        ));
    }

    #[test]
    fn field_count_reports_width() {
        let registry = DecoderRegistry::new();
        assert_eq!(registry.field_count::<(i32, String, bool)>().unwrap(), Some(3));
        assert_eq!(registry.field_count::<Value>().unwrap(), None);
        assert_eq!(registry.field_count::<(i32, Value)>().unwrap(), None);
    }

    #[test]
    fn disabled_terminator_treats_null_columns_as_values() {
        let config = RowMapConfig::parse("tuple_terminator = \"\"").unwrap();
        let registry = DecoderRegistry::with_config(&config);
        let row = MemoryRow::new()
            .with("id", 1)
            .with("NULL", Value::Null)
            .with("name", "x");
        let (id, rest): (i32, Value) = registry.decode_row(&row).unwrap();
        assert_eq!(id, 1);
        let Value::Object(bag) = rest else {
            panic!("expected a bag");
        };
        assert_eq!(bag.keys().collect::<Vec<_>>(), vec!["NULL", "name"]);
    }

    #[test]
    fn decode_row_uses_the_whole_row() {
        let registry = DecoderRegistry::new();
        let row = MemoryRow::new().with("id", 1).with("name", "x");
        let (id, name): (i32, String) = registry.decode_row(&row).unwrap();
        assert_eq!((id, name.as_str()), (1, "x"));
        assert!(registry.decode_row::<i32>(&row).is_err());
    }
}
