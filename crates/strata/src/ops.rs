//! # Operation Buffers
//!
//! Structural changes (adding or removing a property) move rows between
//! tables, which would invalidate any dataset being iterated. Systems queue
//! them in an [`OpBuffer`] instead and the world applies them at the next
//! [`World::dispatch`].
//!
//! Dispatch runs every add before any remove, whatever order they were
//! queued in, so a remove can refer to a property a same-buffer add creates.
//!
//! ```rust
//! use strata::{AddProperty, PropertyFlags, RemoveProperty, World};
//!
//! let mut world = World::default();
//! let tag = world.register_property("Tag", 0, None, PropertyFlags::FLAG);
//! let score = world.register_property("Score", 4, None, PropertyFlags::empty());
//! let entity = world.create_entity();
//!
//! let buffer = world.create_op_buffer();
//! world.add_op(&buffer, RemoveProperty::new(entity, tag));
//! world.add_op(&buffer, AddProperty::new(entity, tag));
//! world.add_op(&buffer, AddProperty::new(entity, score).with_value(&7u32.to_le_bytes()));
//! world.dispatch(buffer);
//!
//! assert!(!world.has_property(entity, tag));
//! assert_eq!(world.get_property::<u32>(entity, score), Some(7));
//! world.release_scratch();
//! ```

use strata_core::{Arena, ArenaSlice, PoolHandle, PropertyId};

use crate::entity::EntityId;
use crate::world::World;

/// Handle to a pair of pending op queues.
///
/// Consumed by [`World::dispatch`] or [`World::discard_op_buffer`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an op buffer must be dispatched or discarded"]
pub struct OpBuffer {
    handle: PoolHandle,
}

/// Request to add a property, with an optional initial value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddProperty<'a> {
    /// Target entity.
    pub entity: EntityId,
    /// Property to add.
    pub property: PropertyId,
    /// Initial value bytes. Copied when queued.
    pub value: Option<&'a [u8]>,
}

impl<'a> AddProperty<'a> {
    /// Add with the property's default value.
    #[must_use]
    pub fn new(entity: EntityId, property: PropertyId) -> Self {
        Self {
            entity,
            property,
            value: None,
        }
    }

    /// Sets the initial value bytes.
    #[must_use]
    pub fn with_value(mut self, value: &'a [u8]) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets the initial value from a plain-old-data value.
    #[must_use]
    pub fn with_pod<T: bytemuck::Pod>(self, value: &'a T) -> Self {
        self.with_value(bytemuck::bytes_of(value))
    }
}

/// Request to remove a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoveProperty {
    /// Target entity.
    pub entity: EntityId,
    /// Property to remove.
    pub property: PropertyId,
}

impl RemoveProperty {
    /// Remove `property` from `entity`.
    #[must_use]
    pub fn new(entity: EntityId, property: PropertyId) -> Self {
        Self { entity, property }
    }
}

/// Either kind of structural op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructuralOp<'a> {
    /// See [`AddProperty`].
    Add(AddProperty<'a>),
    /// See [`RemoveProperty`].
    Remove(RemoveProperty),
}

impl<'a> From<AddProperty<'a>> for StructuralOp<'a> {
    fn from(op: AddProperty<'a>) -> Self {
        Self::Add(op)
    }
}

impl From<RemoveProperty> for StructuralOp<'_> {
    fn from(op: RemoveProperty) -> Self {
        Self::Remove(op)
    }
}

/// An add with its payload already copied into the scratch arena.
#[derive(Clone, Copy, Debug)]
struct QueuedAdd {
    entity: EntityId,
    property: PropertyId,
    value: Option<ArenaSlice>,
}

/// Pending ops of one buffer, each queue in FIFO order.
#[derive(Debug, Default)]
pub(crate) struct OpQueues {
    adds: Vec<QueuedAdd>,
    removes: Vec<RemoveProperty>,
}

impl World {
    /// Creates an empty op buffer.
    pub fn create_op_buffer(&self) -> OpBuffer {
        OpBuffer {
            handle: self.op_buffers.lock().allocate(OpQueues::default()),
        }
    }

    /// Number of op buffers not yet dispatched or discarded.
    #[must_use]
    pub fn live_op_buffers(&self) -> usize {
        self.op_buffers.lock().allocated_count()
    }

    /// Queues a structural op.
    ///
    /// Add payloads are copied into the scratch arena, so the caller's
    /// bytes may be dropped right away. A payload for a flag property is
    /// discarded. Callable while datasets are borrowed.
    ///
    /// # Panics
    ///
    /// Panics if the entity is invalid, the property is unregistered or is
    /// the owner column, the payload size does not match, or `buffer`
    /// belongs to another world.
    pub fn add_op<'a>(&self, buffer: &OpBuffer, op: impl Into<StructuralOp<'a>>) {
        match op.into() {
            StructuralOp::Add(add) => {
                self.assert_valid(add.entity);
                self.assert_not_owner(add.property);
                let description = self.registry.describe(add.property);
                let value = match add.value {
                    Some(_) if description.is_flag() => {
                        tracing::warn!(
                            entity = %add.entity,
                            property = description.name(),
                            "discarded value for flag property"
                        );
                        None
                    }
                    Some(bytes) => {
                        assert_eq!(
                            bytes.len(),
                            description.byte_size(),
                            "Value for '{}' is {} bytes, expected {}",
                            description.name(),
                            bytes.len(),
                            description.byte_size()
                        );
                        Some(self.scratch.lock().alloc_slice(bytes))
                    }
                    None => None,
                };
                self.with_queues(buffer, |queues| {
                    queues.adds.push(QueuedAdd {
                        entity: add.entity,
                        property: add.property,
                        value,
                    });
                });
            }
            StructuralOp::Remove(remove) => {
                self.assert_valid(remove.entity);
                assert_ne!(remove.property, self.owner, "The owner column cannot be removed");
                assert!(
                    self.registry.read().contains(remove.property),
                    "Property id {} was never registered",
                    remove.property
                );
                self.with_queues(buffer, |queues| queues.removes.push(remove));
            }
        }
    }

    fn with_queues(&self, buffer: &OpBuffer, f: impl FnOnce(&mut OpQueues)) {
        let mut buffers = self.op_buffers.lock();
        let queues = buffers.get_mut(buffer.handle).unwrap_or_else(|| {
            panic!("Op buffer {:?} is not live in this world", buffer.handle)
        });
        f(queues);
    }

    /// Applies a structural op immediately.
    ///
    /// Only for code that holds no datasets, since rows may move.
    ///
    /// # Panics
    ///
    /// As [`World::add_op`].
    pub fn execute<'a>(&mut self, op: impl Into<StructuralOp<'a>>) {
        match op.into() {
            StructuralOp::Add(add) => {
                let value = add
                    .value
                    .filter(|_| !self.registry.describe(add.property).is_flag());
                self.execute_add(add.entity, add.property, value);
            }
            StructuralOp::Remove(remove) => self.execute_remove(remove.entity, remove.property),
        }
    }

    /// Applies every queued add, then every queued remove, then releases the
    /// buffer.
    ///
    /// Ops whose entity was deleted after they were queued are skipped.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` belongs to another world.
    pub fn dispatch(&mut self, buffer: OpBuffer) {
        let queues = self
            .op_buffers
            .get_mut()
            .free(buffer.handle)
            .unwrap_or_else(|| {
                panic!("Op buffer {:?} is not live in this world", buffer.handle)
            });

        // Payloads stay in place; the arena is only borrowed out for the loop.
        let placeholder = Arena::new(self.config.scratch_chunk_bytes);
        let scratch = std::mem::replace(self.scratch.get_mut(), placeholder);

        let mut skipped = 0usize;
        for add in &queues.adds {
            if !self.is_valid(add.entity) {
                skipped += 1;
                continue;
            }
            let value = add.value.map(|slice| scratch.get(slice));
            self.execute_add(add.entity, add.property, value);
        }
        for remove in &queues.removes {
            if !self.is_valid(remove.entity) {
                skipped += 1;
                continue;
            }
            self.execute_remove(remove.entity, remove.property);
        }

        *self.scratch.get_mut() = scratch;

        if skipped > 0 {
            tracing::warn!(skipped, "skipped ops for deleted entities");
        }
        tracing::debug!(
            adds = queues.adds.len(),
            removes = queues.removes.len(),
            "dispatched op buffer"
        );
    }

    /// Drops a buffer without applying it.
    pub fn discard_op_buffer(&mut self, buffer: OpBuffer) {
        self.op_buffers.get_mut().free(buffer.handle);
    }

    /// Frees every op payload copied since the last release.
    ///
    /// # Panics
    ///
    /// Panics if a buffer is still pending.
    pub fn release_scratch(&mut self) {
        let pending = self.op_buffers.get_mut().allocated_count();
        assert!(
            pending == 0,
            "Cannot release op scratch while {pending} op buffers are pending"
        );
        self.scratch.get_mut().reset();
    }
}
