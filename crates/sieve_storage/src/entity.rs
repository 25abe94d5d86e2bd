//! Entity allocation and the entity index.

use std::collections::HashMap;

use sieve_foundation::{Entity, Error, ErrorKind, Result};

use crate::table::TableId;

/// Location and metadata of one live entity.
#[derive(Clone, Debug, Default)]
pub(crate) struct EntityMeta {
    /// Table holding the entity.
    pub table: Option<TableId>,
    /// Row within the table.
    pub row: usize,
    /// Registered symbolic name, if any.
    pub name: Option<String>,
}

/// Allocates entity indices and tracks entity locations and names.
#[derive(Debug, Default)]
pub struct EntityStore {
    metas: Vec<Option<EntityMeta>>,
    names: HashMap<String, Entity>,
    next: u32,
}

impl EntityStore {
    /// Creates an empty store. User entities start after the reserved
    /// builtin range.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metas: Vec::new(),
            names: HashMap::new(),
            next: Entity::FIRST_USER_INDEX,
        }
    }

    /// Allocates a fresh entity.
    pub fn spawn(&mut self) -> Entity {
        let e = Entity::new(self.next);
        self.next += 1;
        self.ensure(e);
        e
    }

    /// Registers an entity at a fixed reserved index.
    pub(crate) fn spawn_reserved(&mut self, e: Entity) {
        self.ensure(e);
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metas.iter().filter(|m| m.is_some()).count()
    }

    /// Returns true if no entities are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the entity is live.
    #[must_use]
    pub fn contains(&self, e: Entity) -> bool {
        self.meta(e).is_some()
    }

    /// Binds a name to an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already bound to a different entity.
    pub fn set_name(&mut self, e: Entity, name: &str) -> Result<()> {
        if let Some(&existing) = self.names.get(name) {
            if existing != e {
                return Err(Error::new(ErrorKind::NameInUse(name.to_string())));
            }
            return Ok(());
        }
        let meta = self
            .meta_mut(e)
            .ok_or_else(|| Error::new(ErrorKind::EntityNotFound(e.index())))?;
        meta.name = Some(name.to_string());
        self.names.insert(name.to_string(), e);
        Ok(())
    }

    /// Resolves a name to an entity.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Entity> {
        self.names.get(name).copied()
    }

    /// Returns the name bound to an entity, if any.
    #[must_use]
    pub fn name(&self, e: Entity) -> Option<&str> {
        self.meta(e).and_then(|m| m.name.as_deref())
    }

    pub(crate) fn meta(&self, e: Entity) -> Option<&EntityMeta> {
        self.metas.get(e.index() as usize).and_then(Option::as_ref)
    }

    pub(crate) fn meta_mut(&mut self, e: Entity) -> Option<&mut EntityMeta> {
        self.metas
            .get_mut(e.index() as usize)
            .and_then(Option::as_mut)
    }

    fn ensure(&mut self, e: Entity) {
        let idx = e.index() as usize;
        if self.metas.len() <= idx {
            self.metas.resize(idx + 1, None);
        }
        if self.metas[idx].is_none() {
            self.metas[idx] = Some(EntityMeta::default());
        }
    }
}
