//! World state: entities, tables, and the component index.
//!
//! The world is deliberately minimal: enough archetype bookkeeping for the
//! query engine to resolve names, enumerate tables per id, and follow
//! relationships. Tables are created on demand when an entity first takes
//! on a signature, and stay registered in the component index even after
//! their last entity leaves.

use std::collections::HashMap;

use log::trace;
use sieve_foundation::{Entity, Error, ErrorKind, Id, Result};

use crate::component::{ComponentDesc, ComponentRecord, IdFlags, RecordRef};
use crate::entity::EntityStore;
use crate::table::{Table, TableId};

/// The root table: entities with an empty signature.
const ROOT_TABLE: TableId = TableId(0);

/// Entity, table, and component-index storage.
pub struct World {
    entities: EntityStore,
    tables: Vec<Table>,
    table_index: HashMap<Vec<Id>, TableId>,
    components: HashMap<Id, RecordRef>,
}

impl World {
    /// Creates a world with the builtin entities and records registered.
    #[must_use]
    pub fn new() -> Self {
        let mut world = Self {
            entities: EntityStore::new(),
            tables: Vec::new(),
            table_index: HashMap::new(),
            components: HashMap::new(),
        };

        // Root table for entities with no ids.
        let root = Table::new(ROOT_TABLE, Vec::new());
        world.tables.push(root);
        world.table_index.insert(Vec::new(), ROOT_TABLE);

        let builtins: &[(Entity, &str, IdFlags)] = &[
            (Entity::WILDCARD, "*", IdFlags::TAG),
            (Entity::ANY, "_", IdFlags::TAG),
            (Entity::THIS, "This", IdFlags::TAG),
            (
                Entity::CHILD_OF,
                "ChildOf",
                IdFlags::TAG
                    | IdFlags::TRAVERSABLE
                    | IdFlags::ACYCLIC
                    | IdFlags::DONT_INHERIT
                    | IdFlags::FINAL,
            ),
            (
                Entity::IS_A,
                "IsA",
                IdFlags::TAG
                    | IdFlags::TRAVERSABLE
                    | IdFlags::ACYCLIC
                    | IdFlags::TRANSITIVE
                    | IdFlags::REFLEXIVE
                    | IdFlags::DONT_INHERIT,
            ),
            (
                Entity::PREFAB,
                "Prefab",
                IdFlags::TAG | IdFlags::DONT_INHERIT | IdFlags::FINAL,
            ),
            (
                Entity::DISABLED,
                "Disabled",
                IdFlags::TAG | IdFlags::DONT_INHERIT | IdFlags::FINAL,
            ),
        ];

        for &(e, name, flags) in builtins {
            world.entities.spawn_reserved(e);
            world.place_in_table(e, ROOT_TABLE);
            world
                .entities
                .set_name(e, name)
                .expect("builtin names are unique");
            world.insert_record(Id::entity(e), flags);
        }

        // Pattern records that must exist before any table does.
        world.insert_record(Id::WILDCARD, IdFlags::empty());
        world.insert_record(Id::ANY, IdFlags::empty());
        world.insert_record(
            Id::pair(Entity::WILDCARD, Entity::WILDCARD),
            IdFlags::empty(),
        );

        // The root-entity index: tables without a (ChildOf, _) pair.
        // The empty root table is its first member.
        let root_record = world.insert_record(
            Id::pair(Entity::CHILD_OF, Entity::null()),
            IdFlags::empty(),
        );
        root_record.register(ROOT_TABLE, 0);

        world
    }

    // --- Registration ---

    /// Registers a named component, tag, or relationship.
    ///
    /// Returns the entity representing the registered id.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already bound.
    pub fn component(&mut self, desc: ComponentDesc) -> Result<Entity> {
        if self.entities.lookup(&desc.name).is_some() {
            return Err(Error::new(ErrorKind::NameInUse(desc.name)));
        }
        let e = self.spawn();
        self.entities.set_name(e, &desc.name)?;
        self.insert_record(Id::entity(e), desc.flags);
        trace!("registered component '{}' as {e}", self.name_of(e));
        Ok(e)
    }

    // --- Entity operations ---

    /// Spawns an entity with an empty signature.
    pub fn spawn(&mut self) -> Entity {
        let e = self.entities.spawn();
        self.place_in_table(e, ROOT_TABLE);
        e
    }

    /// Spawns an entity and binds a name to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already bound.
    pub fn spawn_named(&mut self, name: &str) -> Result<Entity> {
        if self.entities.lookup(name).is_some() {
            return Err(Error::new(ErrorKind::NameInUse(name.to_string())));
        }
        let e = self.spawn();
        self.entities.set_name(e, name)?;
        Ok(e)
    }

    /// Adds an id to an entity, moving it to the matching table.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or the id is malformed.
    pub fn add_id(&mut self, e: Entity, id: Id) -> Result<()> {
        if id.is_null() || (id.is_pair() && (id.first().is_null() || id.second().is_null())) {
            return Err(Error::new(ErrorKind::InvalidPair));
        }
        let table = self
            .entity_table(e)
            .ok_or_else(|| Error::new(ErrorKind::EntityNotFound(e.index())))?;
        if self.table(table).has(id) {
            return Ok(());
        }

        let mut ids = self.table(table).ids().to_vec();
        let pos = ids.binary_search(&id).unwrap_or_else(|p| p);
        ids.insert(pos, id);
        let dst = self.table_ensure(ids);
        self.move_entity(e, dst);
        Ok(())
    }

    /// Removes an id from an entity, moving it to the reduced table.
    ///
    /// Removing an id the entity does not have is a no-op. The vacated
    /// table stays registered in the component index.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    pub fn remove_id(&mut self, e: Entity, id: Id) -> Result<()> {
        let table = self
            .entity_table(e)
            .ok_or_else(|| Error::new(ErrorKind::EntityNotFound(e.index())))?;
        if !self.table(table).has(id) {
            return Ok(());
        }

        let mut ids = self.table(table).ids().to_vec();
        if let Ok(pos) = ids.binary_search(&id) {
            ids.remove(pos);
        }
        let dst = self.table_ensure(ids);
        self.move_entity(e, dst);
        Ok(())
    }

    /// Adds a plain component or tag to an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    pub fn add(&mut self, e: Entity, component: Entity) -> Result<()> {
        self.add_id(e, Id::entity(component))
    }

    /// Removes a plain component or tag from an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    pub fn remove(&mut self, e: Entity, component: Entity) -> Result<()> {
        self.remove_id(e, Id::entity(component))
    }

    /// Adds a relationship pair to an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    pub fn add_pair(&mut self, e: Entity, relation: Entity, target: Entity) -> Result<()> {
        self.add_id(e, Id::pair(relation, target))
    }

    /// Makes `e` a child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    pub fn child_of(&mut self, e: Entity, parent: Entity) -> Result<()> {
        self.add_pair(e, Entity::CHILD_OF, parent)
    }

    /// Makes `e` an instance of `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    pub fn is_a(&mut self, e: Entity, base: Entity) -> Result<()> {
        self.add_pair(e, Entity::IS_A, base)
    }

    // --- Lookup ---

    /// Returns true if the entity is alive.
    #[must_use]
    pub fn is_alive(&self, e: Entity) -> bool {
        self.entities.contains(e)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns the table an entity lives in.
    #[must_use]
    pub fn entity_table(&self, e: Entity) -> Option<TableId> {
        self.entities.meta(e).and_then(|m| m.table)
    }

    /// Returns the row an entity occupies within its table.
    #[must_use]
    pub fn entity_row(&self, e: Entity) -> Option<usize> {
        self.entities.meta(e).map(|m| m.row)
    }

    /// Returns a table by id.
    ///
    /// # Panics
    ///
    /// Panics if the table id did not come from this world.
    #[must_use]
    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0 as usize]
    }

    /// Returns all tables, in creation order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// Returns true if the entity's signature matches the id pattern.
    #[must_use]
    pub fn has_id(&self, e: Entity, pattern: Id) -> bool {
        self.entity_table(e)
            .is_some_and(|t| crate::search::type_search_from(self.table(t), 0, pattern).is_some())
    }

    /// Returns the component record for an id or id pattern.
    #[must_use]
    pub fn component_record(&self, id: Id) -> Option<RecordRef> {
        self.components.get(&id).cloned()
    }

    /// Returns the trait flags governing an id.
    ///
    /// Pairs are governed by their relation: `(R, T)` carries the flags of
    /// `R`.
    #[must_use]
    pub fn id_flags(&self, id: Id) -> IdFlags {
        let key = if id.is_pair() {
            Id::entity(id.first())
        } else {
            id
        };
        self.components
            .get(&key)
            .map_or_else(IdFlags::empty, |r| r.flags())
    }

    /// Resolves a symbolic name to an entity.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Entity> {
        self.entities.lookup(name)
    }

    /// Resolves a name among the children of `parent`.
    #[must_use]
    pub fn lookup_child(&self, parent: Entity, name: &str) -> Option<Entity> {
        let record = self.component_record(Id::pair(Entity::CHILD_OF, parent))?;
        for rec in record.tables().iter() {
            for &e in self.table(rec.table).entities() {
                if self.entities.name(e) == Some(name) {
                    return Some(e);
                }
            }
        }
        None
    }

    /// Returns the name bound to an entity, if any.
    #[must_use]
    pub fn entity_name(&self, e: Entity) -> Option<&str> {
        self.entities.name(e)
    }

    /// Returns a printable name for an entity: its bound name, or its
    /// numeric display form.
    #[must_use]
    pub fn name_of(&self, e: Entity) -> String {
        self.entities
            .name(e)
            .map_or_else(|| e.to_string(), str::to_string)
    }

    // --- Internals ---

    fn insert_record(&mut self, id: Id, flags: IdFlags) -> RecordRef {
        let record = RecordRef::new(ComponentRecord::new(id, flags));
        self.components.insert(id, record.clone());
        record
    }

    fn ensure_record(&mut self, id: Id) -> RecordRef {
        if let Some(record) = self.components.get(&id) {
            return record.clone();
        }
        self.insert_record(id, IdFlags::empty())
    }

    fn table_ensure(&mut self, ids: Vec<Id>) -> TableId {
        if let Some(&existing) = self.table_index.get(&ids) {
            return existing;
        }

        let id = TableId(u32::try_from(self.tables.len()).expect("table count overflow"));
        let table = Table::new(id, ids.clone());
        trace!("created table {id:?} with {} ids", ids.len());

        for (column, &tid) in ids.iter().enumerate() {
            self.ensure_record(tid).register(id, column);
            if tid.is_pair() {
                self.ensure_record(Id::pair(tid.first(), Entity::WILDCARD))
                    .register(id, column);
                self.ensure_record(Id::pair(Entity::WILDCARD, tid.second()))
                    .register(id, column);
                self.ensure_record(Id::pair(Entity::WILDCARD, Entity::WILDCARD))
                    .register(id, column);
            }
            if !tid.is_and_group() {
                self.ensure_record(Id::WILDCARD).register(id, column);
            }
        }
        if !ids.is_empty() {
            self.ensure_record(Id::ANY).register(id, 0);
        }
        if !ids
            .iter()
            .any(|&tid| tid.is_pair() && tid.first() == Entity::CHILD_OF)
        {
            self.ensure_record(Id::pair(Entity::CHILD_OF, Entity::null()))
                .register(id, 0);
        }

        self.tables.push(table);
        self.table_index.insert(ids, id);
        id
    }

    fn place_in_table(&mut self, e: Entity, table: TableId) {
        let row = self.tables[table.0 as usize].push_entity(e);
        if let Some(meta) = self.entities.meta_mut(e) {
            meta.table = Some(table);
            meta.row = row;
        }
    }

    fn move_entity(&mut self, e: Entity, dst: TableId) {
        let (src, row) = match self.entities.meta(e) {
            Some(meta) => (meta.table, meta.row),
            None => return,
        };
        if let Some(src) = src {
            if let Some(moved) = self.tables[src.0 as usize].swap_remove_entity(row) {
                if let Some(moved_meta) = self.entities.meta_mut(moved) {
                    moved_meta.row = row;
                }
            }
        }
        self.place_in_table(e, dst);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
