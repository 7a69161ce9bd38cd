//! Owns every archetype table and resolves the table graph.

use std::collections::HashMap;

use crate::ecs::component::{Component, Value};
use crate::ecs::entity::{Entity, EntityIndex, Location};
use crate::ecs::error::{Error, Result};
use crate::ecs::signature::Signature;
use crate::ecs::storage::{Row, Table, TableId};

/// Owns all archetype tables, keyed both by identifier and by signature
/// hash, and resolves the archetype graph's edges on demand.
pub struct TableIndex {
    tables: Vec<Table>,
    by_hash: HashMap<u64, TableId>,
}

impl TableIndex {
    /// Construct a new index, pre-populated with the empty-signature table
    /// at id 0 — the table freshly committed entities land in.
    pub fn new() -> Self {
        let empty = Table::new(TableId::new(0), Signature::EMPTY);
        let mut by_hash = HashMap::new();
        by_hash.insert(Signature::EMPTY.hash(), TableId::new(0));
        Self { tables: vec![empty], by_hash }
    }

    /// The id of the empty-signature table.
    #[inline]
    pub fn empty_table_id(&self) -> TableId {
        TableId::new(0)
    }

    pub fn get_by_id(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.index())
    }

    pub fn get_by_id_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.get_mut(id.index())
    }

    pub fn get_by_signature(&self, signature: &Signature) -> Option<&Table> {
        self.by_hash.get(&signature.hash()).and_then(|id| self.get_by_id(*id))
    }

    fn create_table(&mut self, signature: Signature) -> TableId {
        let id = TableId::new(self.tables.len() as u32);
        let hash = signature.hash();
        log::debug!("creating table {id:?} for signature {signature:?}");
        self.tables.push(Table::new(id, signature));
        self.by_hash.insert(hash, id);
        id
    }

    /// Resolve the table reached by adding `c` to `from`'s signature.
    ///
    /// Three-tier lookup: the edge cache, then the signature-hash map, then
    /// table creation. A newly created table only gets `from`'s forward
    /// edge populated — the new table's inverse (`without_edges[c]`) edge
    /// is left for lazy population on first traversal, per the archetype
    /// graph's cache-only contract.
    ///
    /// # Panics
    /// If `from`'s signature already contains `c`. Callers that migrate an
    /// entity (`add_component`) check this themselves and surface
    /// [`Error::DuplicateComponent`] instead of reaching this method at all.
    pub fn resolve_with(&mut self, from: TableId, c: Component) -> TableId {
        if let Some(to) = self.tables[from.index()].with_edge(c) {
            return to;
        }

        let target_signature = self.tables[from.index()].signature().with(c).expect("component already present");
        let to = match self.by_hash.get(&target_signature.hash()) {
            Some(&id) => id,
            None => self.create_table(target_signature),
        };
        self.tables[from.index()].set_with_edge(c, to);
        to
    }

    /// Resolve the table reached by removing `c` from `from`'s signature.
    ///
    /// # Panics
    /// If `from`'s signature does not contain `c`. Callers that migrate an
    /// entity (`remove_component`) check this themselves and surface
    /// [`Error::MissingComponent`] instead of reaching this method at all.
    pub fn resolve_without(&mut self, from: TableId, c: Component) -> TableId {
        if let Some(to) = self.tables[from.index()].without_edge(c) {
            return to;
        }

        let target_signature = self.tables[from.index()].signature().without(c).expect("component not present");
        let to = match self.by_hash.get(&target_signature.hash()) {
            Some(&id) => id,
            None => self.create_table(target_signature),
        };
        self.tables[from.index()].set_without_edge(c, to);
        to
    }

    /// Iterate over every table, in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// Borrow two distinct tables mutably at once.
    ///
    /// # Panics
    /// If `a == b`.
    fn pair_mut(&mut self, a: TableId, b: TableId) -> (&mut Table, &mut Table) {
        assert_ne!(a, b, "pair_mut requires distinct tables");
        let (ai, bi) = (a.index(), b.index());
        if ai < bi {
            let (left, right) = self.tables.split_at_mut(bi);
            (&mut left[ai], &mut right[0])
        } else {
            let (left, right) = self.tables.split_at_mut(ai);
            (&mut right[0], &mut left[bi])
        }
    }

    /// Migrate `entity` from its current table to `resolve_with(current, c)`,
    /// writing `value` into the new column for `c`. Updates `entities`'
    /// record for the entity.
    ///
    /// # Errors
    /// [`Error::InvalidEntity`] if `entity` has no recorded location;
    /// [`Error::DuplicateComponent`] if `entity` already carries `c`;
    /// [`Error::EmptyCell`] if a column being carried over to the new row was
    /// never written in the old one (an internal invariant violation).
    pub fn add_component(&mut self, entities: &mut EntityIndex, entity: Entity, c: Component, value: Value) -> Result<()> {
        let old_location = entities.get(entity).ok_or(Error::InvalidEntity(entity))?;
        if self.tables[old_location.table.index()].signature().contains(c) {
            return Err(Error::DuplicateComponent(entity, c));
        }
        let new_table_id = self.resolve_with(old_location.table, c);
        log::debug!("entity {entity:?} migrating {:?} -> {new_table_id:?} via add({c:?})", old_location.table);

        let (old_table, new_table) = self.pair_mut(old_location.table, new_table_id);
        let new_row = new_table.add(entity);
        let new_column = new_table.column_index(c).expect("new table must contain the added component");

        for (old_column, &existing_c) in old_table.signature().ids().iter().enumerate() {
            let target_column = new_table.column_index(existing_c).expect("new table is a superset of the old one");
            match old_table.get(old_location.row, old_column) {
                Ok(v) => new_table.set(new_row, target_column, v.clone()),
                Err(err) => {
                    new_table.remove(new_row);
                    return Err(err);
                }
            }
        }
        new_table.set(new_row, new_column, value);
        old_table.remove(old_location.row);

        entities.record(entity, Location::new(new_table_id, new_row)).expect("entity must still be valid");
        Ok(())
    }

    /// Migrate `entity` from its current table to `resolve_without(current, c)`.
    ///
    /// # Errors
    /// [`Error::InvalidEntity`] if `entity` has no recorded location;
    /// [`Error::MissingComponent`] if `entity` does not carry `c`;
    /// [`Error::EmptyCell`] if a column being carried over to the new row was
    /// never written in the old one (an internal invariant violation).
    pub fn remove_component(&mut self, entities: &mut EntityIndex, entity: Entity, c: Component) -> Result<()> {
        let old_location = entities.get(entity).ok_or(Error::InvalidEntity(entity))?;
        if !self.tables[old_location.table.index()].signature().contains(c) {
            return Err(Error::MissingComponent(entity, c));
        }
        let new_table_id = self.resolve_without(old_location.table, c);
        log::debug!("entity {entity:?} migrating {:?} -> {new_table_id:?} via remove({c:?})", old_location.table);

        let (old_table, new_table) = self.pair_mut(old_location.table, new_table_id);
        let new_row = new_table.add(entity);
        let removed_column = old_table.column_index(c).expect("old table must contain the removed component");

        for (old_column, &existing_c) in old_table.signature().ids().iter().enumerate() {
            if old_column == removed_column {
                continue;
            }
            let target_column = new_table.column_index(existing_c).expect("new table retains every other component");
            match old_table.get(old_location.row, old_column) {
                Ok(v) => new_table.set(new_row, target_column, v.clone()),
                Err(err) => {
                    new_table.remove(new_row);
                    return Err(err);
                }
            }
        }
        old_table.remove(old_location.row);

        entities.record(entity, Location::new(new_table_id, new_row)).expect("entity must still be valid");
        Ok(())
    }

    /// Destroy `row` in `table`, dropping the row's cells.
    pub fn destroy_row(&mut self, table: TableId, row: Row) {
        self.tables[table.index()].remove(row);
    }
}

impl Default for TableIndex {
    fn default() -> Self {
        Self::new()
    }
}
