//! Column-major storage for a single archetype.

use std::collections::HashMap;

use crate::ecs::component::{Component, Value};
use crate::ecs::entity::Entity;
use crate::ecs::error::{Error, Result};
use crate::ecs::signature::Signature;
use crate::ecs::storage::Row;

const INITIAL_CAPACITY: usize = 4;

/// The identifier for a table in storage.
///
/// A plain `u32` rather than the bit-packed `(table_id, row)` the teacher's
/// own archetype storage uses — the 65536-table / 65536-row ceiling that
/// packing buys isn't a constraint this core needs to carry, so the width is
/// widened and the limit dropped rather than preserved.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(u32);

impl TableId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn id(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A slot in the id column: either an occupied row's entity, or a link in
/// the free-row stack (the next free row below this one, if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdSlot {
    Occupied(Entity),
    Free(Option<usize>),
}

/// Column-major storage for all entities sharing one archetype.
///
/// Columns are addressed by their position in the table's [`Signature`], not
/// by component id directly — callers resolve a component to a column index
/// via `signature.index_of(c)` once and may reuse it.
pub struct Table {
    id: TableId,
    signature: Signature,
    id_column: Vec<IdSlot>,
    data_columns: Vec<Vec<Option<Value>>>,
    high_water_mark: Option<usize>,
    free_head: Option<usize>,
    occupied: usize,
    with_edges: HashMap<Component, TableId>,
    without_edges: HashMap<Component, TableId>,
}

impl Table {
    /// Construct a new, empty table for the given archetype.
    pub fn new(id: TableId, signature: Signature) -> Self {
        let columns = signature.len();
        Self {
            id,
            signature,
            id_column: Vec::new(),
            data_columns: vec![Vec::new(); columns],
            high_water_mark: None,
            free_head: None,
            occupied: 0,
            with_edges: HashMap::new(),
            without_edges: HashMap::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> TableId {
        self.id
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The number of currently occupied rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.occupied
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// The largest row index ever occupied, or `None` if the table has
    /// never held a row.
    #[inline]
    pub fn high_water_mark(&self) -> Option<usize> {
        self.high_water_mark
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.id_column.len()
    }

    /// Double the table's capacity (or allocate the initial capacity if it
    /// currently has none), extending every column with empty slots.
    fn grow(&mut self) {
        let new_capacity = if self.id_column.is_empty() {
            INITIAL_CAPACITY
        } else {
            self.id_column.len() * 2
        };
        log::trace!("table {:?} growing to capacity {new_capacity}", self.id);
        self.id_column.resize(new_capacity, IdSlot::Free(None));
        for column in &mut self.data_columns {
            column.resize(new_capacity, None);
        }
    }

    fn allocate_row(&mut self) -> usize {
        if let Some(row) = self.free_head {
            let next = match self.id_column[row] {
                IdSlot::Free(next) => next,
                IdSlot::Occupied(_) => unreachable!("free_head pointed at an occupied row"),
            };
            self.free_head = next;
            return row;
        }

        let row = match self.high_water_mark {
            Some(hwm) => hwm + 1,
            None => 0,
        };
        if row >= self.capacity() {
            self.grow();
        }
        self.high_water_mark = Some(row);
        row
    }

    /// Place `entity` in a fresh row, reusing a freed row if one is
    /// available. The row's data columns are left empty — callers must
    /// `set` every column before reading it back.
    pub fn add(&mut self, entity: Entity) -> Row {
        let row = self.allocate_row();
        self.id_column[row] = IdSlot::Occupied(entity);
        self.occupied += 1;
        Row::new(row)
    }

    /// Remove the entity at `row`, clearing its data cells and pushing the
    /// row onto the free-list. Returns the entity that occupied it.
    ///
    /// # Panics
    /// If `row` does not currently hold a live entity.
    pub fn remove(&mut self, row: Row) -> Entity {
        let index = row.index();
        let entity = match self.id_column[index] {
            IdSlot::Occupied(e) => e,
            IdSlot::Free(_) => panic!("table {:?} row {row:?} is not occupied", self.id),
        };
        self.id_column[index] = IdSlot::Free(self.free_head);
        self.free_head = Some(index);
        for column in &mut self.data_columns {
            column[index] = None;
        }
        self.occupied -= 1;
        entity
    }

    /// The position of `c`'s column in this table's signature.
    #[inline]
    pub fn column_index(&self, c: Component) -> Option<usize> {
        self.signature.index_of(c)
    }

    /// Read the value in `column` at `row`.
    ///
    /// # Errors
    /// [`Error::EmptyCell`] if the cell was never written.
    pub fn get(&self, row: Row, column: usize) -> Result<&Value> {
        self.data_columns[column][row.index()]
            .as_ref()
            .ok_or(Error::EmptyCell(self.id, row, column))
    }

    /// Write `value` into `column` at `row`.
    pub fn set(&mut self, row: Row, column: usize, value: Value) {
        self.data_columns[column][row.index()] = Some(value);
    }

    /// The entity occupying `row`, if any.
    pub fn entity_at(&self, row: Row) -> Option<Entity> {
        match self.id_column.get(row.index()) {
            Some(IdSlot::Occupied(e)) => Some(*e),
            _ => None,
        }
    }

    /// Iterate over the entities in every currently occupied row.
    ///
    /// Descends from `high_water_mark` to zero; order is otherwise
    /// unspecified. A single-cursor, single-threaded iterator is sufficient
    /// here because the drain-phase discipline this table is used under
    /// makes concurrent mutation-during-iteration impossible.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        let upper = self.high_water_mark.map(|hwm| hwm + 1).unwrap_or(0);
        (0..upper).rev().filter_map(move |row| match self.id_column[row] {
            IdSlot::Occupied(e) => Some(e),
            IdSlot::Free(_) => None,
        })
    }

    pub fn with_edge(&self, c: Component) -> Option<TableId> {
        self.with_edges.get(&c).copied()
    }

    pub fn set_with_edge(&mut self, c: Component, to: TableId) {
        self.with_edges.insert(c, to);
    }

    pub fn without_edge(&self, c: Component) -> Option<TableId> {
        self.without_edges.get(&c).copied()
    }

    pub fn set_without_edge(&mut self, c: Component, to: TableId) {
        self.without_edges.insert(c, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(id: u32) -> Component {
        Component::new(id)
    }

    fn sig(ids: &[u32]) -> Signature {
        let mut sig = Signature::EMPTY;
        for &id in ids {
            sig = sig.with(c(id)).unwrap();
        }
        sig
    }

    fn e(id: u32) -> Entity {
        // Entity::new is pub(crate); tests live inside the crate so this is fine.
        crate::ecs::entity::Entity::new(id)
    }

    #[test]
    fn add_and_remove_round_trip() {
        let mut table = Table::new(TableId::new(0), sig(&[1]));
        let row = table.add(e(0));
        table.set(row, 0, crate::ecs::component::value(42u32));
        assert_eq!(*table.get(row, 0).unwrap().downcast_ref::<u32>().unwrap(), 42);
        assert_eq!(table.len(), 1);

        let removed = table.remove(row);
        assert_eq!(removed, e(0));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn reading_unwritten_cell_is_empty_cell_error() {
        let mut table = Table::new(TableId::new(0), sig(&[1]));
        let row = table.add(e(0));
        assert!(matches!(table.get(row, 0), Err(Error::EmptyCell(_, _, _))));
    }

    #[test]
    fn grows_geometrically_on_demand() {
        let mut table = Table::new(TableId::new(0), sig(&[1]));
        assert_eq!(table.capacity(), 0);
        for i in 0..5 {
            table.add(e(i));
        }
        assert_eq!(table.capacity(), 8);
        assert_eq!(table.high_water_mark(), Some(4));
    }

    #[test]
    fn freed_rows_are_reused_before_growing() {
        let mut table = Table::new(TableId::new(0), sig(&[1]));
        let rows: Vec<_> = (0..4).map(|i| table.add(e(i))).collect();
        assert_eq!(table.capacity(), 4);

        table.remove(rows[1]);
        table.remove(rows[3]);

        let reused_a = table.add(e(10));
        let reused_b = table.add(e(11));

        // Capacity unchanged: the two freed rows absorbed the new entities.
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.high_water_mark(), Some(3));
        let reused = [reused_a.index(), reused_b.index()];
        assert!(reused.contains(&rows[1].index()));
        assert!(reused.contains(&rows[3].index()));
    }

    #[test]
    fn hundred_entity_row_reuse_scenario() {
        let mut table = Table::new(TableId::new(0), sig(&[1]));
        let rows: Vec<_> = (0..100).map(|i| table.add(e(i))).collect();
        let hwm_before = table.high_water_mark();

        let freed: Vec<_> = rows.iter().step_by(2).copied().collect();
        for &row in &freed {
            table.remove(row);
        }
        assert_eq!(table.len(), 50);

        let reused: Vec<_> = (0..50).map(|i| table.add(e(1000 + i))).collect();

        assert_eq!(table.high_water_mark(), hwm_before);
        let freed_set: std::collections::HashSet<_> = freed.iter().map(|r| r.index()).collect();
        let reused_set: std::collections::HashSet<_> = reused.iter().map(|r| r.index()).collect();
        assert_eq!(freed_set, reused_set);
    }

    #[test]
    fn iter_yields_only_occupied_rows() {
        let mut table = Table::new(TableId::new(0), sig(&[1]));
        let r0 = table.add(e(0));
        let _r1 = table.add(e(1));
        let r2 = table.add(e(2));
        table.remove(r0);

        let mut seen: Vec<_> = table.iter().collect();
        seen.sort();
        assert_eq!(seen, vec![e(1), e(2)]);
        let _ = r2;
    }

    #[test]
    fn edge_caches_round_trip() {
        let mut table = Table::new(TableId::new(0), sig(&[1]));
        assert_eq!(table.with_edge(c(2)), None);
        table.set_with_edge(c(2), TableId::new(7));
        assert_eq!(table.with_edge(c(2)), Some(TableId::new(7)));

        assert_eq!(table.without_edge(c(1)), None);
        table.set_without_edge(c(1), TableId::new(0));
        assert_eq!(table.without_edge(c(1)), Some(TableId::new(0)));
    }
}
