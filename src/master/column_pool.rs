use std::slice::Iter;
use crate::vars::VarId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnId(pub u32);

impl std::hash::Hash for ColumnId {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u32(self.0)
    }
}

impl nohash_hasher::IsEnabled for ColumnId {}

#[derive(Clone, Debug, PartialEq)]
/// Master variable.
///
/// Either the direct copy of an original variable (`block == None`) or a point or ray of
/// the pricing polytope of `block`, stored as the values of the representative original
/// variables.
pub struct MasterVar {
    pub block: Option<usize>,
    pub origvars: Vec<VarId>,
    pub origvals: Vec<f64>,
    pub is_ray: bool,
    pub obj: f64,
    /// local bounds, changed by branching and propagation
    pub lb: f64,
    pub ub: f64,
    /// coefficients in the rows of the master problem
    pub coefs: Vec<(usize, f64)>,
}

impl MasterVar {
    pub fn origval(&self, var: VarId) -> f64 {
        self.origvars.iter().position(|v| *v == var).map(|i| self.origvals[i]).unwrap_or(0.0)
    }

    fn same_point(&self, other: &MasterVar) -> bool {
        self.block == other.block
            && self.is_ray == other.is_ray
            && self.origvars == other.origvars
            && self.origvals.iter().zip(&other.origvals).all(|(a, b)| (a - b).abs() <= 1e-9)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub id: ColumnId,
    pub data: MasterVar,
}

/// Holds all columns generated so far
#[derive(Clone, Debug, Default)]
pub struct ColumnPool {
    local_column_counter: u32,
    columns: Vec<Column>,
    by_block: Vec<Vec<ColumnId>>,
}

impl ColumnPool {
    pub fn new(nblocks: usize) -> Self {
        ColumnPool {
            local_column_counter: 0,
            columns: Vec::new(),
            by_block: vec![vec![]; nblocks],
        }
    }

    /// Total number of columns in pool
    pub fn count(&self) -> usize {
        self.columns.len()
    }

    /// Returns a specific column from the pool
    pub fn get_column(&self, id: ColumnId) -> &Column {
        let column_at_index = &self.columns[id.0 as usize];

        // make sure that our assumption that columns are ordered in the column pool is correct
        // i.e. ids of lookup key and value match
        debug_assert_eq!(column_at_index.id.0, id.0);

        column_at_index
    }

    pub fn get_column_mut(&mut self, id: ColumnId) -> &mut Column {
        &mut self.columns[id.0 as usize]
    }

    pub fn iter(&self) -> Iter<'_, Column> {
        self.columns.iter()
    }

    pub fn columns_of_block(&self, block: usize) -> &[ColumnId] {
        &self.by_block[block]
    }

    /// Adds a column to the column pool.
    /// Returns `None` if the same point of the same block is already known.
    pub fn add_column(&mut self, column_data: MasterVar) -> Option<ColumnId> {
        if let Some(block) = column_data.block {
            let existing_column = self.by_block[block]
                .iter()
                .find(|id| self.columns[id.0 as usize].data.same_point(&column_data));

            if existing_column.is_some() {
                // there was the same column within the pool
                return None;
            }
        }

        #[cfg(feature = "validity_assertions")]
        {
            // direct copies are only created once per variable
            if column_data.block.is_none() {
                assert!(self.columns.iter().all(|c| c.data.block.is_some() || c.data.origvars != column_data.origvars));
            }
        }

        let id = ColumnId(self.local_column_counter);
        if let Some(block) = column_data.block {
            self.by_block[block].push(id);
        }
        self.local_column_counter += 1;
        self.columns.push(Column { id, data: column_data });

        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(block: usize, vals: Vec<f64>) -> MasterVar {
        MasterVar {
            block: Some(block),
            origvars: (0..vals.len() as u32).map(VarId).collect(),
            origvals: vals,
            is_ray: false,
            obj: 1.0,
            lb: 0.0,
            ub: f64::INFINITY,
            coefs: vec![],
        }
    }

    #[test]
    fn duplicate_points_are_rejected_per_block() {
        let mut pool = ColumnPool::new(2);
        assert_eq!(pool.add_column(column(0, vec![1.0, 0.0])), Some(ColumnId(0)));
        assert_eq!(pool.add_column(column(0, vec![1.0, 0.0])), None);
        assert_eq!(pool.add_column(column(1, vec![1.0, 0.0])), Some(ColumnId(1)));
        assert_eq!(pool.columns_of_block(0), &[ColumnId(0)]);
        assert_eq!(pool.count(), 2);
        assert_eq!(pool.get_column(ColumnId(1)).data.origval(VarId(0)), 1.0);
    }
}
