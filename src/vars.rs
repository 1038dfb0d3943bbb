use crate::master::column_pool::{ColumnId, ColumnPool, MasterVar};
use crate::problem::VarType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
/// Original variable, index into the variables of the original problem
pub struct VarId(pub u32);

impl std::hash::Hash for VarId {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u32(self.0)
    }
}

impl nohash_hasher::IsEnabled for VarId {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Variable `index` of the pricing problem of `block`
pub struct PricingVarId {
    pub block: usize,
    pub index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockAssignment {
    Block(usize),
    /// not assigned to any block, transferred directly to the master
    Master,
    /// part of several blocks
    Linking,
}

impl BlockAssignment {
    /// Block number with `-1` for master variables and `-2` for linking variables
    pub fn number(&self) -> i32 {
        match self {
            BlockAssignment::Block(b) => *b as i32,
            BlockAssignment::Master => -1,
            BlockAssignment::Linking => -2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    Original,
    Pricing,
    Master,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarRef {
    Original(VarId),
    Pricing(PricingVarId),
    Master(ColumnId),
}

impl VarRef {
    pub fn kind(&self) -> VarKind {
        match self {
            VarRef::Original(_) => VarKind::Original,
            VarRef::Pricing(_) => VarKind::Pricing,
            VarRef::Master(_) => VarKind::Master,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OrigVar {
    pub name: String,
    pub vtype: VarType,
    pub obj: f64,
    pub lb: f64,
    pub ub: f64,
    /// bounds at the active search node
    pub local_lb: f64,
    pub local_ub: f64,
    pub block: BlockAssignment,
    /// identical copy the variable belongs to within its block
    pub copy: usize,
    /// one pricing variable per block the variable is part of
    pub pricing: Vec<PricingVarId>,
    /// master copy of variables that are not assigned to a block or linking
    pub direct: Option<ColumnId>,
    /// columns containing this variable with their coefficient
    pub master_vars: Vec<(ColumnId, f64)>,
}

#[derive(Clone, Debug)]
pub struct PricingVar {
    pub id: PricingVarId,
    /// one original variable per identical copy, representative first
    pub origvars: Vec<VarId>,
}

#[derive(Clone, Debug)]
pub struct BlockInfo {
    pub multiplicity: usize,
    /// `copies[c][k]` is the original variable of pricing variable `k` in copy `c`
    pub copies: Vec<Vec<VarId>>,
}

/// Bidirectional mapping between original, pricing and master variables
pub struct VarStore {
    pub orig: Vec<OrigVar>,
    pub pricing: Vec<Vec<PricingVar>>,
    pub blocks: Vec<BlockInfo>,
    pub columns: ColumnPool,
}

impl VarStore {
    pub fn nblocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn num_orig(&self) -> usize {
        self.orig.len()
    }

    pub fn multiplicity(&self, block: usize) -> usize {
        self.blocks[block].multiplicity
    }

    pub fn orig(&self, var: VarId) -> &OrigVar {
        &self.orig[var.0 as usize]
    }

    pub fn orig_mut(&mut self, var: VarId) -> &mut OrigVar {
        &mut self.orig[var.0 as usize]
    }

    pub fn pricing_var(&self, var: PricingVarId) -> &PricingVar {
        &self.pricing[var.block][var.index]
    }

    pub fn column(&self, id: ColumnId) -> &MasterVar {
        &self.columns.get_column(id).data
    }

    pub fn column_mut(&mut self, id: ColumnId) -> &mut MasterVar {
        &mut self.columns.get_column_mut(id).data
    }

    /// Adds a column and registers it at every original variable it contains
    pub fn add_column(&mut self, column: MasterVar) -> Option<ColumnId> {
        let entries: Vec<(VarId, f64)> = column.origvars.iter().copied().zip(column.origvals.iter().copied()).collect();
        let id = self.columns.add_column(column)?;
        for (var, val) in entries {
            self.orig[var.0 as usize].master_vars.push((id, val));
        }
        Some(id)
    }

    /// Block number of any variable, `-1` for master copies and unassigned variables
    pub fn block(&self, var: VarRef) -> i32 {
        match var {
            VarRef::Original(v) => self.orig(v).block.number(),
            VarRef::Pricing(p) => p.block as i32,
            VarRef::Master(c) => self.column(c).block.map(|b| b as i32).unwrap_or(-1),
        }
    }

    pub fn master_origvars(&self, var: VarRef) -> &[VarId] {
        let VarRef::Master(c) = var else {
            panic!("master_origvars called on {:?} variable", var.kind());
        };
        &self.column(c).origvars
    }

    pub fn master_origvals(&self, var: VarRef) -> &[f64] {
        let VarRef::Master(c) = var else {
            panic!("master_origvals called on {:?} variable", var.kind());
        };
        &self.column(c).origvals
    }

    pub fn master_norigvars(&self, var: VarRef) -> usize {
        self.master_origvars(var).len()
    }

    pub fn master_is_ray(&self, var: VarRef) -> bool {
        let VarRef::Master(c) = var else {
            panic!("master_is_ray called on {:?} variable", var.kind());
        };
        self.column(c).is_ray
    }

    pub fn pricing_origvars(&self, var: VarRef) -> &[VarId] {
        let VarRef::Pricing(p) = var else {
            panic!("pricing_origvars called on {:?} variable", var.kind());
        };
        &self.pricing_var(p).origvars
    }

    pub fn orig_pricing_vars(&self, var: VarRef) -> &[PricingVarId] {
        let VarRef::Original(v) = var else {
            panic!("orig_pricing_vars called on {:?} variable", var.kind());
        };
        &self.orig(v).pricing
    }

    pub fn orig_master_vars(&self, var: VarRef) -> &[(ColumnId, f64)] {
        let VarRef::Original(v) = var else {
            panic!("orig_master_vars called on {:?} variable", var.kind());
        };
        &self.orig(v).master_vars
    }

    /// Block of a pricing solution's variable in copy `copy`
    pub fn copy_var(&self, block: usize, copy: usize, rep: VarId) -> VarId {
        let k = self.orig(rep).pricing.iter().find(|p| p.block == block).map(|p| p.index);
        match k {
            Some(k) => self.blocks[block].copies[copy][k],
            None => panic!("variable {} is not part of block {}", rep.0, block),
        }
    }

    pub fn is_linking(&self, var: VarId) -> bool {
        self.orig(var).block == BlockAssignment::Linking
    }
}
