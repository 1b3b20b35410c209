use super::*;
use crate::error::CoalesceError;

impl BasicBlock {
    /// Create a new, empty basic block
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            preds: Vec::new(),
            schedule: Vec::new(),
        }
    }
}

impl Default for Function {
    fn default() -> Self {
        Self::new()
    }
}

impl Function {
    /// Create a new empty function with a pinned schedule
    pub fn new() -> Self {
        Self {
            name: None,
            blocks: Vec::new(),
            values: Vec::new(),
            entry: BlockId(0),
            classes: Vec::new(),
            schedule_state: ScheduleState::Pinned,
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }

    /// Register a class with `num_regs` registers, of which `allocatable` may be handed out
    pub fn add_class(
        &mut self,
        name: impl Into<String>,
        num_regs: usize,
        allocatable: RegSet,
    ) -> RegClassId {
        let id = RegClassId(self.classes.len() as u8);
        self.classes.push(RegClass {
            id,
            name: name.into(),
            num_regs,
            allocatable,
        });
        id
    }

    pub fn class(&self, id: RegClassId) -> Option<&RegClass> {
        self.classes.get(id.0 as usize)
    }

    /// Allocate a new basic block
    pub fn alloc_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id));
        id
    }

    /// Add a control-flow edge; `from` becomes the next predecessor of `to`
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(to).preds.push(from);
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    pub fn has_block(&self, id: BlockId) -> bool {
        id.index() < self.blocks.len()
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn has_value(&self, id: ValueId) -> bool {
        id.index() < self.values.len()
    }

    /// Append a value to `block`'s schedule; phis go after the existing phis
    pub fn add_value(
        &mut self,
        block: BlockId,
        kind: ValueKind,
        class: Option<RegClassId>,
        requirement: Requirement,
    ) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        let is_phi = matches!(kind, ValueKind::Phi { .. });
        self.values.push(Value {
            id,
            block,
            kind,
            class,
            requirement,
        });

        if is_phi {
            let first_non_phi = self.blocks[block.index()]
                .schedule
                .iter()
                .position(|v| !self.is_phi(*v));
            let schedule = &mut self.blocks[block.index()].schedule;
            match first_non_phi {
                Some(pos) => schedule.insert(pos, id),
                None => schedule.push(id),
            }
        } else {
            self.blocks[block.index()].schedule.push(id);
        }
        id
    }

    pub fn add_param(&mut self, block: BlockId, class: RegClassId) -> ValueId {
        self.add_value(block, ValueKind::Param, Some(class), Requirement::Any)
    }

    pub fn add_op(&mut self, block: BlockId, class: RegClassId, operands: Vec<ValueId>) -> ValueId {
        self.add_value(
            block,
            ValueKind::Op { operands },
            Some(class),
            Requirement::Any,
        )
    }

    /// Operation without a result register (stores, branches, calls' side effects)
    pub fn add_effect(&mut self, block: BlockId, operands: Vec<ValueId>) -> ValueId {
        self.add_value(block, ValueKind::Op { operands }, None, Requirement::None)
    }

    pub fn add_phi(&mut self, block: BlockId, class: RegClassId, args: Vec<ValueId>) -> ValueId {
        self.add_value(block, ValueKind::Phi { args }, Some(class), Requirement::Any)
    }

    /// Add a permutation of `sources` and one projection per source.
    ///
    /// Projection `i` takes the class of `sources[i]`.
    pub fn add_perm(&mut self, block: BlockId, sources: Vec<ValueId>) -> (ValueId, Vec<ValueId>) {
        let classes: Vec<Option<RegClassId>> =
            sources.iter().map(|src| self.value(*src).class).collect();
        let perm = self.add_value(block, ValueKind::Perm { sources }, None, Requirement::None);
        let projs = classes
            .into_iter()
            .enumerate()
            .map(|(index, class)| {
                self.add_value(
                    block,
                    ValueKind::PermProj { perm, index },
                    class,
                    Requirement::Any,
                )
            })
            .collect();
        (perm, projs)
    }

    pub fn set_requirement(&mut self, value: ValueId, requirement: Requirement) {
        self.values[value.index()].requirement = requirement;
    }

    pub fn set_schedule_state(&mut self, state: ScheduleState) {
        self.schedule_state = state;
    }

    pub fn is_phi(&self, value: ValueId) -> bool {
        matches!(self.value(value).kind, ValueKind::Phi { .. })
    }

    /// Values read by `value`, in operand order
    pub fn operands(&self, value: ValueId) -> &[ValueId] {
        let v = self.value(value);
        match &v.kind {
            ValueKind::Param => &[],
            ValueKind::Op { operands } => operands,
            ValueKind::Phi { args } => args,
            ValueKind::Perm { sources } => sources,
            ValueKind::PermProj { perm, .. } => std::slice::from_ref(perm),
        }
    }

    /// The permutation input a projection is paired with
    pub fn perm_source(&self, proj: ValueId) -> Option<ValueId> {
        let ValueKind::PermProj { perm, index } = self.value(proj).kind else {
            return None;
        };
        match &self.value(perm).kind {
            ValueKind::Perm { sources } => sources.get(index).copied(),
            _ => None,
        }
    }

    /// Successor blocks, derived from the predecessor lists
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        let mut succs = Vec::new();
        for candidate in &self.blocks {
            if candidate.preds.contains(&block) && !succs.contains(&candidate.id) {
                succs.push(candidate.id);
            }
        }
        succs
    }

    /// Def-use index: `users[v]` lists every operand slot reading `v`
    pub fn users(&self) -> Vec<Vec<Use>> {
        let mut users = vec![Vec::new(); self.values.len()];
        for value in &self.values {
            for (pos, &operand) in self.operands(value.id).iter().enumerate() {
                if let Some(slot) = users.get_mut(operand.index()) {
                    slot.push(Use {
                        user: value.id,
                        pos,
                    });
                }
            }
        }
        users
    }

    /// Uses of a single value
    pub fn users_of(&self, value: ValueId) -> Vec<Use> {
        let mut uses = Vec::new();
        for user in &self.values {
            for (pos, &operand) in self.operands(user.id).iter().enumerate() {
                if operand == value {
                    uses.push(Use { user: user.id, pos });
                }
            }
        }
        uses
    }

    /// Values of `class` that the allocator manages
    pub fn class_values(&self, class: RegClassId) -> impl Iterator<Item = ValueId> + '_ {
        self.values
            .iter()
            .filter(move |v| v.class == Some(class) && !v.requirement.is_ignore())
            .map(|v| v.id)
    }

    /// Check structural well-formedness of the graph
    pub fn validate(&self) -> Result<(), CoalesceError> {
        for value in &self.values {
            if !self.has_block(value.block) {
                return Err(CoalesceError::UndefinedBlock {
                    user: value.id,
                    block: value.block,
                });
            }
            if let Some(class) = value.class
                && self.class(class).is_none()
            {
                return Err(CoalesceError::UnknownClass(class));
            }
            for &operand in self.operands(value.id) {
                if !self.has_value(operand) {
                    return Err(CoalesceError::UndefinedOperand {
                        user: value.id,
                        operand,
                    });
                }
            }
            match &value.kind {
                ValueKind::Phi { args } => {
                    let preds = self.block(value.block).preds.len();
                    if args.len() != preds {
                        return Err(CoalesceError::PhiArity {
                            phi: value.id,
                            block: value.block,
                            args: args.len(),
                            preds,
                        });
                    }
                }
                ValueKind::PermProj { perm, index } => match &self.value(*perm).kind {
                    ValueKind::Perm { sources } if *index < sources.len() => {}
                    ValueKind::Perm { sources } => {
                        return Err(CoalesceError::ProjectionOutOfRange {
                            proj: value.id,
                            perm: *perm,
                            index: *index,
                            len: sources.len(),
                        });
                    }
                    _ => return Err(CoalesceError::NotAPermutation { proj: value.id }),
                },
                ValueKind::Param | ValueKind::Op { .. } | ValueKind::Perm { .. } => {}
            }
        }
        self.validate_schedules()
    }

    /// Every value sits exactly once in the schedule of its own block
    fn validate_schedules(&self) -> Result<(), CoalesceError> {
        let mut seen = vec![0usize; self.values.len()];
        for block in &self.blocks {
            for &value in &block.schedule {
                let Some(count) = seen.get_mut(value.index()) else {
                    return Err(CoalesceError::UnknownScheduledValue {
                        block: block.id,
                        value,
                    });
                };
                *count += 1;
                let home = self.value(value).block;
                if home != block.id {
                    return Err(CoalesceError::MisplacedValue {
                        value,
                        block: block.id,
                        home,
                    });
                }
            }
        }
        match seen.iter().position(|&count| count != 1) {
            Some(index) => Err(CoalesceError::ScheduleCount {
                value: self.values[index].id,
                count: seen[index],
            }),
            None => Ok(()),
        }
    }

    /// Check that every managed value of `class` holds a register of that class
    pub fn check_coloring(
        &self,
        coloring: &Coloring,
        class: RegClassId,
    ) -> Result<(), CoalesceError> {
        let info = self.class(class).ok_or(CoalesceError::UnknownClass(class))?;
        for value in self.class_values(class) {
            let reg = coloring.get(value).ok_or(CoalesceError::Unassigned(value))?;
            if reg.index() >= info.num_regs {
                return Err(CoalesceError::RegisterOutOfClass {
                    value,
                    reg,
                    class: info.name.clone(),
                });
            }
        }
        Ok(())
    }
}
