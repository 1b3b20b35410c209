use std::fmt;

/// Physical register index within its class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PReg(pub u8);

impl PReg {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Register class identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegClassId(pub u8);

/// A set of up to 64 physical registers of one class.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RegSet {
    bits: u64,
}

impl RegSet {
    pub const MAX_REGS: usize = 64;

    /// Create an empty set.
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Registers `0..n`.
    pub const fn first_n(n: usize) -> Self {
        debug_assert!(n <= Self::MAX_REGS);
        if n >= Self::MAX_REGS {
            Self { bits: u64::MAX }
        } else {
            Self {
                bits: (1u64 << n) - 1,
            }
        }
    }

    /// Add a register, returning the new value.
    pub const fn with(self, reg: PReg) -> Self {
        debug_assert!(reg.index() < Self::MAX_REGS);
        Self {
            bits: self.bits | (1u64 << reg.0),
        }
    }

    pub fn contains(&self, reg: PReg) -> bool {
        reg.index() < Self::MAX_REGS && self.bits & (1u64 << reg.0) != 0
    }

    pub fn insert(&mut self, reg: PReg) {
        debug_assert!(reg.index() < Self::MAX_REGS);
        self.bits |= 1u64 << reg.0;
    }

    pub fn remove(&mut self, reg: PReg) {
        if reg.index() < Self::MAX_REGS {
            self.bits &= !(1u64 << reg.0);
        }
    }

    pub const fn intersect(self, other: RegSet) -> RegSet {
        RegSet {
            bits: self.bits & other.bits,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub const fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Lowest register in the set.
    pub fn first(&self) -> Option<PReg> {
        self.iter().next()
    }

    pub fn iter(&self) -> RegSetIter {
        RegSetIter { bits: self.bits }
    }
}

impl fmt::Debug for RegSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<PReg> for RegSet {
    fn from_iter<T: IntoIterator<Item = PReg>>(iter: T) -> Self {
        let mut set = RegSet::empty();
        for reg in iter {
            set.insert(reg);
        }
        set
    }
}

impl IntoIterator for RegSet {
    type Item = PReg;
    type IntoIter = RegSetIter;

    fn into_iter(self) -> RegSetIter {
        self.iter()
    }
}

/// Ascending iterator over a [`RegSet`]
pub struct RegSetIter {
    bits: u64,
}

impl Iterator for RegSetIter {
    type Item = PReg;

    fn next(&mut self) -> Option<PReg> {
        if self.bits == 0 {
            return None;
        }
        let index = self.bits.trailing_zeros();
        self.bits &= !(1u64 << index);
        Some(PReg(index as u8))
    }
}

/// Register class description
#[derive(Debug, Clone)]
pub struct RegClass {
    pub id: RegClassId,
    pub name: String,
    pub num_regs: usize,
    /// Registers the allocator may hand out (excludes stack/frame pointers etc.)
    pub allocatable: RegSet,
}

/// Bitmask over operand positions of a value
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OperandMask(pub u32);

impl OperandMask {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn from_positions(positions: &[usize]) -> Self {
        let mut mask = 0u32;
        for &pos in positions {
            debug_assert!(pos < 32);
            mask |= 1u32 << pos;
        }
        Self(mask)
    }

    pub const fn contains(&self, pos: usize) -> bool {
        pos < 32 && self.0 & (1u32 << pos) != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Ascending operand positions in the mask
    pub fn positions(self) -> impl Iterator<Item = usize> {
        let bits = self.0;
        (0..32usize).filter(move |pos| bits & (1u32 << pos) != 0)
    }
}

impl fmt::Debug for OperandMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.positions()).finish()
    }
}

/// Register requirement on a value's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    /// No register needed
    #[default]
    None,
    /// Any allocatable register of the class
    Any,
    /// Only registers in the given subset
    Limited(RegSet),
    /// Should share a register with the operands in the mask (two-address code)
    SameAs(OperandMask),
    /// Must not share a register with the operands in the mask
    DifferentFrom(OperandMask),
    /// Not managed by the allocator (stack pointer, zero register, ...)
    Ignore,
}

impl Requirement {
    pub fn is_ignore(&self) -> bool {
        matches!(self, Requirement::Ignore)
    }

    /// Registers of `class` this requirement admits
    pub fn admissible(&self, class: &RegClass) -> RegSet {
        match self {
            Requirement::Limited(set) => class.allocatable.intersect(*set),
            Requirement::Ignore => RegSet::empty(),
            Requirement::None
            | Requirement::Any
            | Requirement::SameAs(_)
            | Requirement::DifferentFrom(_) => class.allocatable,
        }
    }
}
