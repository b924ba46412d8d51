use pbc_parser::ast::Identifier;

/// Every slot is 4 bytes, whatever the declared type is.
pub const SLOT_SIZE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Named(Identifier),
    /// Holds the running value of a sum, has no name. A released temporary can be handed
    /// out again, named slots never are.
    Temporary { in_use: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Negative offset from %rbp.
    pub offset: i64,
    /// True if the slot was created by this call.
    pub fresh: bool,
}

/// Stack slots in allocation order. Slot `i` lives at `-4 * (i + 1)` from the frame base.
#[derive(Debug, Default)]
pub struct VariableTable {
    slots: Vec<Slot>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn offset_of(index: usize) -> i64 {
        -(index as i64 + 1) * i64::from(SLOT_SIZE)
    }

    fn index_of(offset: i64) -> Option<usize> {
        usize::try_from(-offset / i64::from(SLOT_SIZE) - 1).ok()
    }

    fn push(&mut self, slot: Slot) -> Allocation {
        self.slots.push(slot);
        Allocation {
            offset: Self::offset_of(self.slots.len() - 1),
            fresh: true,
        }
    }

    /// Returns the slot of `name`, allocating a new one the first time a name is seen.
    pub fn resolve(&mut self, name: &str) -> Allocation {
        match self.lookup(name) {
            Some(offset) => Allocation {
                offset,
                fresh: false,
            },
            None => self.push(Slot::Named(name.to_owned())),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<i64> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Slot::Named(slot_name) if slot_name == name))
            .map(Self::offset_of)
    }

    /// Reuses a released temporary if there is one.
    pub fn allocate_temporary(&mut self) -> Allocation {
        let free = self
            .slots
            .iter()
            .position(|slot| *slot == Slot::Temporary { in_use: false });

        match free {
            Some(index) => {
                self.slots[index] = Slot::Temporary { in_use: true };
                Allocation {
                    offset: Self::offset_of(index),
                    fresh: false,
                }
            }
            None => self.push(Slot::Temporary { in_use: true }),
        }
    }

    /// Does nothing for offsets that do not belong to a temporary.
    pub fn release_temporary(&mut self, offset: i64) {
        let slot = Self::index_of(offset).and_then(|index| self.slots.get_mut(index));

        if let Some(Slot::Temporary { in_use }) = slot {
            *in_use = false;
        }
    }

    /// Bytes currently taken by all slots, released temporaries included.
    pub fn storage_bytes(&self) -> u32 {
        u32::try_from(self.slots.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(SLOT_SIZE)
    }
}
