//! A stack of identical items.

use quartz_utils::Identifier;
use serde::{Deserialize, Serialize};

/// The item id used for empty slots.
pub const AIR: Identifier = Identifier::vanilla_static("air");

/// Default per-slot stack limit.
pub const DEFAULT_MAX_STACK_SIZE: u32 = 64;

/// An item identifier and a count. A count of zero is an empty slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    /// The item.
    pub item: Identifier,
    /// How many items are in the stack.
    pub count: u32,
}

impl ItemStack {
    /// Creates a stack of `count` items.
    #[must_use]
    pub fn new(item: Identifier, count: u32) -> Self {
        Self { item, count }
    }

    /// An empty stack.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            item: AIR,
            count: 0,
        }
    }

    /// Returns true if this stack holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0 || self.item == AIR
    }

    /// Returns true if both stacks hold the same item, ignoring count.
    #[must_use]
    pub fn is_same_item(&self, other: &ItemStack) -> bool {
        self.item == other.item
    }

    /// Splits off up to `amount` items into a new stack.
    pub fn split(&mut self, amount: u32) -> ItemStack {
        let taken = amount.min(self.count);
        let result = ItemStack::new(self.item.clone(), taken);
        self.shrink(taken);
        result
    }

    /// Removes `amount` items, clearing the stack when it runs out.
    pub fn shrink(&mut self, amount: u32) {
        self.count = self.count.saturating_sub(amount);
        if self.count == 0 {
            *self = ItemStack::empty();
        }
    }

    /// Returns a copy of `self` with the given count.
    #[must_use]
    pub fn copy_with_count(&self, count: u32) -> ItemStack {
        ItemStack::new(self.item.clone(), count)
    }
}

impl Default for ItemStack {
    fn default() -> Self {
        Self::empty()
    }
}
