//! A container backed by a Vec.

use super::{Container, ItemStack};

/// A fixed-size container, used for output buffers in the stub world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleContainer {
    items: Vec<ItemStack>,
}

impl SimpleContainer {
    /// Creates a new container with the given number of slots.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            items: vec![ItemStack::empty(); size],
        }
    }

    /// The slots, in order.
    #[must_use]
    pub fn items(&self) -> &[ItemStack] {
        &self.items
    }
}

impl Container for SimpleContainer {
    fn size(&self) -> usize {
        self.items.len()
    }

    fn get_item(&self, slot: usize) -> &ItemStack {
        &self.items[slot]
    }

    fn get_item_mut(&mut self, slot: usize) -> &mut ItemStack {
        &mut self.items[slot]
    }

    fn set_item(&mut self, slot: usize, item: ItemStack) {
        self.items[slot] = item;
    }

    fn clear(&mut self) {
        self.items.fill(ItemStack::empty());
    }
}
