//! Container trait for item storage.

use quartz_utils::Identifier;

use super::item_stack::{DEFAULT_MAX_STACK_SIZE, ItemStack};

/// Something that stores items in slots: chests, output buffers, machine inventories.
///
/// Insertion is all-or-nothing so an automation site either delivers its whole
/// output or nothing, which keeps a rolled back tick free of half-delivered stacks.
pub trait Container: Send + Sync {
    /// Returns the number of slots in this container.
    fn size(&self) -> usize;

    /// Returns true if all slots are empty.
    fn is_empty(&self) -> bool {
        (0..self.size()).all(|slot| self.get_item(slot).is_empty())
    }

    /// Gets the item in the given slot.
    fn get_item(&self, slot: usize) -> &ItemStack;

    /// Gets a mutable reference to the item in the given slot.
    fn get_item_mut(&mut self, slot: usize) -> &mut ItemStack;

    /// Sets the item in the given slot.
    fn set_item(&mut self, slot: usize, item: ItemStack);

    /// Returns the maximum stack size this container allows.
    fn max_stack_size(&self) -> u32 {
        DEFAULT_MAX_STACK_SIZE
    }

    /// Clears all items from this container.
    fn clear(&mut self) {
        for slot in 0..self.size() {
            self.set_item(slot, ItemStack::empty());
        }
    }

    /// Number of slots holding nothing.
    fn empty_slots(&self) -> usize {
        (0..self.size())
            .filter(|&slot| self.get_item(slot).is_empty())
            .count()
    }

    /// Total number of `item` across all slots.
    fn count_of(&self, item: &Identifier) -> u32 {
        (0..self.size())
            .map(|slot| self.get_item(slot))
            .filter(|stack| !stack.is_empty() && stack.item == *item)
            .map(|stack| stack.count)
            .sum()
    }

    /// How many more of `stack`'s item fit, merging into partial stacks and empty slots.
    fn space_for(&self, stack: &ItemStack) -> u32 {
        let max = self.max_stack_size();
        (0..self.size())
            .map(|slot| self.get_item(slot))
            .map(|existing| {
                if existing.is_empty() {
                    max
                } else if existing.is_same_item(stack) {
                    max.saturating_sub(existing.count)
                } else {
                    0
                }
            })
            .fold(0u32, u32::saturating_add)
    }

    /// Inserts the whole stack or nothing. Returns false if it does not fit.
    fn insert(&mut self, stack: &ItemStack) -> bool {
        if stack.is_empty() {
            return true;
        }
        if self.space_for(stack) < stack.count {
            return false;
        }

        let max = self.max_stack_size();
        let mut remaining = stack.count;

        // Top up partial stacks first, then fill empty slots.
        for slot in 0..self.size() {
            if remaining == 0 {
                break;
            }
            let existing = self.get_item_mut(slot);
            if !existing.is_empty() && existing.is_same_item(stack) {
                let moved = remaining.min(max.saturating_sub(existing.count));
                existing.count += moved;
                remaining -= moved;
            }
        }
        for slot in 0..self.size() {
            if remaining == 0 {
                break;
            }
            if self.get_item(slot).is_empty() {
                let moved = remaining.min(max);
                self.set_item(slot, stack.copy_with_count(moved));
                remaining -= moved;
            }
        }

        true
    }

    /// Removes up to `count` of `item`, last slot first. Returns how many were removed.
    fn extract(&mut self, item: &Identifier, count: u32) -> u32 {
        let mut remaining = count;
        for slot in (0..self.size()).rev() {
            if remaining == 0 {
                break;
            }
            let existing = self.get_item_mut(slot);
            if !existing.is_empty() && existing.item == *item {
                remaining -= existing.split(remaining).count;
            }
        }
        count - remaining
    }
}
