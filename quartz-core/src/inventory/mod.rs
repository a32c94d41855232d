//! Item storage reachable through the world capability.
//!
//! Automation behaviors deliver their outputs into containers (chests, buffers)
//! next to the automated block. Containers are only ever borrowed for the
//! duration of one capability call.

mod container;
mod item_stack;
mod simple_container;

pub use container::Container;
pub use item_stack::ItemStack;
pub use simple_container::SimpleContainer;
