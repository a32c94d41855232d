//! Deterministic random sources.
//!
//! The engine itself never draws random numbers; these are used by the
//! headless runner and the tests to build reproducible site layouts.

mod xoroshiro;

pub use xoroshiro::Xoroshiro;

/// A seedable random number generator.
pub trait Random {
    /// Returns a random `i32`.
    fn next_i32(&mut self) -> i32;

    /// Returns a random `i32` in `0..bound`.
    fn next_i32_bounded(&mut self, bound: i32) -> i32;

    /// Returns a random `i32` in `min..=max`.
    fn next_i32_between(&mut self, min: i32, max: i32) -> i32 {
        self.next_i32_bounded(max - min + 1) + min
    }

    /// Returns a random `i64`.
    fn next_i64(&mut self) -> i64;

    /// Returns a random `bool`.
    fn next_bool(&mut self) -> bool;
}
