//! Direction-aware tick counting for a two-line rotary encoder.
//!
//! Line A raises the edge interrupt; the level of line B at that instant gives
//! the direction. The count is shared between the interrupt handler (the only
//! writer) and the control loop (readers), so it lives in an atomic and a read
//! can never observe a half-written value.

use core::sync::atomic::{AtomicI32, Ordering};

use embedded_hal::digital::InputPin;

/// Tick counter written from the encoder edge handler.
///
/// `const`-constructible so it can be placed in a `static` reachable from
/// both the interrupt and the control loop.
#[derive(Debug)]
pub struct TickCounter {
    count: AtomicI32,
    direction_invert: bool,
}

impl TickCounter {
    pub const fn new(direction_invert: bool) -> Self {
        Self {
            count: AtomicI32::new(0),
            direction_invert,
        }
    }

    /// Record one edge on line A, given the level of line B.
    pub fn on_edge(
        &self,
        b_is_high: bool,
    ) {
        if b_is_high {
            self.count.fetch_sub(1, Ordering::Relaxed);
        } else {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current count, sign-corrected for the mounting direction.
    pub fn get_count(&self) -> i32 {
        let count = self.count.load(Ordering::Relaxed);
        if self.direction_invert {
            count.wrapping_neg()
        } else {
            count
        }
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
    }

    pub fn direction_invert(&self) -> bool {
        self.direction_invert
    }
}

/// Edge-handler side of an encoder: a counter plus the direction line.
pub struct EncoderChannel<'a, B> {
    counter: &'a TickCounter,
    line_b: B,
}

impl<'a, B: InputPin> EncoderChannel<'a, B> {
    pub fn new(
        counter: &'a TickCounter,
        line_b: B,
    ) -> Self {
        Self { counter, line_b }
    }

    /// Call from the line A edge interrupt.
    ///
    /// A failed read of line B drops the edge and leaves the count untouched.
    pub fn on_edge(&mut self) -> Result<(), B::Error> {
        let b_is_high = self.line_b.is_high()?;
        self.counter.on_edge(b_is_high);
        Ok(())
    }

    pub fn counter(&self) -> &'a TickCounter {
        self.counter
    }

    /// Consume the channel and return the direction line.
    pub fn free(self) -> B {
        self.line_b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_line_b() {
        let counter = TickCounter::new(false);
        counter.on_edge(false);
        counter.on_edge(false);
        counter.on_edge(true);
        assert_eq!(counter.get_count(), 1);
    }

    #[test]
    fn test_inverted_counter_negates_reads() {
        let counter = TickCounter::new(true);
        for _ in 0..5 {
            counter.on_edge(false);
        }
        assert_eq!(counter.get_count(), -5);
        counter.reset();
        assert_eq!(counter.get_count(), 0);
    }

    #[test]
    fn test_static_counter() {
        static TICKS: TickCounter = TickCounter::new(false);
        TICKS.on_edge(true);
        assert_eq!(TICKS.get_count(), -1);
    }
}
