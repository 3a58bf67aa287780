//! Blocking delays.

use crate::rcc::clocks;
use crate::tick::{self, Timebase};

/// A delay provided by busy-looping on the core clock.
pub struct CycleDelay;

impl embedded_hal::delay::DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = ns as u64 * clocks().sysclk.to_Hz() as u64 / 1_000_000_000;
        cortex_m::asm::delay(cycles as u32);
    }

    fn delay_us(&mut self, us: u32) {
        let cycles = us as u64 * clocks().sysclk.to_Hz() as u64 / 1_000_000;
        cortex_m::asm::delay(cycles.min(u32::MAX as u64) as u32);
    }

    fn delay_ms(&mut self, ms: u32) {
        let cycles_per_ms = clocks().sysclk.to_Hz() / 1_000;

        for _ in 0..ms {
            cortex_m::asm::delay(cycles_per_ms);
        }
    }
}

/// A delay counted in ticks of the millisecond tick.
///
/// Waits at least one whole tick past the requested time, so a delay of `n`
/// milliseconds never returns early even when it starts just before a tick.
/// Sub-millisecond requests are rounded up.
pub struct TickDelay<TB: Timebase = tick::GlobalTick> {
    timebase: TB,
}

impl TickDelay {
    /// Delay on the global tick counter. The tick interrupt must be running.
    pub const fn new() -> Self {
        Self {
            timebase: tick::GlobalTick,
        }
    }
}

impl Default for TickDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl<TB: Timebase> TickDelay<TB> {
    pub fn with_timebase(timebase: TB) -> Self {
        Self { timebase }
    }

    pub fn free(self) -> TB {
        self.timebase
    }

    /// Block for `ms` milliseconds plus one tick.
    pub fn delay(&mut self, ms: u32) {
        let start = self.timebase.now();
        let wait = ms.saturating_add(tick::tick_freq().ms_per_tick());
        while self.timebase.now().wrapping_sub(start) < wait {}
    }
}

impl<TB: Timebase> embedded_hal::delay::DelayNs for TickDelay<TB> {
    fn delay_ns(&mut self, ns: u32) {
        self.delay(ns.div_ceil(1_000_000))
    }

    fn delay_us(&mut self, us: u32) {
        self.delay(us.div_ceil(1_000))
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay(ms)
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::delay::DelayNs;

    use super::*;
    use crate::test_util::{global_lock, CountingTimebase};

    #[test]
    fn waits_one_extra_tick() {
        let _guard = global_lock();
        tick::set_tick_freq(tick::TickFreq::Hz1000);

        let mut delay = TickDelay::with_timebase(CountingTimebase::default());
        delay.delay_ms(10);
        let tb = delay.free();
        // one read for the start, then one per elapsed millisecond
        assert_eq!(tb.ms, 12);
    }

    #[test]
    fn short_delays_round_up() {
        let _guard = global_lock();
        tick::set_tick_freq(tick::TickFreq::Hz1000);

        let mut delay = TickDelay::with_timebase(CountingTimebase::default());
        delay.delay_us(1);
        assert_eq!(delay.free().ms, 3);

        let mut delay = TickDelay::with_timebase(CountingTimebase::default());
        delay.delay_ns(0);
        assert_eq!(delay.free().ms, 2);
    }

    #[test]
    fn slow_tick_adds_ten_milliseconds() {
        let _guard = global_lock();
        tick::set_tick_freq(tick::TickFreq::Hz100);

        let mut delay = TickDelay::with_timebase(CountingTimebase::default());
        delay.delay_ms(5);
        assert_eq!(delay.free().ms, 16);

        tick::set_tick_freq(tick::TickFreq::Hz1000);
    }
}
