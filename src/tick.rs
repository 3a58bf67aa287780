//! Millisecond tick.
//!
//! Every bounded wait in the HAL reads a free-running millisecond counter
//! through [`Timebase`]. The default [`SysTickTimebase`] drives the global
//! counter from SysTick; with the `rt` feature the SysTick exception handler
//! is provided by this crate and calls [`increment`].

use portable_atomic::{AtomicU32, Ordering};

use crate::time::Hertz;

static TICKS: AtomicU32 = AtomicU32::new(0);
static MS_PER_TICK: AtomicU32 = AtomicU32::new(TickFreq::Hz1000.ms_per_tick());

/// Tick interrupt rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickFreq {
    Hz1000,
    /// Used while SYSCLK runs from a low-speed source.
    Hz100,
}

impl TickFreq {
    pub const fn hz(self) -> u32 {
        match self {
            TickFreq::Hz1000 => 1000,
            TickFreq::Hz100 => 100,
        }
    }

    /// Milliseconds added to the counter on every tick.
    pub const fn ms_per_tick(self) -> u32 {
        1000 / self.hz()
    }
}

/// Source of the millisecond time used by timeout loops.
pub trait Timebase {
    /// Current tick count in milliseconds. Wraps.
    fn now(&mut self) -> u32;

    /// Reprogram the tick generator after HCLK changed.
    fn reconfigure(&mut self, hclk: Hertz, freq: TickFreq);
}

impl<T: Timebase + ?Sized> Timebase for &mut T {
    fn now(&mut self) -> u32 {
        T::now(self)
    }

    fn reconfigure(&mut self, hclk: Hertz, freq: TickFreq) {
        T::reconfigure(self, hclk, freq)
    }
}

/// Advance the global counter by one tick. Call this from the tick interrupt.
#[inline]
pub fn increment() {
    TICKS.fetch_add(MS_PER_TICK.load(Ordering::Relaxed), Ordering::Relaxed);
}

/// Global millisecond counter.
#[inline]
pub fn now() -> u32 {
    TICKS.load(Ordering::Relaxed)
}

/// Rate the global counter currently assumes.
pub fn tick_freq() -> TickFreq {
    match MS_PER_TICK.load(Ordering::Relaxed) {
        1 => TickFreq::Hz1000,
        _ => TickFreq::Hz100,
    }
}

pub(crate) fn set_tick_freq(freq: TickFreq) {
    MS_PER_TICK.store(freq.ms_per_tick(), Ordering::Relaxed);
}

/// Poll `cond` until it holds or more than `budget_ms` milliseconds passed.
///
/// Returns `None` on timeout. The condition is checked before the clock, so a
/// condition that is already true never times out.
pub(crate) fn wait_for<TB: Timebase + ?Sized>(
    tb: &mut TB,
    budget_ms: u32,
    mut cond: impl FnMut() -> bool,
) -> Option<()> {
    let start = tb.now();
    loop {
        if cond() {
            return Some(());
        }
        if tb.now().wrapping_sub(start) > budget_ms {
            return None;
        }
    }
}

/// The global counter as a [`Timebase`], for code that only reads the time.
///
/// `reconfigure` records the new rate; reprogramming the tick source is left
/// to its owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalTick;

impl Timebase for GlobalTick {
    fn now(&mut self) -> u32 {
        now()
    }

    fn reconfigure(&mut self, _hclk: Hertz, freq: TickFreq) {
        set_tick_freq(freq);
    }
}

/// SysTick driven tick on the core clock.
pub struct SysTickTimebase {
    syst: cortex_m::peripheral::SYST,
}

impl SysTickTimebase {
    pub fn new(syst: cortex_m::peripheral::SYST) -> Self {
        Self { syst }
    }

    pub fn free(self) -> cortex_m::peripheral::SYST {
        self.syst
    }
}

impl Timebase for SysTickTimebase {
    fn now(&mut self) -> u32 {
        now()
    }

    fn reconfigure(&mut self, hclk: Hertz, freq: TickFreq) {
        use cortex_m::peripheral::syst::SystClkSource;

        set_tick_freq(freq);

        let reload = (hclk.0 / freq.hz()).saturating_sub(1).min(0x00FF_FFFF);
        self.syst.disable_counter();
        self.syst.set_clock_source(SystClkSource::Core);
        self.syst.set_reload(reload);
        self.syst.clear_current();
        self.syst.enable_interrupt();
        self.syst.enable_counter();
    }
}

#[cfg(feature = "rt")]
#[cortex_m_rt::exception]
fn SysTick() {
    increment();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{global_lock, CountingTimebase};

    #[test]
    fn slow_tick_advances_ten_ms() {
        let _g = global_lock();
        set_tick_freq(TickFreq::Hz100);
        let before = now();
        increment();
        assert_eq!(now().wrapping_sub(before), 10);
        assert_eq!(tick_freq(), TickFreq::Hz100);

        set_tick_freq(TickFreq::Hz1000);
        let before = now();
        increment();
        assert_eq!(now().wrapping_sub(before), 1);
    }

    #[test]
    fn wait_for_gives_up_after_budget() {
        let mut tb = CountingTimebase::default();
        assert_eq!(wait_for(&mut tb, 5, || false), None);
        // one read for the start, then strictly more than 5 ms
        assert_eq!(tb.ms, 7);
    }

    #[test]
    fn wait_for_succeeds_when_condition_turns_true() {
        let mut tb = CountingTimebase::default();
        let mut polls = 0;
        assert_eq!(
            wait_for(&mut tb, 2, || {
                polls += 1;
                polls == 3
            }),
            Some(())
        );
    }

    #[test]
    fn wait_for_survives_counter_wrap() {
        let mut tb = CountingTimebase {
            ms: u32::MAX - 1,
            ..Default::default()
        };
        assert_eq!(wait_for(&mut tb, 3, || false), None);
        assert_eq!(tb.ms, 3);
    }
}
