//! Host stand-ins for the silicon: register blocks backed by heap memory and
//! timebases that advance one millisecond per read.

use std::sync::{Mutex, MutexGuard};

use crate::pac;
use crate::pac::rcc::vals::Sw;
use crate::rcc::FactoryTrim;
use crate::tick::{TickFreq, Timebase};
use crate::time::Hertz;

static GLOBAL: Mutex<()> = Mutex::new(());

/// Serialises tests that touch the global clock and tick state.
pub fn global_lock() -> MutexGuard<'static, ()> {
    GLOBAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// Zeroed register memory that stays put for as long as it lives.
pub struct RegMem<const N: usize> {
    ptr: *mut [u32; N],
}

impl<const N: usize> RegMem<N> {
    pub fn new() -> Self {
        Self {
            ptr: Box::into_raw(Box::new([0u32; N])),
        }
    }

    pub fn as_ptr(&self) -> *mut () {
        self.ptr as *mut ()
    }

    pub fn word(&self, offset: usize) -> u32 {
        unsafe { (self.ptr as *mut u32).add(offset / 4).read_volatile() }
    }

    pub fn set_word(&self, offset: usize, val: u32) {
        unsafe { (self.ptr as *mut u32).add(offset / 4).write_volatile(val) }
    }
}

impl<const N: usize> Drop for RegMem<N> {
    fn drop(&mut self) {
        drop(unsafe { Box::from_raw(self.ptr) });
    }
}

#[derive(Default)]
pub struct CountingTimebase {
    pub ms: u32,
    pub reconfigured: Option<(Hertz, TickFreq)>,
}

impl Timebase for CountingTimebase {
    fn now(&mut self) -> u32 {
        let t = self.ms;
        self.ms = self.ms.wrapping_add(1);
        t
    }

    fn reconfigure(&mut self, hclk: Hertz, freq: TickFreq) {
        self.reconfigured = Some((hclk, freq));
    }
}

pub const TRIM: FactoryTrim = FactoryTrim {
    hirc: [0x0A10, 0x0950, 0x0700, 0x0410, 0x0220],
    sirc: [0x0140, 0x0120],
};

pub const RCC_SIZE: usize = 0x84 / 4;

/// RCC memory in its reset state: HIRC on at 4 MHz and driving SYSCLK.
pub fn rcc_mem() -> RegMem<RCC_SIZE> {
    let mem = RegMem::new();
    let regs = unsafe { pac::rcc::Rcc::from_ptr(mem.as_ptr()) };
    regs.sysclkcr().write(|w| w.set_hircen(true));
    regs.hirccr().write(|w| {
        w.set_hirctrim(TRIM.hirc[4]);
        w.set_hircrdy(true);
    });
    regs.sysclksel().write(|w| {
        w.set_clksw(Sw::HIRC);
        w.set_clksta(Sw::HIRC);
    });
    regs.unlock().write(|w| w.set_magic(pac::rcc::UNLOCK_MAGIC));
    mem
}

/// Millisecond timebase that also plays the part of the oscillators: on each
/// read it copies every enable bit to its ready flag and completes pending
/// clock switches whose target is ready.
pub struct SimTimebase {
    regs: pac::rcc::Rcc,
    pub ms: u32,
    /// Nothing settles before this time.
    pub hold_until: u32,
    /// Oscillators whose ready flag never moves, one bit per `Sw` value.
    pub stuck: u8,
    pub switch_stuck: bool,
    pub reconfigured: Option<(Hertz, TickFreq)>,
}

impl SimTimebase {
    pub fn new(mem: &RegMem<RCC_SIZE>) -> Self {
        Self {
            regs: unsafe { pac::rcc::Rcc::from_ptr(mem.as_ptr()) },
            ms: 0,
            hold_until: 0,
            stuck: 0,
            switch_stuck: false,
            reconfigured: None,
        }
    }

    pub fn stick(&mut self, sw: Sw) {
        self.stuck |= 1 << sw.0;
    }

    fn moves(&self, sw: Sw) -> bool {
        self.stuck & (1 << sw.0) == 0
    }

    fn ready(&self, sw: Sw) -> bool {
        let r = self.regs;
        match sw {
            Sw::HIRC => r.hirccr().read().hircrdy(),
            Sw::HXT => r.hxtcr().read().hxtrdy(),
            Sw::SIRC => r.sirccr().read().sircrdy(),
            Sw::LXT => r.lxtcr().read().lxtrdy(),
            Sw::PLL => r.pllcr1().read().pllrdy(),
            _ => false,
        }
    }

    fn settle(&self) {
        if self.ms < self.hold_until {
            return;
        }
        let r = self.regs;
        let cr = r.sysclkcr().read();
        if self.moves(Sw::HIRC) {
            r.hirccr().modify(|w| w.set_hircrdy(cr.hircen()));
        }
        if self.moves(Sw::HXT) {
            r.hxtcr().modify(|w| w.set_hxtrdy(cr.hxten()));
        }
        if self.moves(Sw::SIRC) {
            r.sirccr().modify(|w| w.set_sircrdy(cr.sircen()));
        }
        if self.moves(Sw::LXT) {
            r.lxtcr().modify(|w| w.set_lxtrdy(cr.lxten()));
        }
        if self.moves(Sw::PLL) {
            r.pllcr1().modify(|w| {
                let en = w.pllen();
                w.set_pllrdy(en)
            });
        }
        if !self.switch_stuck {
            let sw = r.sysclksel().read().clksw();
            if self.ready(sw) {
                r.sysclksel().modify(|w| w.set_clksta(sw));
            }
        }
    }
}

impl Timebase for SimTimebase {
    fn now(&mut self) -> u32 {
        self.settle();
        let t = self.ms;
        self.ms = self.ms.wrapping_add(1);
        t
    }

    fn reconfigure(&mut self, hclk: Hertz, freq: TickFreq) {
        self.reconfigured = Some((hclk, freq));
    }
}

pub const TIM_SIZE: usize = 0x48 / 4;

pub fn tim_mem() -> RegMem<TIM_SIZE> {
    RegMem::new()
}
