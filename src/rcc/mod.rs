//! Reset and clock control.
//!
//! [`Rcc`] owns the clock tree. Oscillators are switched with
//! [`Rcc::osc_config`], the system clock and bus dividers with
//! [`Rcc::clock_config`]. Every hardware wait is bounded by the millisecond
//! [`Timebase`] the handle was built with; a failed step is reported and the
//! hardware is left as it is.

use core::ops::Div;

use portable_atomic::{AtomicU32, Ordering};

pub use crate::pac::rcc::vals::{Clkdiv as AHBPrescaler, Clkdiv as APBPrescaler, Mcosel as McoSource, Startup};
use crate::pac::rcc::vals::{Clkdiv, Sw};
use crate::pac::rcc::{KEY, UNLOCK_MAGIC};
use crate::pac;
use crate::tick::{SysTickTimebase, TickFreq, Timebase};
use crate::time::Hertz;

mod clock;
mod osc;
mod pll;

pub use clock::*;
pub use osc::*;
pub use pll::*;

/// Power-on HIRC frequency.
pub const HIRC_DEFAULT: Hertz = Hertz(4_000_000);
pub const HXT_DEFAULT: Hertz = Hertz(24_000_000);
pub const SIRC_38K4: Hertz = Hertz(38_400);
pub const SIRC_32K768: Hertz = Hertz(32_768);
pub const LXT_FREQ: Hertz = Hertz(32_768);

pub const HIRC_TIMEOUT_MS: u32 = 2;
pub const SIRC_TIMEOUT_MS: u32 = 2;
pub const PLL_TIMEOUT_MS: u32 = 2;
pub const HXT_STARTUP_TIMEOUT_MS: u32 = 100;
pub const LXT_STARTUP_TIMEOUT_MS: u32 = 5000;
pub const CLOCK_SWITCH_TIMEOUT_MS: u32 = 5000;

static SYSCLK: AtomicU32 = AtomicU32::new(HIRC_DEFAULT.0);
static HCLK: AtomicU32 = AtomicU32::new(HIRC_DEFAULT.0);
static PCLK: AtomicU32 = AtomicU32::new(HIRC_DEFAULT.0);

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Clocks {
    pub sysclk: Hertz,
    /// AHB clock, also the core clock.
    pub hclk: Hertz,
    /// APB clock
    pub pclk: Hertz,
}

impl Clocks {
    const RESET: Clocks = Clocks {
        sysclk: HIRC_DEFAULT,
        hclk: HIRC_DEFAULT,
        pclk: HIRC_DEFAULT,
    };
}

/// Clock frequencies as last computed by an [`Rcc`].
#[inline]
pub fn clocks() -> Clocks {
    Clocks {
        sysclk: Hertz(SYSCLK.load(Ordering::Relaxed)),
        hclk: Hertz(HCLK.load(Ordering::Relaxed)),
        pclk: Hertz(PCLK.load(Ordering::Relaxed)),
    }
}

/// Core clock frequency.
#[inline]
pub fn system_core_clock() -> Hertz {
    Hertz(HCLK.load(Ordering::Relaxed))
}

fn set_clocks(clocks: Clocks) {
    SYSCLK.store(clocks.sysclk.0, Ordering::Relaxed);
    HCLK.store(clocks.hclk.0, Ordering::Relaxed);
    PCLK.store(clocks.pclk.0, Ordering::Relaxed);
}

/// A clock source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oscillator {
    /// High-speed internal RC
    Hirc,
    /// High-speed external crystal
    Hxt,
    /// Low-speed internal RC
    Sirc,
    /// Low-speed external crystal
    Lxt,
    Pll,
}

/// System clock source selection.
pub type Sysclk = Oscillator;

impl Oscillator {
    pub(crate) const fn to_sw(self) -> Sw {
        match self {
            Oscillator::Hirc => Sw::HIRC,
            Oscillator::Hxt => Sw::HXT,
            Oscillator::Sirc => Sw::SIRC,
            Oscillator::Lxt => Sw::LXT,
            Oscillator::Pll => Sw::PLL,
        }
    }

    pub(crate) const fn from_sw(sw: Sw) -> Option<Self> {
        match sw {
            Sw::HIRC => Some(Oscillator::Hirc),
            Sw::HXT => Some(Oscillator::Hxt),
            Sw::SIRC => Some(Oscillator::Sirc),
            Sw::LXT => Some(Oscillator::Lxt),
            Sw::PLL => Some(Oscillator::Pll),
            _ => None,
        }
    }

    /// Low-speed sources only support the 100 Hz tick.
    pub const fn is_low_speed(self) -> bool {
        matches!(self, Oscillator::Sirc | Oscillator::Lxt)
    }
}

/// RCC error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The oscillator's ready flag did not reach the requested state in time.
    Timeout(Oscillator),
    /// CLKSTA did not report the requested source in time.
    SwitchTimeout(Sysclk),
    /// The oscillator drives SYSCLK (directly or through the PLL).
    InUse(Oscillator),
    /// The source is not running.
    NotReady(Oscillator),
    /// A PLL stage frequency is outside the silicon limits.
    OutOfRange(PllStage),
    /// A numeric setting does not fit its register field.
    InvalidParameter,
}

/// Factory calibration values for the internal RC oscillators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FactoryTrim {
    /// 24, 22.12, 16, 8 and 4 MHz.
    pub hirc: [u16; 5],
    /// 38.4 and 32.768 kHz.
    pub sirc: [u16; 2],
}

impl FactoryTrim {
    /// Read the calibration words from the information block.
    ///
    /// # Safety
    ///
    /// Only valid on the target, where the information block is mapped.
    pub unsafe fn read() -> Self {
        let hirc = pac::info::HIRC_TRIM_BASE as *const u16;
        let sirc = pac::info::SIRC_TRIM_BASE as *const u16;
        let mut trim = FactoryTrim { hirc: [0; 5], sirc: [0; 2] };
        for (i, t) in trim.hirc.iter_mut().enumerate() {
            *t = hirc.add(i).read_volatile() & 0x0FFF;
        }
        for (i, t) in trim.sirc.iter_mut().enumerate() {
            *t = sirc.add(i).read_volatile() & 0x01FF;
        }
        trim
    }

    pub fn hirc(&self, freq: HircFreq) -> u16 {
        self.hirc[freq as usize]
    }

    pub fn sirc(&self, freq: SircFreq) -> u16 {
        self.sirc[freq as usize]
    }

    /// Nominal HIRC frequency for a trim value, 4 MHz when it matches no factory entry.
    pub fn hirc_frequency(&self, trim: u16) -> Hertz {
        HircFreq::ALL
            .iter()
            .find(|f| self.hirc(**f) == trim)
            .map(|f| f.frequency())
            .unwrap_or(HIRC_DEFAULT)
    }

    /// Nominal SIRC frequency for a trim value, 38.4 kHz when it matches no factory entry.
    pub fn sirc_frequency(&self, trim: u16) -> Hertz {
        if trim == self.sirc(SircFreq::Khz32_768) {
            SIRC_32K768
        } else {
            SIRC_38K4
        }
    }
}

impl Div<Clkdiv> for Hertz {
    type Output = Hertz;
    fn div(self, rhs: Clkdiv) -> Hertz {
        match rhs.0 {
            0 => self,
            n => Hertz(self.0 / (2 * n as u32)),
        }
    }
}

/// Scoped write access to the protected RCC registers.
///
/// Opens the window on creation and closes it on drop.
pub(crate) struct RegisterUnlock {
    regs: pac::rcc::Rcc,
}

impl RegisterUnlock {
    pub(crate) fn new(regs: pac::rcc::Rcc) -> Self {
        regs.unlock().write(|w| {
            w.set_magic(UNLOCK_MAGIC);
            w.set_unlock(true);
        });
        Self { regs }
    }
}

impl Drop for RegisterUnlock {
    fn drop(&mut self) {
        self.regs.unlock().write(|w| w.set_magic(UNLOCK_MAGIC));
    }
}

/// Causes of the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResetReason {
    pub power_on: bool,
    /// External reset pin.
    pub pad: bool,
    /// `SYSRESETREQ`
    pub software: bool,
    pub lockup: bool,
    pub iwdg: bool,
    pub wwdg: bool,
    /// Low voltage detector.
    pub lvd: bool,
}

/// Clock tree setup applied by [`crate::init`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub osc: OscConfig,
    pub clock: ClockConfig,
}

impl Config {
    /// Reset state: HIRC at 4 MHz, no division.
    pub const HIRC_4MHZ: Config = Config {
        osc: OscConfig {
            hirc: Some(HircConfig::factory(HircFreq::Mhz4)),
            ..OscConfig::NONE
        },
        clock: ClockConfig::full(Sysclk::Hirc, AHBPrescaler::DIV1, APBPrescaler::DIV1),
    };

    pub const HIRC_24MHZ: Config = Config {
        osc: OscConfig {
            hirc: Some(HircConfig::factory(HircFreq::Mhz24)),
            ..OscConfig::NONE
        },
        clock: ClockConfig::full(Sysclk::Hirc, AHBPrescaler::DIV1, APBPrescaler::DIV1),
    };

    /// 24 MHz crystal on HXT.
    pub const HXT_24MHZ: Config = Config {
        osc: OscConfig {
            hxt: Some(HxtConfig::oscillator(HXT_DEFAULT)),
            ..OscConfig::NONE
        },
        clock: ClockConfig::full(Sysclk::Hxt, AHBPrescaler::DIV1, APBPrescaler::DIV1),
    };

    /// HIRC 24 MHz / 4 * 32 / 4.
    pub const PLL_48MHZ_HIRC: Config = Config {
        osc: OscConfig {
            hirc: Some(HircConfig::factory(HircFreq::Mhz24)),
            pll: Some(PllConfig {
                state: State::On,
                source: PllSource::Hirc,
                m: 4,
                n: 32,
                sys_div: 4,
            }),
            ..OscConfig::NONE
        },
        clock: ClockConfig::full(Sysclk::Pll, AHBPrescaler::DIV1, APBPrescaler::DIV2),
    };

    /// SIRC at 38.4 kHz, for low-power operation.
    pub const SIRC_38K4: Config = Config {
        osc: OscConfig {
            sirc: Some(SircConfig {
                state: State::On,
                trim: SircTrim::Factory(SircFreq::Khz38_4),
            }),
            ..OscConfig::NONE
        },
        clock: ClockConfig::full(Sysclk::Sirc, AHBPrescaler::DIV1, APBPrescaler::DIV1),
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::HIRC_4MHZ
    }
}

/// Clock tree driver.
pub struct Rcc<TB: Timebase> {
    regs: pac::rcc::Rcc,
    trim: FactoryTrim,
    hxt_freq: Hertz,
    tb: TB,
    clocks: Clocks,
}

impl Rcc<SysTickTimebase> {
    /// Take the RCC with SysTick as millisecond tick.
    pub fn new(_rcc: crate::peripherals::RCC, syst: cortex_m::peripheral::SYST) -> Self {
        let trim = unsafe { FactoryTrim::read() };
        let mut rcc = Self::from_regs(pac::RCC, trim, SysTickTimebase::new(syst));
        let clocks = rcc.update_clocks();
        let freq = tick_freq_for(rcc.sysclk_source());
        rcc.tb.reconfigure(clocks.hclk, freq);
        rcc
    }
}

impl<TB: Timebase> Rcc<TB> {
    /// Build a driver over any memory with the RCC layout.
    pub(crate) fn from_regs(regs: pac::rcc::Rcc, trim: FactoryTrim, tb: TB) -> Self {
        Self {
            regs,
            trim,
            hxt_freq: HXT_DEFAULT,
            tb,
            clocks: Clocks::RESET,
        }
    }

    /// Apply a full clock setup: oscillators first, then the system clock.
    pub fn apply(&mut self, config: &Config) -> Result<Clocks, Error> {
        self.osc_config(&config.osc)?;
        self.clock_config(&config.clock)
    }

    /// Frequencies as of the last configuration call.
    pub fn clocks(&self) -> Clocks {
        self.clocks
    }

    pub fn factory_trim(&self) -> &FactoryTrim {
        &self.trim
    }

    pub fn timebase(&mut self) -> &mut TB {
        &mut self.tb
    }

    /// Source currently reported by `CLKSTA`.
    pub fn sysclk_source(&self) -> Sysclk {
        Oscillator::from_sw(self.regs.sysclksel().read().clksta()).unwrap_or(Oscillator::Hirc)
    }

    pub fn is_ready(&self, osc: Oscillator) -> bool {
        ready_flag(self.regs, osc)
    }

    /// Whether `osc` feeds SYSCLK, directly or as the PLL reference.
    pub fn is_in_use(&self, osc: Oscillator) -> bool {
        let sys = self.sysclk_source();
        if sys == osc {
            return true;
        }
        sys == Oscillator::Pll && self.pll_source().oscillator() == osc
    }

    /// Nominal frequency of a source from its current register contents.
    pub fn source_frequency(&self, osc: Oscillator) -> Hertz {
        match osc {
            Oscillator::Hirc => self.trim.hirc_frequency(self.regs.hirccr().read().hirctrim()),
            Oscillator::Hxt => self.hxt_freq,
            Oscillator::Sirc => self.trim.sirc_frequency(self.regs.sirccr().read().sirctrim()),
            Oscillator::Lxt => LXT_FREQ,
            Oscillator::Pll => self.pll_frequency(),
        }
    }

    /// Recompute the clock frequencies from the hardware and publish them.
    pub fn update_clocks(&mut self) -> Clocks {
        let sysclk = self.source_frequency(self.sysclk_source());
        let hclk = sysclk / self.regs.hclkdiv().read().ahbckdiv();
        let pclk = hclk / self.regs.pclkdiv().read().apbckdiv();
        let clocks = Clocks { sysclk, hclk, pclk };
        self.clocks = clocks;
        set_clocks(clocks);
        clocks
    }

    /// Route a clock to the MCO pin. `div` of 0 outputs the clock undivided,
    /// `n` divides it by `2 * n`.
    pub fn mco_config(&mut self, source: McoSource, div: u8) {
        self.regs.mcocr().write(|w| {
            w.set_mcosel(source);
            w.set_mcodiv(div);
            w.set_mcoen(true);
        });
    }

    pub fn mco_disable(&mut self) {
        self.regs.mcocr().modify(|w| w.set_mcoen(false));
    }

    /// Read and clear the reset cause flags.
    pub fn reset_reason(&mut self) -> ResetReason {
        let r = self.regs.rstsr().read();
        self.regs.rstsr().write_value(pac::rcc::regs::Rstsr(0));
        ResetReason {
            power_on: r.porrst(),
            pad: r.padrst(),
            software: r.sftrst(),
            lockup: r.lockuprst(),
            iwdg: r.iwdgrst(),
            wwdg: r.wwdgrst(),
            lvd: r.lvdrst(),
        }
    }

    /// Run `f` with the protected registers unlocked.
    fn protected<R>(&self, f: impl FnOnce(pac::rcc::Rcc) -> R) -> R {
        let _unlock = RegisterUnlock::new(self.regs);
        f(self.regs)
    }

    fn wait_ready(&mut self, osc: Oscillator, ready: bool, budget_ms: u32) -> Result<(), Error> {
        let regs = self.regs;
        crate::tick::wait_for(&mut self.tb, budget_ms, || ready_flag(regs, osc) == ready).ok_or_else(|| {
            warn!("rcc: {:?} ready flag stuck at {}", osc, !ready);
            Error::Timeout(osc)
        })
    }

    fn set_enable(&self, osc: Oscillator, on: bool) {
        self.protected(|r| match osc {
            Oscillator::Pll => r.pllcr1().modify(|w| {
                w.set_key(KEY);
                w.set_pllen(on);
            }),
            _ => r.sysclkcr().modify(|w| {
                w.set_key(KEY);
                match osc {
                    Oscillator::Hirc => w.set_hircen(on),
                    Oscillator::Hxt => w.set_hxten(on),
                    Oscillator::Sirc => w.set_sircen(on),
                    _ => w.set_lxten(on),
                }
            }),
        });
    }
}

fn tick_freq_for(sys: Sysclk) -> TickFreq {
    if sys.is_low_speed() {
        TickFreq::Hz100
    } else {
        TickFreq::Hz1000
    }
}

fn ready_flag(regs: pac::rcc::Rcc, osc: Oscillator) -> bool {
    match osc {
        Oscillator::Hirc => regs.hirccr().read().hircrdy(),
        Oscillator::Hxt => regs.hxtcr().read().hxtrdy(),
        Oscillator::Sirc => regs.sirccr().read().sircrdy(),
        Oscillator::Lxt => regs.lxtcr().read().lxtrdy(),
        Oscillator::Pll => regs.pllcr1().read().pllrdy(),
    }
}
