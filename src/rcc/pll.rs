//! PLL: `ref = src / m`, `vco = ref * n`, `out = vco / sys_div`.

use core::ops::RangeInclusive;

use super::{Error, HircTrim, OscConfig, Oscillator, Rcc, State, PLL_TIMEOUT_MS};
use crate::pac::rcc::vals::Pllsrc;
use crate::pac::rcc::KEY;
use crate::tick::Timebase;
use crate::time::Hertz;

pub const PLL_REF_RANGE: RangeInclusive<u32> = 4_000_000..=8_000_000;
pub const PLL_VCO_RANGE: RangeInclusive<u32> = 128_000_000..=192_000_000;
pub const PLL_OUT_RANGE: RangeInclusive<u32> = 2_000_000..=64_000_000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllSource {
    Hirc,
    Hxt,
}

impl PllSource {
    pub const fn oscillator(self) -> Oscillator {
        match self {
            PllSource::Hirc => Oscillator::Hirc,
            PllSource::Hxt => Oscillator::Hxt,
        }
    }
}

/// The PLL stage whose frequency left its window.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllStage {
    /// `src / m`, 4 to 8 MHz.
    Reference,
    /// `ref * n`, 128 to 192 MHz.
    Vco,
    /// `vco / sys_div`, 2 to 64 MHz.
    Output,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllConfig {
    pub state: State,
    pub source: PllSource,
    /// Reference divider, 1 to 16.
    pub m: u8,
    /// Multiplier, 1 to 255.
    pub n: u8,
    /// System divider, 1 to 64.
    pub sys_div: u8,
}

impl PllConfig {
    pub const OFF: PllConfig = PllConfig {
        state: State::Off,
        source: PllSource::Hirc,
        m: 1,
        n: 1,
        sys_div: 1,
    };

    fn fields_valid(&self) -> bool {
        (1..=16).contains(&self.m) && self.n >= 1 && (1..=64).contains(&self.sys_div)
    }

    /// Output frequency for a reference input, checking every stage.
    pub fn output_frequency(&self, src: Hertz) -> Result<Hertz, Error> {
        if !self.fields_valid() {
            return Err(Error::InvalidParameter);
        }
        let reference = src.0 / self.m as u32;
        if !PLL_REF_RANGE.contains(&reference) {
            return Err(Error::OutOfRange(PllStage::Reference));
        }
        let vco = reference * self.n as u32;
        if !PLL_VCO_RANGE.contains(&vco) {
            return Err(Error::OutOfRange(PllStage::Vco));
        }
        let out = vco / self.sys_div as u32;
        if !PLL_OUT_RANGE.contains(&out) {
            return Err(Error::OutOfRange(PllStage::Output));
        }
        Ok(Hertz(out))
    }
}

impl<TB: Timebase> Rcc<TB> {
    pub fn pll_source(&self) -> PllSource {
        match self.regs.pllcr1().read().pllsrc() {
            Pllsrc::HXT => PllSource::Hxt,
            _ => PllSource::Hirc,
        }
    }

    pub fn pll_config(&self) -> PllConfig {
        let cr2 = self.regs.pllcr2().read();
        PllConfig {
            state: self.regs.pllcr1().read().pllen().into(),
            source: self.pll_source(),
            m: cr2.pllm() + 1,
            n: cr2.plln(),
            sys_div: cr2.pllsysdiv() + 1,
        }
    }

    /// PLL output computed from its registers, without range checks.
    pub(super) fn pll_frequency(&self) -> Hertz {
        let cfg = self.pll_config();
        let src = self.source_frequency(cfg.source.oscillator());
        Hertz(src.0 / cfg.m as u32 * cfg.n as u32 / cfg.sys_div as u32)
    }

    /// Reference frequency the PLL will see once `config` has been applied.
    pub(super) fn pll_reference_frequency(&self, source: PllSource, config: &OscConfig) -> Hertz {
        match source {
            PllSource::Hirc => match config.hirc {
                Some(h) if h.state == State::On => match h.trim {
                    HircTrim::Factory(f) => f.frequency(),
                    HircTrim::Raw(t) => self.trim.hirc_frequency(t),
                },
                _ => self.source_frequency(Oscillator::Hirc),
            },
            PllSource::Hxt => match config.hxt {
                Some(h) if h.state == State::On => h.freq,
                _ => self.hxt_freq,
            },
        }
    }

    pub(super) fn config_pll(&mut self, cfg: &PllConfig) -> Result<(), Error> {
        if self.sysclk_source() == Oscillator::Pll {
            warn!("rcc: PLL drives SYSCLK and cannot be reconfigured");
            return Err(Error::InUse(Oscillator::Pll));
        }
        if cfg.state == State::On && !self.is_ready(cfg.source.oscillator()) {
            return Err(Error::NotReady(cfg.source.oscillator()));
        }

        self.switch(Oscillator::Pll, State::Off, PLL_TIMEOUT_MS)?;
        if cfg.state == State::Off {
            return Ok(());
        }

        let src = match cfg.source {
            PllSource::Hirc => Pllsrc::HIRC,
            PllSource::Hxt => Pllsrc::HXT,
        };
        self.protected(|r| {
            r.pllcr2().write(|w| {
                w.set_pllm(cfg.m - 1);
                w.set_plln(cfg.n);
                w.set_pllsysdiv(cfg.sys_div - 1);
            });
        });
        self.protected(|r| {
            r.pllcr1().modify(|w| {
                w.set_key(KEY);
                w.set_pllsrc(src);
            })
        });
        self.switch(Oscillator::Pll, State::On, PLL_TIMEOUT_MS)
    }
}
