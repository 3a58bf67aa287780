use super::{Clocks, Error, Oscillator, PllConfig, Rcc, Startup, HXT_DEFAULT};
use super::{HIRC_TIMEOUT_MS, HXT_STARTUP_TIMEOUT_MS, LXT_STARTUP_TIMEOUT_MS, SIRC_TIMEOUT_MS};
use crate::pac::rcc::KEY;
use crate::tick::Timebase;
use crate::time::Hertz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Off,
    On,
}

impl From<bool> for State {
    fn from(on: bool) -> Self {
        if on {
            State::On
        } else {
            State::Off
        }
    }
}

/// HIRC frequencies with a factory trim value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HircFreq {
    Mhz24 = 0,
    Mhz22_12 = 1,
    Mhz16 = 2,
    Mhz8 = 3,
    Mhz4 = 4,
}

impl HircFreq {
    pub const ALL: [HircFreq; 5] = [
        HircFreq::Mhz24,
        HircFreq::Mhz22_12,
        HircFreq::Mhz16,
        HircFreq::Mhz8,
        HircFreq::Mhz4,
    ];

    pub const fn frequency(self) -> Hertz {
        match self {
            HircFreq::Mhz24 => Hertz(24_000_000),
            HircFreq::Mhz22_12 => Hertz(22_120_000),
            HircFreq::Mhz16 => Hertz(16_000_000),
            HircFreq::Mhz8 => Hertz(8_000_000),
            HircFreq::Mhz4 => Hertz(4_000_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HircTrim {
    /// Use the factory calibration for this frequency.
    Factory(HircFreq),
    /// 12-bit trim value.
    Raw(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HircConfig {
    pub state: State,
    pub trim: HircTrim,
}

impl HircConfig {
    pub const fn factory(freq: HircFreq) -> Self {
        Self {
            state: State::On,
            trim: HircTrim::Factory(freq),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SircFreq {
    Khz38_4 = 0,
    Khz32_768 = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SircTrim {
    Factory(SircFreq),
    /// 9-bit trim value.
    Raw(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SircConfig {
    pub state: State,
    pub trim: SircTrim,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum XtalMode {
    /// crystal/ceramic oscillator
    Oscillator,
    /// external clock on the input pin
    Bypass,
}

/// High-speed crystal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HxtConfig {
    pub state: State,
    /// Crystal or input clock frequency.
    pub freq: Hertz,
    pub mode: XtalMode,
    /// Drive strength, 0 to 15.
    pub drive: u8,
    pub startup: Startup,
    /// How long to wait for the ready flag.
    pub timeout_ms: u32,
}

impl HxtConfig {
    pub const fn oscillator(freq: Hertz) -> Self {
        Self {
            state: State::On,
            freq,
            mode: XtalMode::Oscillator,
            drive: 0x0A,
            startup: Startup::CYCLES_4096,
            timeout_ms: HXT_STARTUP_TIMEOUT_MS,
        }
    }

    pub const OFF: HxtConfig = HxtConfig {
        state: State::Off,
        ..HxtConfig::oscillator(HXT_DEFAULT)
    };
}

/// Low-speed 32.768 kHz crystal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LxtConfig {
    pub state: State,
    pub mode: XtalMode,
    /// Drive strength, 0 to 15.
    pub drive: u8,
    pub startup: Startup,
    pub timeout_ms: u32,
}

impl LxtConfig {
    pub const ON: LxtConfig = LxtConfig {
        state: State::On,
        mode: XtalMode::Oscillator,
        drive: 0x08,
        startup: Startup::CYCLES_16384,
        timeout_ms: LXT_STARTUP_TIMEOUT_MS,
    };

    pub const OFF: LxtConfig = LxtConfig {
        state: State::Off,
        ..LxtConfig::ON
    };
}

/// Oscillators to touch. `None` leaves an oscillator as it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OscConfig {
    pub hirc: Option<HircConfig>,
    pub hxt: Option<HxtConfig>,
    pub sirc: Option<SircConfig>,
    pub lxt: Option<LxtConfig>,
    pub pll: Option<PllConfig>,
}

impl OscConfig {
    pub const NONE: OscConfig = OscConfig {
        hirc: None,
        hxt: None,
        sirc: None,
        lxt: None,
        pll: None,
    };
}

impl<TB: Timebase> Rcc<TB> {
    /// Enable, disable or recalibrate oscillators.
    ///
    /// Everything is validated before the first register write, the PLL
    /// frequency limits included. Oscillators are then handled in the order
    /// HIRC, HXT, SIRC, LXT, PLL; the first failure is returned and whatever
    /// was already written stays written.
    pub fn osc_config(&mut self, config: &OscConfig) -> Result<Clocks, Error> {
        self.validate_osc(config)?;

        if let Some(hirc) = &config.hirc {
            let trim = match hirc.trim {
                HircTrim::Factory(f) => self.trim.hirc(f),
                HircTrim::Raw(t) => t,
            };
            self.config_rc(Oscillator::Hirc, hirc.state, trim, HIRC_TIMEOUT_MS)?;
        }
        if let Some(hxt) = &config.hxt {
            self.config_hxt(hxt)?;
        }
        if let Some(sirc) = &config.sirc {
            let trim = match sirc.trim {
                SircTrim::Factory(f) => self.trim.sirc(f),
                SircTrim::Raw(t) => t,
            };
            self.config_rc(Oscillator::Sirc, sirc.state, trim, SIRC_TIMEOUT_MS)?;
        }
        if let Some(lxt) = &config.lxt {
            self.config_lxt(lxt)?;
        }
        if let Some(pll) = &config.pll {
            self.config_pll(pll)?;
        }

        let hclk = self.clocks.hclk;
        let clocks = self.update_clocks();
        if clocks.hclk != hclk {
            let freq = super::tick_freq_for(self.sysclk_source());
            self.tb.reconfigure(clocks.hclk, freq);
        }
        Ok(clocks)
    }

    fn validate_osc(&self, config: &OscConfig) -> Result<(), Error> {
        if let Some(HircConfig {
            trim: HircTrim::Raw(t), ..
        }) = config.hirc
        {
            if t > 0x0FFF {
                return Err(Error::InvalidParameter);
            }
        }
        if let Some(SircConfig {
            trim: SircTrim::Raw(t), ..
        }) = config.sirc
        {
            if t > 0x01FF {
                return Err(Error::InvalidParameter);
            }
        }
        if config.hxt.is_some_and(|h| h.drive > 0x0F) || config.lxt.is_some_and(|l| l.drive > 0x0F) {
            return Err(Error::InvalidParameter);
        }
        if let Some(pll) = &config.pll {
            if pll.state == State::On {
                let reference = self.pll_reference_frequency(pll.source, config);
                pll.output_frequency(reference)?;
            }
        }
        Ok(())
    }

    /// Switch an oscillator and wait for its ready flag to follow.
    pub(super) fn switch(&mut self, osc: Oscillator, state: State, budget_ms: u32) -> Result<(), Error> {
        let on = state == State::On;
        self.set_enable(osc, on);
        self.wait_ready(osc, on, budget_ms)?;
        debug!("rcc: {:?} {}", osc, if on { "on" } else { "off" });
        Ok(())
    }

    /// HIRC and SIRC: the trim is written before enabling. An RC oscillator
    /// that feeds SYSCLK can only be recalibrated.
    fn config_rc(&mut self, osc: Oscillator, state: State, trim: u16, budget_ms: u32) -> Result<(), Error> {
        if self.is_in_use(osc) {
            if state == State::Off {
                warn!("rcc: refusing to stop {:?}, it drives SYSCLK", osc);
                return Err(Error::InUse(osc));
            }
            self.write_trim(osc, trim);
            return Ok(());
        }
        if state == State::On {
            self.write_trim(osc, trim);
        }
        self.switch(osc, state, budget_ms)
    }

    fn write_trim(&self, osc: Oscillator, trim: u16) {
        self.protected(|r| match osc {
            Oscillator::Hirc => r.hirccr().modify(|w| {
                w.set_key(KEY);
                w.set_hirctrim(trim);
            }),
            _ => r.sirccr().modify(|w| {
                w.set_key(KEY);
                w.set_sirctrim(trim);
            }),
        });
    }

    fn config_hxt(&mut self, cfg: &HxtConfig) -> Result<(), Error> {
        if self.is_in_use(Oscillator::Hxt) {
            if cfg.state == State::Off {
                warn!("rcc: refusing to stop HXT, it drives SYSCLK");
                return Err(Error::InUse(Oscillator::Hxt));
            }
            self.hxt_freq = cfg.freq;
            return Ok(());
        }
        if cfg.state == State::On {
            self.protected(|r| {
                r.hxtcr().modify(|w| {
                    w.set_key(KEY);
                    w.set_hxtbyp(cfg.mode == XtalMode::Bypass);
                    w.set_hxtdrv(cfg.drive);
                    w.set_hxtstartup(cfg.startup);
                })
            });
        }
        self.switch(Oscillator::Hxt, cfg.state, cfg.timeout_ms)?;
        if cfg.state == State::On {
            self.hxt_freq = cfg.freq;
        }
        Ok(())
    }

    fn config_lxt(&mut self, cfg: &LxtConfig) -> Result<(), Error> {
        if self.is_in_use(Oscillator::Lxt) {
            if cfg.state == State::Off {
                warn!("rcc: refusing to stop LXT, it drives SYSCLK");
                return Err(Error::InUse(Oscillator::Lxt));
            }
            return Ok(());
        }
        if cfg.state == State::On {
            self.protected(|r| {
                r.lxtcr().modify(|w| {
                    w.set_key(KEY);
                    w.set_lxtbyp(cfg.mode == XtalMode::Bypass);
                    w.set_lxtdrv(cfg.drive);
                    w.set_lxtstartup(cfg.startup);
                })
            });
        }
        self.switch(Oscillator::Lxt, cfg.state, cfg.timeout_ms)
    }

    /// Current oscillator settings, as `HAL_RCC_GetOscConfig` reports them.
    pub fn oscillator_config(&self) -> OscConfig {
        let r = self.regs;
        let cr = r.sysclkcr().read();

        let hirc_trim = r.hirccr().read().hirctrim();
        let hirc_trim = HircFreq::ALL
            .iter()
            .find(|f| self.trim.hirc(**f) == hirc_trim)
            .map(|f| HircTrim::Factory(*f))
            .unwrap_or(HircTrim::Raw(hirc_trim));

        let sirc_trim = r.sirccr().read().sirctrim();
        let sirc_trim = [SircFreq::Khz38_4, SircFreq::Khz32_768]
            .iter()
            .find(|f| self.trim.sirc(**f) == sirc_trim)
            .map(|f| SircTrim::Factory(*f))
            .unwrap_or(SircTrim::Raw(sirc_trim));

        let hxt = r.hxtcr().read();
        let lxt = r.lxtcr().read();
        let mode = |byp: bool| if byp { XtalMode::Bypass } else { XtalMode::Oscillator };

        OscConfig {
            hirc: Some(HircConfig {
                state: cr.hircen().into(),
                trim: hirc_trim,
            }),
            hxt: Some(HxtConfig {
                state: cr.hxten().into(),
                freq: self.hxt_freq,
                mode: mode(hxt.hxtbyp()),
                drive: hxt.hxtdrv(),
                startup: hxt.hxtstartup(),
                timeout_ms: HXT_STARTUP_TIMEOUT_MS,
            }),
            sirc: Some(SircConfig {
                state: cr.sircen().into(),
                trim: sirc_trim,
            }),
            lxt: Some(LxtConfig {
                state: cr.lxten().into(),
                mode: mode(lxt.lxtbyp()),
                drive: lxt.lxtdrv(),
                startup: lxt.lxtstartup(),
                timeout_ms: LXT_STARTUP_TIMEOUT_MS,
            }),
            pll: Some(self.pll_config()),
        }
    }
}
