use super::{tick_freq_for, AHBPrescaler, APBPrescaler, Clocks, Error, Rcc, Sysclk, CLOCK_SWITCH_TIMEOUT_MS};
use crate::pac::rcc::KEY;
use crate::tick::{wait_for, Timebase};

/// System clock and bus divider selection. `None` leaves a setting as it is.
///
/// Divider values: 0 passes the clock through, `n` divides by `2 * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    pub sys: Option<Sysclk>,
    pub hclk_div: Option<AHBPrescaler>,
    pub pclk_div: Option<APBPrescaler>,
}

impl ClockConfig {
    pub const NONE: ClockConfig = ClockConfig {
        sys: None,
        hclk_div: None,
        pclk_div: None,
    };

    pub const fn full(sys: Sysclk, hclk_div: AHBPrescaler, pclk_div: APBPrescaler) -> Self {
        Self {
            sys: Some(sys),
            hclk_div: Some(hclk_div),
            pclk_div: Some(pclk_div),
        }
    }
}

impl<TB: Timebase> Rcc<TB> {
    /// Program the bus dividers and switch SYSCLK.
    ///
    /// The target source must already be ready; otherwise nothing is
    /// written. The APB divider is written before the AHB divider, then the
    /// switch is requested. Once the dividers are written the clocks are
    /// recomputed and the tick is restarted at 100 Hz for SIRC/LXT and
    /// 1000 Hz otherwise, even when the switch times out.
    pub fn clock_config(&mut self, config: &ClockConfig) -> Result<Clocks, Error> {
        if let Some(sys) = config.sys {
            if !self.is_ready(sys) {
                warn!("rcc: {:?} is not ready, clocks unchanged", sys);
                return Err(Error::NotReady(sys));
            }
        }

        if let Some(div) = config.pclk_div {
            self.protected(|r| r.pclkdiv().write(|w| w.set_apbckdiv(div)));
        }
        if let Some(div) = config.hclk_div {
            self.protected(|r| r.hclkdiv().write(|w| w.set_ahbckdiv(div)));
        }

        let switched = match config.sys {
            Some(sys) => self.switch_sysclk(sys),
            None => Ok(()),
        };

        let clocks = self.update_clocks();
        let freq = tick_freq_for(self.sysclk_source());
        self.tb.reconfigure(clocks.hclk, freq);
        switched?;

        info!("rcc: sysclk {}, hclk {}, pclk {}", clocks.sysclk, clocks.hclk, clocks.pclk);
        Ok(clocks)
    }

    fn switch_sysclk(&mut self, sys: Sysclk) -> Result<(), Error> {
        let sw = sys.to_sw();
        self.protected(|r| {
            r.sysclksel().modify(|w| {
                w.set_key(KEY);
                w.set_clksw(sw);
            })
        });
        let regs = self.regs;
        wait_for(&mut self.tb, CLOCK_SWITCH_TIMEOUT_MS, || regs.sysclksel().read().clksta() == sw).ok_or_else(|| {
            warn!("rcc: switch to {:?} timed out", sys);
            Error::SwitchTimeout(sys)
        })
    }

    /// Current source and dividers.
    pub fn clock_config_readback(&self) -> ClockConfig {
        ClockConfig {
            sys: Some(self.sysclk_source()),
            hclk_div: Some(self.regs.hclkdiv().read().ahbckdiv()),
            pclk_div: Some(self.regs.pclkdiv().read().apbckdiv()),
        }
    }
}
