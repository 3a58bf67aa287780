#![cfg_attr(not(test), no_std)]
//! HAL for the ZB32L03x family of Cortex-M0+ microcontrollers.

// This must go FIRST so that all the other modules see its macros.
mod fmt;

pub mod pac;
pub mod time;
pub mod tick;

mod peripheral;
pub use peripheral::RccPeripheral;

pub mod delay;
pub mod gpio;
pub mod rcc;
pub mod timer;

#[cfg(test)]
mod test_util;

pub(crate) use embassy_hal_internal::impl_peripheral;
pub use embassy_hal_internal::{into_ref, Peripheral, PeripheralRef};

embassy_hal_internal::peripherals! {
    RCC,
    TIM1,
    TIM2,
    GPIOA,
    GPIOB,
    GPIOC,
    GPIOD,
    PA0, PA1, PA2, PA3, PA4, PA5, PA6, PA7,
    PB0, PB1, PB2, PB3, PB4, PB5, PB6, PB7,
    PC0, PC1, PC2, PC3, PC4, PC5, PC6, PC7,
    PD0, PD1, PD2, PD3, PD4, PD5, PD6, PD7,
}

/// HAL configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Config {
    pub rcc: rcc::Config,
}

/// Bring up the chip: apply the clock setup, start the millisecond tick on
/// SysTick and enable the GPIO ports.
///
/// Returns the peripheral singletons and the clock driver. Panics when
/// called more than once.
pub fn init(
    config: Config,
    syst: cortex_m::peripheral::SYST,
) -> Result<(Peripherals, rcc::Rcc<tick::SysTickTimebase>), rcc::Error> {
    let p = Peripherals::take();

    // Safety: `take` above succeeded, nothing else holds the RCC yet
    let mut rcc = rcc::Rcc::new(unsafe { peripherals::RCC::steal() }, syst);
    let clocks = rcc.apply(&config.rcc)?;
    info!("sysclk {} Hz, hclk {} Hz, pclk {} Hz", clocks.sysclk.0, clocks.hclk.0, clocks.pclk.0);

    critical_section::with(gpio::init);

    Ok((p, rcc))
}
