//! Register access layer for the ZB32L03x.
//!
//! Register blocks are thin wrappers over a base pointer. The constants below
//! point at the silicon; drivers also accept blocks built over any memory with
//! the same layout.

#![allow(dead_code)]

pub mod common;
pub mod gpio;
pub mod rcc;
pub mod timer;

pub const RCC: rcc::Rcc = unsafe { rcc::Rcc::from_ptr(0x4002_0000usize as _) };

pub const TIM1: timer::Tim = unsafe { timer::Tim::from_ptr(0x4001_2C00usize as _) };
pub const TIM2: timer::Tim = unsafe { timer::Tim::from_ptr(0x4000_0000usize as _) };

pub const GPIOA: gpio::Gpio = unsafe { gpio::Gpio::from_ptr(0x5000_0000usize as _) };
pub const GPIOB: gpio::Gpio = unsafe { gpio::Gpio::from_ptr(0x5000_0400usize as _) };
pub const GPIOC: gpio::Gpio = unsafe { gpio::Gpio::from_ptr(0x5000_0800usize as _) };
pub const GPIOD: gpio::Gpio = unsafe { gpio::Gpio::from_ptr(0x5000_0C00usize as _) };

/// Factory calibration words in the information block.
pub mod info {
    /// HIRC trims for 24, 22.12, 16, 8 and 4 MHz, one half-word each.
    pub const HIRC_TRIM_BASE: usize = 0x1800_00C0;
    /// SIRC trims for 38.4 and 32.768 kHz, one half-word each.
    pub const SIRC_TRIM_BASE: usize = 0x1800_00D4;
}

/// NVIC interrupt lines.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(non_camel_case_types)]
#[repr(u16)]
pub enum Interrupt {
    GPIOA = 0,
    GPIOB = 1,
    GPIOC = 2,
    GPIOD = 3,
    FLASH = 4,
    UART0 = 6,
    UART1 = 7,
    LPUART = 8,
    SPI = 10,
    I2C = 12,
    TIM10 = 14,
    TIM11 = 15,
    LPTIM = 16,
    TIM1 = 18,
    TIM2 = 19,
    PCA = 21,
    WWDG = 22,
    IWDG = 23,
    ADC = 24,
    LVD = 25,
    VC = 26,
    AWK = 28,
    ONEWIRE = 29,
    RTC = 30,
    CLKTRIM = 31,
}

unsafe impl cortex_m::interrupt::InterruptNumber for Interrupt {
    #[inline(always)]
    fn number(self) -> u16 {
        self as u16
    }
}
