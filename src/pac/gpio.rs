//! General purpose I/O ports (A to D, eight pins each).

use super::common::{Reg, RW, W};

#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Gpio {
    ptr: *mut u8,
}
unsafe impl Send for Gpio {}
unsafe impl Sync for Gpio {}

impl Gpio {
    #[allow(clippy::missing_safety_doc)]
    #[inline(always)]
    pub const unsafe fn from_ptr(ptr: *mut ()) -> Self {
        Self { ptr: ptr as _ }
    }
    #[inline(always)]
    pub const fn as_ptr(&self) -> *mut () {
        self.ptr as _
    }

    #[inline(always)]
    const fn reg<T: Copy, A: super::common::Access>(self, offset: usize) -> Reg<T, A> {
        unsafe { Reg::from_ptr(self.ptr.add(offset) as _) }
    }

    /// Direction: set for output.
    #[inline(always)]
    pub const fn dircr(self) -> Reg<regs::Pins, RW> {
        self.reg(0x00)
    }
    /// Output type: set for open drain.
    #[inline(always)]
    pub const fn otyper(self) -> Reg<regs::Pins, RW> {
        self.reg(0x04)
    }
    #[inline(always)]
    pub const fn odr(self) -> Reg<regs::Pins, RW> {
        self.reg(0x08)
    }
    #[inline(always)]
    pub const fn idr(self) -> Reg<regs::Pins, RW> {
        self.reg(0x0C)
    }
    /// Alternate function selection, four bits per pin.
    #[inline(always)]
    pub const fn afr(self) -> Reg<regs::Afr, RW> {
        self.reg(0x20)
    }
    /// Atomic output set.
    #[inline(always)]
    pub const fn odset(self) -> Reg<regs::Pins, W> {
        self.reg(0x28)
    }
    /// Atomic output clear.
    #[inline(always)]
    pub const fn odclr(self) -> Reg<regs::Pins, W> {
        self.reg(0x2C)
    }
    #[inline(always)]
    pub const fn pupdr(self) -> Reg<regs::Pupdr, RW> {
        self.reg(0x30)
    }
    /// Output drive strength.
    #[inline(always)]
    pub const fn drvcr(self) -> Reg<regs::Pins, RW> {
        self.reg(0x3C)
    }
}

pub mod regs {
    use super::super::common::register;
    use super::vals;

    register!(
        /// One bit per pin.
        Pins {
            pin / set_pin @ 0 + 1 * n, 1: bool;
        }
    );

    register!(Afr {
        afsel / set_afsel @ 0 + 4 * n, 4: u8;
    });

    register!(Pupdr {
        pupd / set_pupd @ 0 + 2 * n, 2: vals::Pupd;
    });
}

pub mod vals {
    use super::super::common::value_enum;

    value_enum!(Pupd: u8 {
        FLOATING = 0,
        PULLUP = 1,
        PULLDOWN = 2,
    });
}
