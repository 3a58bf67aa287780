//! Reset and clock control.

use super::common::{Reg, RW};

/// Value written to `UNLOCK.MAGIC` to open or close the protected register window.
pub const UNLOCK_MAGIC: u32 = 0x2AD5_334C;

/// Value that must accompany every write to a keyed register (bits 31:16).
pub const KEY: u16 = 0x5A69;

#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Rcc {
    ptr: *mut u8,
}
unsafe impl Send for Rcc {}
unsafe impl Sync for Rcc {}

impl Rcc {
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
    const fn reg<T: Copy>(self, offset: usize) -> Reg<T, RW> {
        unsafe { Reg::from_ptr(self.ptr.add(offset) as _) }
    }

    /// AHB clock divider.
    #[inline(always)]
    pub const fn hclkdiv(self) -> Reg<regs::Hclkdiv, RW> {
        self.reg(0x00)
    }
    /// APB clock divider.
    #[inline(always)]
    pub const fn pclkdiv(self) -> Reg<regs::Pclkdiv, RW> {
        self.reg(0x04)
    }
    /// AHB peripheral clock enable.
    #[inline(always)]
    pub const fn hclken(self) -> Reg<regs::Gate, RW> {
        self.reg(0x08)
    }
    /// APB peripheral clock enable.
    #[inline(always)]
    pub const fn pclken(self) -> Reg<regs::Gate, RW> {
        self.reg(0x0C)
    }
    /// Clock output control.
    #[inline(always)]
    pub const fn mcocr(self) -> Reg<regs::Mcocr, RW> {
        self.reg(0x10)
    }
    /// Reset status.
    #[inline(always)]
    pub const fn rstsr(self) -> Reg<regs::Rstsr, RW> {
        self.reg(0x1C)
    }
    /// Oscillator enable (keyed).
    #[inline(always)]
    pub const fn sysclkcr(self) -> Reg<regs::Sysclkcr, RW> {
        self.reg(0x20)
    }
    /// System clock select and status (keyed).
    #[inline(always)]
    pub const fn sysclksel(self) -> Reg<regs::Sysclksel, RW> {
        self.reg(0x24)
    }
    /// HIRC trim and ready (keyed).
    #[inline(always)]
    pub const fn hirccr(self) -> Reg<regs::Hirccr, RW> {
        self.reg(0x28)
    }
    /// HXT drive, startup and ready (keyed).
    #[inline(always)]
    pub const fn hxtcr(self) -> Reg<regs::Hxtcr, RW> {
        self.reg(0x2C)
    }
    /// SIRC trim, startup and ready (keyed).
    #[inline(always)]
    pub const fn sirccr(self) -> Reg<regs::Sirccr, RW> {
        self.reg(0x30)
    }
    /// LXT drive, startup and ready (keyed).
    #[inline(always)]
    pub const fn lxtcr(self) -> Reg<regs::Lxtcr, RW> {
        self.reg(0x34)
    }
    /// APB peripheral reset.
    #[inline(always)]
    pub const fn perirst(self) -> Reg<regs::Gate, RW> {
        self.reg(0x44)
    }
    /// PLL enable, ready and source (keyed).
    #[inline(always)]
    pub const fn pllcr1(self) -> Reg<regs::Pllcr1, RW> {
        self.reg(0x4C)
    }
    /// PLL dividers.
    #[inline(always)]
    pub const fn pllcr2(self) -> Reg<regs::Pllcr2, RW> {
        self.reg(0x50)
    }
    /// Register write protection.
    #[inline(always)]
    pub const fn unlock(self) -> Reg<regs::Unlock, RW> {
        self.reg(0x80)
    }
}

pub mod regs {
    use super::super::common::register;
    use super::vals;

    register!(Hclkdiv {
        ahbckdiv / set_ahbckdiv @ 0, 8: vals::Clkdiv;
    });

    register!(Pclkdiv {
        apbckdiv / set_apbckdiv @ 0, 8: vals::Clkdiv;
    });

    register!(
        /// One enable (or reset) bit per peripheral.
        Gate {
            en / set_en @ 0 + 1 * n, 1: bool;
        }
    );

    register!(Mcocr {
        mcosel / set_mcosel @ 0, 3: vals::Mcosel;
        mcoen / set_mcoen @ 3, 1: bool;
        mcodiv / set_mcodiv @ 4, 8: u8;
    });

    register!(Rstsr {
        lvdrst / set_lvdrst @ 0, 1: bool;
        wwdgrst / set_wwdgrst @ 1, 1: bool;
        iwdgrst / set_iwdgrst @ 2, 1: bool;
        lockuprst / set_lockuprst @ 3, 1: bool;
        sftrst / set_sftrst @ 4, 1: bool;
        padrst / set_padrst @ 5, 1: bool;
        porrst / set_porrst @ 6, 1: bool;
    });

    register!(Sysclkcr {
        hircen / set_hircen @ 0, 1: bool;
        hxten / set_hxten @ 1, 1: bool;
        sircen / set_sircen @ 2, 1: bool;
        lxten / set_lxten @ 3, 1: bool;
        key / set_key @ 16, 16: u16;
    });

    register!(Sysclksel {
        /// Requested source.
        clksw / set_clksw @ 0, 3: vals::Sw;
        /// Source currently driving SYSCLK (read-only).
        clksta / set_clksta @ 4, 3: vals::Sw;
        key / set_key @ 16, 16: u16;
    });

    register!(Hirccr {
        hirctrim / set_hirctrim @ 0, 12: u16;
        hircrdy / set_hircrdy @ 12, 1: bool;
        key / set_key @ 16, 16: u16;
    });

    register!(Hxtcr {
        hxtdrv / set_hxtdrv @ 0, 4: u8;
        hxtstartup / set_hxtstartup @ 4, 2: vals::Startup;
        hxtrdy / set_hxtrdy @ 6, 1: bool;
        hxtbyp / set_hxtbyp @ 8, 1: bool;
        key / set_key @ 16, 16: u16;
    });

    register!(Sirccr {
        sirctrim / set_sirctrim @ 0, 9: u16;
        sircstartup / set_sircstartup @ 10, 2: vals::Startup;
        sircrdy / set_sircrdy @ 12, 1: bool;
        key / set_key @ 16, 16: u16;
    });

    register!(Lxtcr {
        lxtdrv / set_lxtdrv @ 0, 4: u8;
        lxtstartup / set_lxtstartup @ 4, 2: vals::Startup;
        lxtrdy / set_lxtrdy @ 6, 1: bool;
        lxtbyp / set_lxtbyp @ 8, 1: bool;
        key / set_key @ 16, 16: u16;
    });

    register!(Pllcr1 {
        pllen / set_pllen @ 0, 1: bool;
        pllrdy / set_pllrdy @ 1, 1: bool;
        pllsrc / set_pllsrc @ 2, 2: vals::Pllsrc;
        key / set_key @ 16, 16: u16;
    });

    register!(Pllcr2 {
        /// Reference divider minus one.
        pllm / set_pllm @ 0, 4: u8;
        /// Feedback multiplier.
        plln / set_plln @ 4, 8: u8;
        /// System divider minus one.
        pllsysdiv / set_pllsysdiv @ 16, 6: u8;
    });

    register!(Unlock {
        unlock / set_unlock @ 0, 1: bool;
        magic / set_magic @ 1, 31: u32;
    });
}

pub mod vals {
    use super::super::common::value_enum;

    value_enum!(
        /// System clock source.
        Sw: u8 {
            HIRC = 0,
            HXT = 1,
            SIRC = 2,
            LXT = 3,
            PLL = 4,
        }
    );

    value_enum!(
        /// Bus clock divider: 0 is /1, `n` is /(2n).
        Clkdiv: u8 {
            DIV1 = 0,
            DIV2 = 1,
            DIV4 = 2,
            DIV8 = 4,
            DIV16 = 8,
            DIV32 = 16,
            DIV64 = 32,
            DIV128 = 64,
            DIV256 = 128,
        }
    );

    value_enum!(
        /// Oscillator startup delay in cycles.
        Startup: u8 {
            CYCLES_256 = 0,
            CYCLES_1024 = 1,
            CYCLES_4096 = 2,
            CYCLES_16384 = 3,
        }
    );

    value_enum!(
        Pllsrc: u8 {
            HIRC = 0,
            HXT = 1,
        }
    );

    value_enum!(
        /// Clock output source.
        Mcosel: u8 {
            HIRC = 0,
            HXT = 1,
            SIRC = 2,
            LXT = 3,
            PLL = 4,
            SYSCLK = 5,
            HCLK = 6,
        }
    );
}
