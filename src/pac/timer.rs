//! Advanced and general purpose timers (TIM1, TIM2).
//!
//! Both instances share one register layout; `RCR`, `BDTR` and the
//! complementary enable bits only have an effect on TIM1.

use super::common::{Reg, RW};

#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Tim {
    ptr: *mut u8,
}
unsafe impl Send for Tim {}
unsafe impl Sync for Tim {}

impl Tim {
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

    #[inline(always)]
    pub const fn cr1(self) -> Reg<regs::Cr1, RW> {
        self.reg(0x00)
    }
    #[inline(always)]
    pub const fn cr2(self) -> Reg<regs::Cr2, RW> {
        self.reg(0x04)
    }
    /// Slave mode control.
    #[inline(always)]
    pub const fn smcr(self) -> Reg<regs::Smcr, RW> {
        self.reg(0x08)
    }
    /// DMA/interrupt enable.
    #[inline(always)]
    pub const fn dier(self) -> Reg<regs::Dier, RW> {
        self.reg(0x0C)
    }
    /// Status flags.
    #[inline(always)]
    pub const fn sr(self) -> Reg<regs::Sr, RW> {
        self.reg(0x10)
    }
    /// Event generation.
    #[inline(always)]
    pub const fn egr(self) -> Reg<regs::Egr, RW> {
        self.reg(0x14)
    }
    /// Capture/compare mode, output view. `n` is 0 for channels 1-2, 1 for channels 3-4.
    #[inline(always)]
    pub const fn ccmr_output(self, n: usize) -> Reg<regs::CcmrOutput, RW> {
        assert!(n < 2);
        self.reg(0x18 + n * 4)
    }
    /// Capture/compare mode, input view. `n` is 0 for channels 1-2, 1 for channels 3-4.
    #[inline(always)]
    pub const fn ccmr_input(self, n: usize) -> Reg<regs::CcmrInput, RW> {
        assert!(n < 2);
        self.reg(0x18 + n * 4)
    }
    /// Capture/compare enable.
    #[inline(always)]
    pub const fn ccer(self) -> Reg<regs::Ccer, RW> {
        self.reg(0x20)
    }
    #[inline(always)]
    pub const fn cnt(self) -> Reg<u32, RW> {
        self.reg(0x24)
    }
    #[inline(always)]
    pub const fn psc(self) -> Reg<u32, RW> {
        self.reg(0x28)
    }
    /// Auto-reload.
    #[inline(always)]
    pub const fn arr(self) -> Reg<u32, RW> {
        self.reg(0x2C)
    }
    /// Repetition counter.
    #[inline(always)]
    pub const fn rcr(self) -> Reg<u32, RW> {
        self.reg(0x30)
    }
    /// Capture/compare value of channel `n` (0..4).
    #[inline(always)]
    pub const fn ccr(self, n: usize) -> Reg<u32, RW> {
        assert!(n < 4);
        self.reg(0x34 + n * 4)
    }
    /// Break and dead-time.
    #[inline(always)]
    pub const fn bdtr(self) -> Reg<regs::Bdtr, RW> {
        self.reg(0x44)
    }
}

pub mod regs {
    use super::super::common::register;
    use super::vals;

    register!(Cr1 {
        cen / set_cen @ 0, 1: bool;
        udis / set_udis @ 1, 1: bool;
        urs / set_urs @ 2, 1: vals::Urs;
        opm / set_opm @ 3, 1: bool;
        dir / set_dir @ 4, 1: vals::Dir;
        cms / set_cms @ 5, 2: vals::Cms;
        arpe / set_arpe @ 7, 1: bool;
        ckd / set_ckd @ 8, 2: vals::Ckd;
    });

    register!(Cr2 {
        /// Capture/compare preloaded control.
        ccpc / set_ccpc @ 0, 1: bool;
        /// Capture/compare control update selection.
        ccus / set_ccus @ 2, 1: bool;
        ccds / set_ccds @ 3, 1: bool;
        mms / set_mms @ 4, 3: vals::Mms;
        /// TI1 is the XOR of CH1, CH2 and CH3.
        ti1s / set_ti1s @ 7, 1: bool;
        ois / set_ois @ 8 + 2 * n, 1: bool;
        oisn / set_oisn @ 9 + 2 * n, 1: bool;
    });

    register!(Smcr {
        sms / set_sms @ 0, 3: vals::Sms;
        occs / set_occs @ 3, 1: bool;
        ts / set_ts @ 4, 3: vals::Ts;
        msm / set_msm @ 7, 1: bool;
        etf / set_etf @ 8, 4: u8;
        etps / set_etps @ 12, 2: vals::Etps;
        ece / set_ece @ 14, 1: bool;
        etp / set_etp @ 15, 1: bool;
    });

    register!(Dier {
        uie / set_uie @ 0, 1: bool;
        ccie / set_ccie @ 1 + 1 * n, 1: bool;
        comie / set_comie @ 5, 1: bool;
        tie / set_tie @ 6, 1: bool;
        bie / set_bie @ 7, 1: bool;
        ude / set_ude @ 8, 1: bool;
        ccde / set_ccde @ 9 + 1 * n, 1: bool;
        comde / set_comde @ 13, 1: bool;
        tde / set_tde @ 14, 1: bool;
    });

    register!(Sr {
        uif / set_uif @ 0, 1: bool;
        ccif / set_ccif @ 1 + 1 * n, 1: bool;
        comif / set_comif @ 5, 1: bool;
        tif / set_tif @ 6, 1: bool;
        bif / set_bif @ 7, 1: bool;
        ccof / set_ccof @ 9 + 1 * n, 1: bool;
    });

    impl Sr {
        /// Every interrupt and overcapture flag.
        pub const FLAGS: u32 = 0x1EFF;

        /// Value that clears the flags in `clear` and leaves the rest
        /// pending. Flags are cleared by writing 0, written ones have no
        /// effect.
        pub const fn clearing(clear: Sr) -> Sr {
            Sr(Self::FLAGS & !clear.0)
        }
    }

    register!(Egr {
        ug / set_ug @ 0, 1: bool;
        ccg / set_ccg @ 1 + 1 * n, 1: bool;
        comg / set_comg @ 5, 1: bool;
        tg / set_tg @ 6, 1: bool;
        bg / set_bg @ 7, 1: bool;
    });

    register!(CcmrOutput {
        ccs / set_ccs @ 0 + 8 * n, 2: vals::Ccs;
        ocfe / set_ocfe @ 2 + 8 * n, 1: bool;
        ocpe / set_ocpe @ 3 + 8 * n, 1: bool;
        ocm / set_ocm @ 4 + 8 * n, 3: vals::Ocm;
        /// OCxREF clear enable.
        occe / set_occe @ 7 + 8 * n, 1: bool;
    });

    register!(CcmrInput {
        ccs / set_ccs @ 0 + 8 * n, 2: vals::Ccs;
        icpsc / set_icpsc @ 2 + 8 * n, 2: vals::Icpsc;
        icf / set_icf @ 4 + 8 * n, 4: u8;
    });

    register!(Ccer {
        cce / set_cce @ 0 + 4 * n, 1: bool;
        ccp / set_ccp @ 1 + 4 * n, 1: bool;
        ccne / set_ccne @ 2 + 4 * n, 1: bool;
        ccnp / set_ccnp @ 3 + 4 * n, 1: bool;
    });

    impl Ccer {
        /// Every CCxE bit.
        pub const CCE_MASK: u32 = 0x1111;
        /// Every CCxNE bit.
        pub const CCNE_MASK: u32 = 0x0444;
    }

    register!(Bdtr {
        dtg / set_dtg @ 0, 8: u8;
        lock / set_lock @ 8, 2: vals::Lock;
        /// Off-state selection for idle mode.
        ossi / set_ossi @ 10, 1: bool;
        /// Off-state selection for run mode.
        ossr / set_ossr @ 11, 1: bool;
        bke / set_bke @ 12, 1: bool;
        bkp / set_bkp @ 13, 1: bool;
        aoe / set_aoe @ 14, 1: bool;
        moe / set_moe @ 15, 1: bool;
    });
}

pub mod vals {
    use super::super::common::value_enum;

    value_enum!(Urs: u8 {
        ANYEVENT = 0,
        COUNTERONLY = 1,
    });

    value_enum!(Dir: u8 {
        UP = 0,
        DOWN = 1,
    });

    value_enum!(Cms: u8 {
        EDGEALIGNED = 0,
        CENTERALIGNED1 = 1,
        CENTERALIGNED2 = 2,
        CENTERALIGNED3 = 3,
    });

    value_enum!(Ckd: u8 {
        DIV1 = 0,
        DIV2 = 1,
        DIV4 = 2,
    });

    value_enum!(
        /// Master mode selection (TRGO source).
        Mms: u8 {
            RESET = 0,
            ENABLE = 1,
            UPDATE = 2,
            COMPAREPULSE = 3,
            COMPAREOC1 = 4,
            COMPAREOC2 = 5,
            COMPAREOC3 = 6,
            COMPAREOC4 = 7,
        }
    );

    value_enum!(
        /// Slave mode selection.
        Sms: u8 {
            DISABLED = 0,
            ENCODERMODE1 = 1,
            ENCODERMODE2 = 2,
            ENCODERMODE3 = 3,
            RESETMODE = 4,
            GATEDMODE = 5,
            TRIGGERMODE = 6,
            EXTCLOCKMODE = 7,
        }
    );

    value_enum!(
        /// Trigger selection.
        Ts: u8 {
            ITR0 = 0,
            ITR1 = 1,
            ITR2 = 2,
            ITR3 = 3,
            TI1F_ED = 4,
            TI1FP1 = 5,
            TI2FP2 = 6,
            ETRF = 7,
        }
    );

    value_enum!(Etps: u8 {
        DIV1 = 0,
        DIV2 = 1,
        DIV4 = 2,
        DIV8 = 3,
    });

    value_enum!(
        /// Capture/compare selection.
        Ccs: u8 {
            OUTPUT = 0,
            /// Input mapped on its own TIx.
            DIRECT = 1,
            /// Input mapped on the neighbouring TIx.
            INDIRECT = 2,
            TRC = 3,
        }
    );

    value_enum!(Ocm: u8 {
        FROZEN = 0,
        ACTIVEONMATCH = 1,
        INACTIVEONMATCH = 2,
        TOGGLE = 3,
        FORCEINACTIVE = 4,
        FORCEACTIVE = 5,
        PWMMODE1 = 6,
        PWMMODE2 = 7,
    });

    value_enum!(Icpsc: u8 {
        DIV1 = 0,
        DIV2 = 1,
        DIV4 = 2,
        DIV8 = 3,
    });

    value_enum!(Lock: u8 {
        OFF = 0,
        LEVEL1 = 1,
        LEVEL2 = 2,
        LEVEL3 = 3,
    });
}
