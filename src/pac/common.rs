//! Volatile register primitives.

use core::marker::PhantomData;

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct RW;
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct R;
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct W;

mod sealed {
    use super::*;
    pub trait Access {}
    impl Access for R {}
    impl Access for W {}
    impl Access for RW {}
}

pub trait Access: sealed::Access + Copy {}
impl Access for R {}
impl Access for W {}
impl Access for RW {}

pub trait Read: Access {}
impl Read for RW {}
impl Read for R {}

pub trait Write: Access {}
impl Write for RW {}
impl Write for W {}

/// A single memory-mapped register of type `T`.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Reg<T: Copy, A: Access> {
    ptr: *mut u8,
    phantom: PhantomData<*mut (T, A)>,
}
unsafe impl<T: Copy, A: Access> Send for Reg<T, A> {}
unsafe impl<T: Copy, A: Access> Sync for Reg<T, A> {}

impl<T: Copy, A: Access> Reg<T, A> {
    #[allow(clippy::missing_safety_doc)]
    #[inline(always)]
    pub const unsafe fn from_ptr(ptr: *mut T) -> Self {
        Self {
            ptr: ptr as _,
            phantom: PhantomData,
        }
    }

    #[inline(always)]
    pub const fn as_ptr(&self) -> *mut T {
        self.ptr as _
    }
}

impl<T: Copy, A: Read> Reg<T, A> {
    #[inline(always)]
    pub fn read(&self) -> T {
        unsafe { (self.ptr as *mut T).read_volatile() }
    }
}

impl<T: Copy, A: Write> Reg<T, A> {
    #[inline(always)]
    pub fn write_value(&self, val: T) {
        unsafe { (self.ptr as *mut T).write_volatile(val) }
    }
}

impl<T: Default + Copy, A: Write> Reg<T, A> {
    /// Write a value built from the register's reset value.
    #[inline(always)]
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut val = Default::default();
        let res = f(&mut val);
        self.write_value(val);
        res
    }
}

impl<T: Copy, A: Read + Write> Reg<T, A> {
    /// Read, modify, write back.
    #[inline(always)]
    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut val = self.read();
        let res = f(&mut val);
        self.write_value(val);
        res
    }
}

/// Conversion between a field value and its raw bits.
pub trait FieldValue: Copy {
    fn from_bits(bits: u32) -> Self;
    fn to_bits(self) -> u32;
}

impl FieldValue for bool {
    #[inline(always)]
    fn from_bits(bits: u32) -> Self {
        bits != 0
    }
    #[inline(always)]
    fn to_bits(self) -> u32 {
        self as u32
    }
}

macro_rules! impl_field_value_int {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                #[inline(always)]
                fn from_bits(bits: u32) -> Self {
                    bits as $ty
                }
                #[inline(always)]
                fn to_bits(self) -> u32 {
                    self as u32
                }
            }
        )*
    };
}

impl_field_value_int!(u8, u16, u32);

#[inline(always)]
pub(crate) const fn mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// Declares a `#[repr(transparent)]` register value type with field accessors.
///
/// Plain fields: `getter / setter @ offset, width: Type;`
/// Per-channel fields: `getter / setter @ offset + stride * n, width: Type;`
macro_rules! register {
    (
        $(#[$rm:meta])*
        $name:ident {
            $(
                $(#[$fm:meta])*
                $get:ident / $set:ident @ $pos:literal $(+ $stride:literal * n)?, $width:literal: $ty:ty;
            )*
        }
    ) => {
        $(#[$rm])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Eq, PartialEq, Default)]
        pub struct $name(pub u32);

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::write!(f, "{}({:#010x})", stringify!($name), self.0)
            }
        }

        impl $name {
            $(
                register!(@field $(#[$fm])* $get / $set @ $pos $(+ $stride * n)?, $width: $ty);
            )*
        }
    };

    (@field $(#[$fm:meta])* $get:ident / $set:ident @ $pos:literal, $width:literal: $ty:ty) => {
        $(#[$fm])*
        #[inline(always)]
        pub fn $get(&self) -> $ty {
            <$ty as $crate::pac::common::FieldValue>::from_bits(
                (self.0 >> $pos) & $crate::pac::common::mask($width),
            )
        }
        $(#[$fm])*
        #[inline(always)]
        pub fn $set(&mut self, val: $ty) {
            let m = $crate::pac::common::mask($width) << $pos;
            self.0 = (self.0 & !m) | (($crate::pac::common::FieldValue::to_bits(val) << $pos) & m);
        }
    };

    (@field $(#[$fm:meta])* $get:ident / $set:ident @ $pos:literal + $stride:literal * n, $width:literal: $ty:ty) => {
        $(#[$fm])*
        #[inline(always)]
        pub fn $get(&self, n: usize) -> $ty {
            let pos = $pos + $stride * n;
            <$ty as $crate::pac::common::FieldValue>::from_bits(
                (self.0 >> pos) & $crate::pac::common::mask($width),
            )
        }
        $(#[$fm])*
        #[inline(always)]
        pub fn $set(&mut self, n: usize, val: $ty) {
            let pos = $pos + $stride * n;
            let m = $crate::pac::common::mask($width) << pos;
            self.0 = (self.0 & !m) | (($crate::pac::common::FieldValue::to_bits(val) << pos) & m);
        }
    };
}

/// Declares a field value type backed by a raw integer, chiptool style.
macro_rules! value_enum {
    (
        $(#[$m:meta])*
        $name:ident: $raw:ty {
            $( $(#[$vm:meta])* $variant:ident = $val:literal, )*
        }
    ) => {
        $(#[$m])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
        pub struct $name(pub $raw);

        #[allow(non_upper_case_globals)]
        impl $name {
            $( $(#[$vm])* pub const $variant: Self = Self($val); )*

            #[inline(always)]
            pub const fn from_bits(val: $raw) -> Self {
                Self(val)
            }

            #[inline(always)]
            pub const fn to_bits(self) -> $raw {
                self.0
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self.0 {
                    $( $val => f.write_str(stringify!($variant)), )*
                    other => core::write!(f, "0x{:02X}", other),
                }
            }
        }

        #[cfg(feature = "defmt")]
        impl defmt::Format for $name {
            fn format(&self, f: defmt::Formatter) {
                match self.0 {
                    $( $val => defmt::write!(f, "{}", stringify!($variant)), )*
                    other => defmt::write!(f, "0x{=u32:x}", other as u32),
                }
            }
        }

        impl $crate::pac::common::FieldValue for $name {
            #[inline(always)]
            fn from_bits(bits: u32) -> Self {
                Self(bits as $raw)
            }
            #[inline(always)]
            fn to_bits(self) -> u32 {
                self.0 as u32
            }
        }
    };
}

pub(crate) use {register, value_enum};
