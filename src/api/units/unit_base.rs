/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

// The unit types share their implementation through a macro, as traits don't
// support const.
//
// Arithmetic never traps on the infinity sentinels:
// an infinite operand propagates and finite overflow saturates to the matching
// infinity. One sided units (rates, sizes) clamp at zero instead of going
// negative.
macro_rules! unit_base {
    ($ty:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
        pub struct $ty(i64);

        impl $ty {
            pub const fn zero() -> Self {
                Self(0)
            }

            pub const fn plus_infinity() -> Self {
                Self(i64::MAX)
            }

            pub const fn minus_infinity() -> Self {
                Self(i64::MIN)
            }

            pub const fn is_zero(&self) -> bool {
                self.0 == 0
            }

            pub const fn is_finite(&self) -> bool {
                !self.is_infinite()
            }

            pub const fn is_infinite(&self) -> bool {
                self.0 == i64::MAX || self.0 == i64::MIN
            }

            pub const fn is_plus_infinity(&self) -> bool {
                self.0 == i64::MAX
            }

            pub const fn is_minus_infinity(&self) -> bool {
                self.0 == i64::MIN
            }

            pub fn clamped(&self, min_value: Self, max_value: Self) -> Self {
                Self(self.0.max(min_value.0).min(max_value.0))
            }

            pub fn clamp_to(&mut self, min_value: Self, max_value: Self) {
                *self = self.clamped(min_value, max_value);
            }

            const fn from_value(value: i64) -> Self {
                if Self::ONE_SIDED && value < 0 {
                    return Self(0);
                }
                Self(value)
            }

            fn from_value_float(value: f64) -> Self {
                assert!(!value.is_nan());
                if value >= i64::MAX as f64 {
                    return Self::plus_infinity();
                }
                if value <= i64::MIN as f64 {
                    return Self::from_value(i64::MIN);
                }
                Self::from_value(value as i64)
            }

            const fn from_fraction(denominator: i64, value: i64) -> Self {
                match value.checked_mul(denominator) {
                    Some(scaled) => Self::from_value(scaled),
                    None if value > 0 => Self::plus_infinity(),
                    None => Self::from_value(i64::MIN),
                }
            }

            fn from_fraction_float(denominator: f64, value: f64) -> Self {
                Self::from_value_float(value * denominator)
            }

            const fn to_value(&self) -> i64 {
                assert!(self.is_finite());
                self.0
            }

            const fn to_value_or(&self, fallback_value: i64) -> i64 {
                if self.is_finite() {
                    self.0
                } else {
                    fallback_value
                }
            }

            fn to_value_float(&self) -> f64 {
                if self.is_plus_infinity() {
                    f64::INFINITY
                } else if self.is_minus_infinity() {
                    f64::NEG_INFINITY
                } else {
                    self.0 as f64
                }
            }

            const fn to_fraction(&self, denominator: i64) -> i64 {
                self.divide_round_to_nearest(denominator)
            }

            fn to_fraction_float(&self, denominator: f64) -> f64 {
                self.to_value_float() / denominator
            }

            const fn to_fraction_or(&self, denominator: i64, fallback_value: i64) -> i64 {
                if self.is_finite() {
                    self.divide_round_to_nearest(denominator)
                } else {
                    fallback_value
                }
            }

            const fn divide_round_to_nearest(&self, d: i64) -> i64 {
                assert!(d > 0);

                let v = self.to_value();
                let mut result = v / d;
                let remainder = v % d;

                if remainder.abs() * 2 >= d {
                    if v < 0 {
                        result -= 1
                    } else {
                        result += 1
                    }
                }
                result
            }
        }
    };
}

macro_rules! relative_unit {
    ($ty:ident) => {
        crate::api::units::unit_base!($ty);

        impl ::std::ops::Add for $ty {
            type Output = Self;

            fn add(self, rhs: Self) -> Self::Output {
                if self.is_infinite() {
                    return self;
                }
                if rhs.is_infinite() {
                    return rhs;
                }
                match self.0.checked_add(rhs.0) {
                    Some(sum) => Self::from_value(sum),
                    None if rhs.0 > 0 => Self::plus_infinity(),
                    None => Self::from_value(i64::MIN),
                }
            }
        }

        impl ::std::ops::Sub for $ty {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self::Output {
                if self.is_infinite() {
                    return self;
                }
                if rhs.is_plus_infinity() {
                    return Self::from_value(i64::MIN);
                }
                if rhs.is_minus_infinity() {
                    return Self::plus_infinity();
                }
                match self.0.checked_sub(rhs.0) {
                    Some(difference) => Self::from_value(difference),
                    None if rhs.0 < 0 => Self::plus_infinity(),
                    None => Self::from_value(i64::MIN),
                }
            }
        }

        impl ::std::ops::AddAssign for $ty {
            fn add_assign(&mut self, rhs: Self) {
                *self = *self + rhs;
            }
        }

        impl ::std::ops::SubAssign for $ty {
            fn sub_assign(&mut self, rhs: Self) {
                *self = *self - rhs;
            }
        }

        impl ::std::ops::Neg for $ty {
            type Output = Self;

            fn neg(self) -> Self::Output {
                if self.is_plus_infinity() {
                    Self::from_value(i64::MIN)
                } else if self.is_minus_infinity() {
                    Self::plus_infinity()
                } else {
                    Self::from_value(-self.0)
                }
            }
        }

        impl ::std::ops::Div for $ty {
            type Output = f64;

            fn div(self, rhs: Self) -> Self::Output {
                self.to_value_float() / rhs.to_value_float()
            }
        }

        impl ::std::ops::Div<f64> for $ty {
            type Output = Self;

            fn div(self, rhs: f64) -> Self::Output {
                Self::from_value_float((self.to_value_float() / rhs).round())
            }
        }

        impl ::std::ops::Div<i64> for $ty {
            type Output = Self;

            fn div(self, rhs: i64) -> Self::Output {
                if self.is_infinite() {
                    return if rhs > 0 { self } else { -self };
                }
                Self::from_value(self.0 / rhs)
            }
        }

        impl ::std::ops::Mul<f64> for $ty {
            type Output = Self;

            fn mul(self, rhs: f64) -> Self::Output {
                if rhs == 0.0 {
                    return Self::zero();
                }
                Self::from_value_float((self.to_value_float() * rhs).round())
            }
        }

        impl ::std::ops::Mul<i64> for $ty {
            type Output = Self;

            fn mul(self, rhs: i64) -> Self::Output {
                if rhs == 0 {
                    return Self::zero();
                }
                if self.is_infinite() {
                    return if rhs > 0 { self } else { -self };
                }
                match self.0.checked_mul(rhs) {
                    Some(product) => Self::from_value(product),
                    None if (self.0 > 0) == (rhs > 0) => Self::plus_infinity(),
                    None => Self::from_value(i64::MIN),
                }
            }
        }

        impl ::std::ops::Mul<$ty> for f64 {
            type Output = $ty;

            fn mul(self, rhs: $ty) -> Self::Output {
                rhs * self
            }
        }

        impl ::std::ops::Mul<$ty> for i64 {
            type Output = $ty;

            fn mul(self, rhs: $ty) -> Self::Output {
                rhs * self
            }
        }
    };
}

pub(crate) use relative_unit;
pub(crate) use unit_base;
