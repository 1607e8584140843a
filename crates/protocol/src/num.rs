//! Lenient integer decoding.
//!
//! The agent re-serializes leak lists through an untyped JSON layer that
//! turns every number into a double, so `{"fd":42}` may arrive as
//! `{"fd":42.0}`. These helpers accept integral floats and reject anything
//! fractional, negative (for unsigned fields) or out of range.

use std::fmt;
use std::marker::PhantomData;

use serde::Deserializer;
use serde::de::{self, Visitor};

struct IntegralVisitor<T>(PhantomData<T>);

impl<'de, T> Visitor<'de> for IntegralVisitor<T>
where
    T: TryFrom<u64> + TryFrom<i64>,
{
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer or an integral float")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<T, E> {
        <T as TryFrom<u64>>::try_from(v)
            .map_err(|_| E::custom(format!("{v} is out of range")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<T, E> {
        <T as TryFrom<i64>>::try_from(v)
            .map_err(|_| E::custom(format!("{v} is out of range")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<T, E> {
        if v.fract() != 0.0 || !v.is_finite() {
            return Err(E::custom(format!("{v} is not an integer")));
        }
        if v < 0.0 {
            self.visit_i64(v as i64)
        } else {
            self.visit_u64(v as u64)
        }
    }
}

pub(crate) fn u64_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    d.deserialize_any(IntegralVisitor(PhantomData))
}

pub(crate) fn i32_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    d.deserialize_any(IntegralVisitor(PhantomData))
}
