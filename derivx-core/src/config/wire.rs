//! Serde adapters that keep the flat wire encoding of enum-valued fields.
//!
//! Engines read integer codes and one-letter greek tags; zero / empty string
//! is the "unset" value of every such field.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

/// An enum carried on the wire as a small non-zero integer.
pub trait WireCode: Sized + Copy {
    const NAME: &'static str;
    fn code(self) -> u8;
    fn from_code(code: u8) -> Option<Self>;
}

/// `Option<T>` <-> integer, with `0` meaning `None`.
pub mod optional_code {
    use super::*;

    pub fn serialize<T: WireCode, S: Serializer>(
        value: &Option<T>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(value.map_or(0, WireCode::code))
    }

    pub fn deserialize<'de, T: WireCode, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<T>, D::Error> {
        let code = u8::deserialize(deserializer)?;
        if code == 0 {
            return Ok(None);
        }
        T::from_code(code)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("unknown {} code {code}", T::NAME)))
    }
}

/// `Option<Greek>` <-> `""` / one-letter tag.
pub mod greek_tag {
    use super::*;
    use crate::config::Greek;

    pub fn serialize<S: Serializer>(value: &Option<Greek>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.map_or("", Greek::tag))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Greek>, D::Error> {
        let tag = String::deserialize(deserializer)?;
        if tag.is_empty() {
            return Ok(None);
        }
        Greek::from_tag(&tag)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("unknown calc_greek tag {tag:?}")))
    }
}
