//! Detects NaN and infinities anywhere inside a serializable value
//!
//! `serde_json` writes non-finite floats as `null`, which would make
//! `f(NaN)`, `f(inf)` and `f(None)` share a key. Arguments are walked with
//! this serializer before they are captured.

use serde::ser::{self, Serialize};
use std::fmt;

#[derive(Debug)]
pub(crate) struct NonFinite(String);

impl fmt::Display for NonFinite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for NonFinite {}

impl ser::Error for NonFinite {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        NonFinite(msg.to_string())
    }
}

/// Fail on the first non-finite float in `value`
pub(crate) fn ensure_finite<T: Serialize + ?Sized>(value: &T) -> Result<(), NonFinite> {
    value.serialize(&mut Walker)
}

struct Walker;

type Walked = Result<(), NonFinite>;

fn finite(v: f64) -> Walked {
    if v.is_finite() {
        Ok(())
    } else {
        Err(NonFinite(format!("non-finite float {} has no stable key", v)))
    }
}

impl<'a> ser::Serializer for &'a mut Walker {
    type Ok = ();
    type Error = NonFinite;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_f32(self, v: f32) -> Walked {
        finite(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Walked {
        finite(v)
    }

    fn serialize_bool(self, _: bool) -> Walked {
        Ok(())
    }

    fn serialize_i8(self, _: i8) -> Walked {
        Ok(())
    }

    fn serialize_i16(self, _: i16) -> Walked {
        Ok(())
    }

    fn serialize_i32(self, _: i32) -> Walked {
        Ok(())
    }

    fn serialize_i64(self, _: i64) -> Walked {
        Ok(())
    }

    fn serialize_i128(self, _: i128) -> Walked {
        Ok(())
    }

    fn serialize_u8(self, _: u8) -> Walked {
        Ok(())
    }

    fn serialize_u16(self, _: u16) -> Walked {
        Ok(())
    }

    fn serialize_u32(self, _: u32) -> Walked {
        Ok(())
    }

    fn serialize_u64(self, _: u64) -> Walked {
        Ok(())
    }

    fn serialize_u128(self, _: u128) -> Walked {
        Ok(())
    }

    fn serialize_char(self, _: char) -> Walked {
        Ok(())
    }

    fn serialize_str(self, _: &str) -> Walked {
        Ok(())
    }

    fn serialize_bytes(self, _: &[u8]) -> Walked {
        Ok(())
    }

    fn serialize_none(self) -> Walked {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Walked {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Walked {
        Ok(())
    }

    fn serialize_unit_struct(self, _: &'static str) -> Walked {
        Ok(())
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Walked {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _: &'static str, value: &T) -> Walked {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Walked {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, NonFinite> {
        Ok(self)
    }
}

impl<'a> ser::SerializeSeq for &'a mut Walker {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Walked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Walked {
        Ok(())
    }
}

impl<'a> ser::SerializeTuple for &'a mut Walker {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Walked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Walked {
        Ok(())
    }
}

impl<'a> ser::SerializeTupleStruct for &'a mut Walker {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Walked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Walked {
        Ok(())
    }
}

impl<'a> ser::SerializeTupleVariant for &'a mut Walker {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Walked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Walked {
        Ok(())
    }
}

impl<'a> ser::SerializeMap for &'a mut Walker {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Walked {
        key.serialize(&mut **self)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Walked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Walked {
        Ok(())
    }
}

impl<'a> ser::SerializeStruct for &'a mut Walker {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Walked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Walked {
        Ok(())
    }
}

impl<'a> ser::SerializeStructVariant for &'a mut Walker {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Walked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Walked {
        Ok(())
    }
}
