use serde::ser::{self, Impossible, Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// Returns `true` if `value` is the absence sentinel.
///
/// `None`, `()` and unit structs are absent. `Some(v)` and newtype wrappers
/// are absent when the wrapped value is. Everything else is a real value.
/// Nothing is allocated; the value is only walked until its shape is known.
pub fn is_absent<V: Serialize + ?Sized>(value: &V) -> bool {
    matches!(value.serialize(AbsenceProbe), Ok(true))
}

#[derive(Debug)]
struct Present;

impl Display for Present {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "value is present")
    }
}

impl std::error::Error for Present {}

impl ser::Error for Present {
    fn custom<T: Display>(_msg: T) -> Self {
        Present
    }
}

struct AbsenceProbe;

impl Serializer for AbsenceProbe {
    type Ok = bool;
    type Error = Present;
    type SerializeSeq = Impossible<bool, Present>;
    type SerializeTuple = Impossible<bool, Present>;
    type SerializeTupleStruct = Impossible<bool, Present>;
    type SerializeTupleVariant = Impossible<bool, Present>;
    type SerializeMap = Impossible<bool, Present>;
    type SerializeStruct = Impossible<bool, Present>;
    type SerializeStructVariant = Impossible<bool, Present>;

    fn serialize_bool(self, _v: bool) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i8(self, _v: i8) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i16(self, _v: i16) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i32(self, _v: i32) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_i64(self, _v: i64) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u8(self, _v: u8) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u16(self, _v: u16) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u32(self, _v: u32) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_u64(self, _v: u64) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_f32(self, _v: f32) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_f64(self, _v: f64) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_char(self, _v: char) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_str(self, _v: &str) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_none(self) -> Result<bool, Present> {
        Ok(true)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<bool, Present> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<bool, Present> {
        Ok(true)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<bool, Present> {
        Ok(true)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<bool, Present> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<bool, Present> {
        Ok(false)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Present> {
        Err(Present)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Present> {
        Err(Present)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Present> {
        Err(Present)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Present> {
        Err(Present)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Present> {
        Err(Present)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Present> {
        Err(Present)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Present> {
        Err(Present)
    }
}
