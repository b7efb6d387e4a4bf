use serde::ser::{self, Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// Returns the first NaN or infinite float found anywhere inside `value`.
///
/// JSON has no literal for non-finite numbers and `serde_json` writes them as
/// `null`, which would neither read back as the original value nor stay
/// distinguishable from an absent one.
pub(crate) fn find_non_finite<V: Serialize + ?Sized>(value: &V) -> Option<f64> {
    match value.serialize(FiniteWalker) {
        Err(Walk::NonFinite(found)) => Some(found),
        _ => None,
    }
}

#[derive(Debug)]
enum Walk {
    NonFinite(f64),
    // raised by the value's own Serialize impl; the encoder reports it
    Custom,
}

impl Display for Walk {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Walk::NonFinite(value) => write!(f, "non-finite float {}", value),
            Walk::Custom => write!(f, "value failed to serialize"),
        }
    }
}

impl std::error::Error for Walk {}

impl ser::Error for Walk {
    fn custom<T: Display>(_msg: T) -> Self {
        Walk::Custom
    }
}

#[derive(Clone, Copy)]
struct FiniteWalker;

fn check(value: f64) -> Result<(), Walk> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Walk::NonFinite(value))
    }
}

impl Serializer for FiniteWalker {
    type Ok = ();
    type Error = Walk;
    type SerializeSeq = FiniteWalker;
    type SerializeTuple = FiniteWalker;
    type SerializeTupleStruct = FiniteWalker;
    type SerializeTupleVariant = FiniteWalker;
    type SerializeMap = FiniteWalker;
    type SerializeStruct = FiniteWalker;
    type SerializeStructVariant = FiniteWalker;

    fn serialize_bool(self, _v: bool) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<(), Walk> {
        check(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<(), Walk> {
        check(v)
    }

    fn serialize_char(self, _v: char) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_none(self) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), Walk> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<(), Walk> {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), Walk> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), Walk> {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<FiniteWalker, Walk> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<FiniteWalker, Walk> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<FiniteWalker, Walk> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<FiniteWalker, Walk> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<FiniteWalker, Walk> {
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<FiniteWalker, Walk> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<FiniteWalker, Walk> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteWalker {
    type Ok = ();
    type Error = Walk;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Walk> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Walk> {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteWalker {
    type Ok = ();
    type Error = Walk;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Walk> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Walk> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteWalker {
    type Ok = ();
    type Error = Walk;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Walk> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Walk> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteWalker {
    type Ok = ();
    type Error = Walk;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Walk> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Walk> {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteWalker {
    type Ok = ();
    type Error = Walk;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Walk> {
        key.serialize(*self)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Walk> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Walk> {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteWalker {
    type Ok = ();
    type Error = Walk;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), Walk> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Walk> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteWalker {
    type Ok = ();
    type Error = Walk;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), Walk> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Walk> {
        Ok(())
    }
}
