use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Memory representation of a named variable.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Display,
)]
pub enum VarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    Pointer,
    Block,
    Utf8String,
    Utf16String,
    AnsiString,
}

impl VarType {
    /// Fixed byte width, or `None` for variable-width kinds.
    ///
    /// Pointer width follows the target process, which is always 64-bit for
    /// the supported games.
    pub fn width(&self) -> Option<usize> {
        match self {
            Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float => Some(4),
            Self::Int64 | Self::UInt64 | Self::Double | Self::Pointer => Some(8),
            Self::Block | Self::Utf8String | Self::Utf16String | Self::AnsiString => None,
        }
    }

    pub fn requires_size(&self) -> bool {
        matches!(self, Self::Block)
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Native calling-convention type used by hook parameters and returns.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Default,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NativeType {
    /// Return-only.
    #[default]
    Void,
    Int,
    Int8,
    Int16,
    Int32,
    UInt,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int64,
    Float,
    Double,
    Pointer,
    Bool,
}

/// How a raw argument or return value is presented to a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Signed integer up to 32 bits (bool included).
    Signed32,
    Unsigned32,
    Signed64,
    Unsigned64,
    /// Left as the engine's opaque pointer-like value.
    Opaque,
}

impl NativeType {
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    pub fn conversion(&self) -> Conversion {
        match self {
            Self::Int | Self::Int8 | Self::Int16 | Self::Int32 | Self::Bool => Conversion::Signed32,
            Self::UInt | Self::UInt8 | Self::UInt16 | Self::UInt32 => Conversion::Unsigned32,
            Self::Int64 => Conversion::Signed64,
            Self::UInt64 => Conversion::Unsigned64,
            Self::Float | Self::Double | Self::Pointer | Self::Void => Conversion::Opaque,
        }
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_var_type_names_match_table_format() {
        let names: Vec<&str> = VarType::iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "Int8",
                "UInt8",
                "Int16",
                "UInt16",
                "Int32",
                "UInt32",
                "Int64",
                "UInt64",
                "Float",
                "Double",
                "Pointer",
                "Block",
                "Utf8String",
                "Utf16String",
                "AnsiString",
            ]
        );
    }

    #[test]
    fn test_native_type_names_match_table_format() {
        let names: Vec<&str> = NativeType::iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "void", "int", "int8", "int16", "int32", "uint", "uint8", "uint16", "uint32",
                "uint64", "int64", "float", "double", "pointer", "bool",
            ]
        );
        assert_eq!(NativeType::from_str("uint16").unwrap(), NativeType::UInt16);
        assert!(NativeType::from_str("Int32").is_err());
    }

    #[test]
    fn test_native_type_serde_uses_lowercase() {
        let json = serde_json::to_string(&NativeType::UInt64).unwrap();
        assert_eq!(json, "\"uint64\"");
        let parsed: NativeType = serde_json::from_str("\"pointer\"").unwrap();
        assert_eq!(parsed, NativeType::Pointer);
    }

    #[test]
    fn test_widths() {
        assert_eq!(VarType::Int16.width(), Some(2));
        assert_eq!(VarType::Double.width(), Some(8));
        assert_eq!(VarType::Block.width(), None);
        assert_eq!(VarType::Utf16String.width(), None);
        assert!(VarType::Block.requires_size());
        assert!(!VarType::AnsiString.requires_size());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(NativeType::Bool.conversion(), Conversion::Signed32);
        assert_eq!(NativeType::UInt8.conversion(), Conversion::Unsigned32);
        assert_eq!(NativeType::Int64.conversion(), Conversion::Signed64);
        assert_eq!(NativeType::UInt64.conversion(), Conversion::Unsigned64);
        assert_eq!(NativeType::Float.conversion(), Conversion::Opaque);
        assert_eq!(NativeType::Pointer.conversion(), Conversion::Opaque);
    }
}
