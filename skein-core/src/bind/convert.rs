//! 类型转换
//!
//! 原生类型与脚本值的双向搬运。FromValue 带一个标签预判
//! accepts：联合类型按声明顺序用它挑第一个接受实际标签的分支，
//! 都不接受时报 NoVariantMatched 而不是笼统的类型错误。

use std::rc::Rc;

use crate::error::ConvertError;
use crate::host::strand::Strand;
use crate::host::value::{Function, Table, TypeTag, UserData, Value};

/// 原生值进入脚本世界
pub trait ToValue {
    fn to_value(self) -> Value;
}

/// 脚本值回到原生世界
pub trait FromValue: Sized {
    /// 转换是否可能接受这个标签的值（联合分支选择用）
    fn accepts(tag: TypeTag) -> bool;

    fn from_value(value: Value) -> Result<Self, ConvertError>;
}

fn mismatch<T>(expected: &'static str, value: &Value) -> Result<T, ConvertError> {
    Err(ConvertError::TypeMismatch {
        expected,
        actual: value.tag(),
    })
}

impl ToValue for Value {
    fn to_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn accepts(_: TypeTag) -> bool {
        true
    }

    fn from_value(value: Value) -> Result<Value, ConvertError> {
        Ok(value)
    }
}

impl ToValue for () {
    fn to_value(self) -> Value {
        Value::Nil
    }
}

impl FromValue for () {
    fn accepts(tag: TypeTag) -> bool {
        tag == TypeTag::Nil
    }

    fn from_value(value: Value) -> Result<(), ConvertError> {
        match value {
            Value::Nil => Ok(()),
            other => mismatch("nil", &other),
        }
    }
}

impl ToValue for bool {
    fn to_value(self) -> Value {
        Value::Boolean(self)
    }
}

impl FromValue for bool {
    fn accepts(tag: TypeTag) -> bool {
        tag == TypeTag::Boolean
    }

    fn from_value(value: Value) -> Result<bool, ConvertError> {
        match value {
            Value::Boolean(b) => Ok(b),
            other => mismatch("boolean", &other),
        }
    }
}

macro_rules! impl_integer_convert {
    ($($ty:ty),*) => {$(
        impl ToValue for $ty {
            fn to_value(self) -> Value {
                Value::Integer(self as i64)
            }
        }

        impl FromValue for $ty {
            fn accepts(tag: TypeTag) -> bool {
                tag == TypeTag::Integer
            }

            fn from_value(value: Value) -> Result<$ty, ConvertError> {
                match value {
                    Value::Integer(i) => <$ty>::try_from(i).map_err(|_| {
                        ConvertError::TypeMismatch {
                            expected: concat!(stringify!($ty), "-range integer"),
                            actual: TypeTag::Integer,
                        }
                    }),
                    other => mismatch("integer", &other),
                }
            }
        }
    )*};
}

impl_integer_convert!(i8, i16, i32, i64, u8, u16, u32, usize);

macro_rules! impl_float_convert {
    ($($ty:ty),*) => {$(
        impl ToValue for $ty {
            fn to_value(self) -> Value {
                Value::Number(self as f64)
            }
        }

        impl FromValue for $ty {
            fn accepts(tag: TypeTag) -> bool {
                tag == TypeTag::Number || tag == TypeTag::Integer
            }

            fn from_value(value: Value) -> Result<$ty, ConvertError> {
                match value.as_number() {
                    Some(n) => Ok(n as $ty),
                    None => mismatch("number", &value),
                }
            }
        }
    )*};
}

impl_float_convert!(f32, f64);

impl ToValue for String {
    fn to_value(self) -> Value {
        Value::Str(Rc::from(self.as_str()))
    }
}

impl ToValue for &str {
    fn to_value(self) -> Value {
        Value::Str(Rc::from(self))
    }
}

impl ToValue for Rc<str> {
    fn to_value(self) -> Value {
        Value::Str(self)
    }
}

impl FromValue for String {
    fn accepts(tag: TypeTag) -> bool {
        tag == TypeTag::Str
    }

    fn from_value(value: Value) -> Result<String, ConvertError> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            other => mismatch("string", &other),
        }
    }
}

impl FromValue for Rc<str> {
    fn accepts(tag: TypeTag) -> bool {
        tag == TypeTag::Str
    }

    fn from_value(value: Value) -> Result<Rc<str>, ConvertError> {
        match value {
            Value::Str(s) => Ok(s),
            other => mismatch("string", &other),
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(self) -> Value {
        Value::Bytes(Rc::from(self.as_slice()))
    }
}

impl ToValue for &[u8] {
    fn to_value(self) -> Value {
        Value::Bytes(Rc::from(self))
    }
}

impl FromValue for Vec<u8> {
    fn accepts(tag: TypeTag) -> bool {
        tag == TypeTag::Bytes
    }

    fn from_value(value: Value) -> Result<Vec<u8>, ConvertError> {
        match value {
            Value::Bytes(b) => Ok(b.to_vec()),
            other => mismatch("bytes", &other),
        }
    }
}

impl ToValue for *mut () {
    fn to_value(self) -> Value {
        Value::LightPtr(self)
    }
}

impl FromValue for *mut () {
    fn accepts(tag: TypeTag) -> bool {
        tag == TypeTag::LightPtr
    }

    fn from_value(value: Value) -> Result<*mut (), ConvertError> {
        match value {
            Value::LightPtr(p) => Ok(p),
            other => mismatch("light pointer", &other),
        }
    }
}

macro_rules! impl_handle_convert {
    ($($ty:ty => $variant:ident, $tag:ident, $name:literal;)*) => {$(
        impl ToValue for Rc<$ty> {
            fn to_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl FromValue for Rc<$ty> {
            fn accepts(tag: TypeTag) -> bool {
                tag == TypeTag::$tag
            }

            fn from_value(value: Value) -> Result<Rc<$ty>, ConvertError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => mismatch($name, &other),
                }
            }
        }
    )*};
}

impl_handle_convert! {
    Table => Table, Table, "table";
    Function => Function, Function, "function";
    UserData => UserData, UserData, "userdata";
    Strand => Strand, Strand, "strand";
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Nil,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn accepts(tag: TypeTag) -> bool {
        tag == TypeTag::Nil || T::accepts(tag)
    }

    fn from_value(value: Value) -> Result<Option<T>, ConvertError> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// 二分支联合：转换按声明顺序选第一个接受实际标签的分支
#[derive(Debug, Clone, PartialEq)]
pub enum OneOf2<A, B> {
    First(A),
    Second(B),
}

impl<A: ToValue, B: ToValue> ToValue for OneOf2<A, B> {
    fn to_value(self) -> Value {
        match self {
            OneOf2::First(a) => a.to_value(),
            OneOf2::Second(b) => b.to_value(),
        }
    }
}

impl<A: FromValue, B: FromValue> FromValue for OneOf2<A, B> {
    fn accepts(tag: TypeTag) -> bool {
        A::accepts(tag) || B::accepts(tag)
    }

    fn from_value(value: Value) -> Result<OneOf2<A, B>, ConvertError> {
        let tag = value.tag();
        if A::accepts(tag) {
            A::from_value(value).map(OneOf2::First)
        } else if B::accepts(tag) {
            B::from_value(value).map(OneOf2::Second)
        } else {
            Err(ConvertError::NoVariantMatched { actual: tag })
        }
    }
}

/// 三分支联合
#[derive(Debug, Clone, PartialEq)]
pub enum OneOf3<A, B, C> {
    First(A),
    Second(B),
    Third(C),
}

impl<A: ToValue, B: ToValue, C: ToValue> ToValue for OneOf3<A, B, C> {
    fn to_value(self) -> Value {
        match self {
            OneOf3::First(a) => a.to_value(),
            OneOf3::Second(b) => b.to_value(),
            OneOf3::Third(c) => c.to_value(),
        }
    }
}

impl<A: FromValue, B: FromValue, C: FromValue> FromValue for OneOf3<A, B, C> {
    fn accepts(tag: TypeTag) -> bool {
        A::accepts(tag) || B::accepts(tag) || C::accepts(tag)
    }

    fn from_value(value: Value) -> Result<OneOf3<A, B, C>, ConvertError> {
        let tag = value.tag();
        if A::accepts(tag) {
            A::from_value(value).map(OneOf3::First)
        } else if B::accepts(tag) {
            B::from_value(value).map(OneOf3::Second)
        } else if C::accepts(tag) {
            C::from_value(value).map(OneOf3::Third)
        } else {
            Err(ConvertError::NoVariantMatched { actual: tag })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trips() {
        assert_eq!(42i64.to_value(), Value::Integer(42));
        assert_eq!(i64::from_value(Value::Integer(42)).unwrap(), 42);
        assert_eq!(true.to_value(), Value::Boolean(true));
        assert_eq!(f64::from_value(Value::Integer(2)).unwrap(), 2.0);
        assert_eq!("hi".to_value(), Value::Str("hi".into()));
    }

    #[test]
    fn test_integer_is_variant_strict() {
        let err = i64::from_value(Value::Number(2.0)).unwrap_err();
        assert_eq!(
            err,
            ConvertError::TypeMismatch {
                expected: "integer",
                actual: TypeTag::Number
            }
        );
    }

    #[test]
    fn test_integer_range_check() {
        let err = u8::from_value(Value::Integer(300)).unwrap_err();
        assert!(matches!(err, ConvertError::TypeMismatch { .. }));
        assert_eq!(u8::from_value(Value::Integer(200)).unwrap(), 200);
    }

    #[test]
    fn test_bytes_and_pointers() {
        let raw: &[u8] = b"def";
        assert_eq!(raw.to_value(), Value::Bytes(Rc::from(&b"def"[..])));
        assert_eq!(
            Vec::<u8>::from_value(Value::Bytes(Rc::from(&b"def"[..]))).unwrap(),
            b"def".to_vec()
        );

        let mut cell = 7u32;
        let p = &mut cell as *mut u32 as *mut ();
        assert_eq!(<*mut ()>::from_value(p.to_value()).unwrap(), p);
        assert!(matches!(
            <*mut ()>::from_value(Value::Nil),
            Err(ConvertError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_option_maps_nil() {
        assert_eq!(Option::<i64>::from_value(Value::Nil).unwrap(), None);
        assert_eq!(
            Option::<i64>::from_value(Value::Integer(1)).unwrap(),
            Some(1)
        );
        assert_eq!(None::<i64>.to_value(), Value::Nil);
    }

    #[test]
    fn test_union_picks_first_accepting_variant() {
        let v = OneOf2::<i64, String>::from_value(Value::Integer(3)).unwrap();
        assert_eq!(v, OneOf2::First(3));
        let v = OneOf2::<i64, String>::from_value(Value::Str("x".into())).unwrap();
        assert_eq!(v, OneOf2::Second("x".to_string()));
    }

    #[test]
    fn test_union_declaration_order_wins() {
        // f64 也接受 Integer 标签：声明在前的分支优先
        let v = OneOf2::<f64, i64>::from_value(Value::Integer(3)).unwrap();
        assert_eq!(v, OneOf2::First(3.0));
    }

    #[test]
    fn test_union_no_variant_matched() {
        let err = OneOf2::<i64, String>::from_value(Value::Boolean(true)).unwrap_err();
        assert_eq!(
            err,
            ConvertError::NoVariantMatched {
                actual: TypeTag::Boolean
            }
        );
    }

    #[test]
    fn test_three_way_union() {
        let v = OneOf3::<bool, i64, String>::from_value(Value::Str("a".into())).unwrap();
        assert_eq!(v, OneOf3::Third("a".to_string()));
    }
}
