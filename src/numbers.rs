// SPDX-License-Identifier: MIT

//! Numbers and the expressions built over them.
//!
//! [`Number`] is discriminated by value: non-negative integers are `uint`,
//! negative integers `int`, everything else `float`. [`NumericExpression`]
//! (tag 565) pairs a relational operator with a number; [`SetExpression`]
//! (tag 566) tests membership in a set of numbers.

use ciborium::Value;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    codec::{
        describe, expect_integer, json_describe,
        tags::{TAG_NUMERIC_EXPRESSION, TAG_SET_EXPRESSION},
    },
    error::{Error, TypeChoiceError},
    result::Result,
    type_choice::TypeChoice,
    valid::Valid,
};

/// An integer or floating-point number.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum Number {
    Uint(u64),
    Int(i64),
    Float(f64),
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Self::Uint(value)
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        if value >= 0 {
            Self::Uint(value as u64)
        } else {
            Self::Int(value)
        }
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl Number {
    fn from_integer(i: i128) -> Result<Self> {
        if let Ok(u) = u64::try_from(i) {
            Ok(Self::Uint(u))
        } else if let Ok(n) = i64::try_from(i) {
            Ok(Self::Int(n))
        } else {
            Err(Error::invalid(format!("number {i} out of range")))
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Uint(u) => *u as f64,
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
        }
    }
}

impl TypeChoice for Number {
    const CHOICE: &'static str = "Number";
    const TYPE_NAMES: &'static [&'static str] = &["uint", "int", "float"];
    const TAGS: &'static [u64] = &[];

    fn type_name(&self) -> &str {
        match self {
            Self::Uint(_) => "uint",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
        }
    }

    fn to_cbor_value(&self) -> Result<Value> {
        Ok(match self {
            Self::Uint(u) => Value::Integer((*u).into()),
            Self::Int(i) => Value::Integer((*i).into()),
            Self::Float(f) => Value::Float(*f),
        })
    }

    fn from_cbor_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Self::from_integer(i.into()),
            Value::Float(f) => Ok(Self::Float(f)),
            other => Err(TypeChoiceError::unexpected(Self::CHOICE, describe(&other)).into()),
        }
    }

    fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::Uint(u) => (*u).into(),
            Self::Int(i) => (*i).into(),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| Error::invalid(format!("float {f} has no JSON form")))?,
        })
    }

    fn from_json_value(type_name: &str, value: serde_json::Value) -> Result<Self> {
        let number = match &value {
            serde_json::Value::Number(n) => n,
            other => {
                return Err(Error::invalid(format!(
                    "{type_name}: expected number, found {}",
                    json_describe(other)
                )))
            }
        };

        match type_name {
            "uint" => number
                .as_u64()
                .map(Self::Uint)
                .ok_or_else(|| Error::invalid(format!("uint: {number} out of range"))),
            "int" => number
                .as_i64()
                .map(Self::Int)
                .ok_or_else(|| Error::invalid(format!("int: {number} out of range"))),
            "float" => number
                .as_f64()
                .map(Self::Float)
                .ok_or_else(|| Error::invalid(format!("float: {number} out of range"))),
            other => Err(TypeChoiceError::UnknownType {
                choice: Self::CHOICE,
                name: other.to_string(),
            }
            .into()),
        }
    }
}

impl Valid for Number {
    fn valid(&self) -> Result<()> {
        match self {
            Self::Int(i) if *i >= 0 => Err(Error::invalid(format!("int {i} is not negative"))),
            Self::Float(f) if !f.is_finite() => Err(Error::invalid("float is not finite")),
            _ => Ok(()),
        }
    }
}

impl_type_choice_serde!(Number);

/// Relational operators of a [`NumericExpression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NumericOperator {
    Gt = 0,
    Ge = 1,
    Lt = 2,
    Le = 3,
}

impl NumericOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }

    pub fn from_code(code: i128) -> Result<Self> {
        Ok(match code {
            0 => Self::Gt,
            1 => Self::Ge,
            2 => Self::Lt,
            3 => Self::Le,
            other => {
                return Err(Error::invalid(format!(
                    "invalid numeric operator {other}"
                )))
            }
        })
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "gt" => Self::Gt,
            "ge" => Self::Ge,
            "lt" => Self::Lt,
            "le" => Self::Le,
            other => {
                return Err(Error::invalid(format!(
                    "invalid numeric operator {other:?}"
                )))
            }
        })
    }
}

/// `<operator> <operand>`, carried under tag 565.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericExpression {
    pub operator: NumericOperator,
    pub operand: Number,
}

impl NumericExpression {
    pub fn new<N: Into<Number>>(operator: NumericOperator, operand: N) -> Self {
        Self {
            operator,
            operand: operand.into(),
        }
    }

    pub(crate) fn to_cbor_value(self) -> Result<Value> {
        Ok(Value::Tag(
            TAG_NUMERIC_EXPRESSION,
            Box::new(Value::Array(vec![
                Value::Integer((self.operator as u8).into()),
                self.operand.to_cbor_value()?,
            ])),
        ))
    }

    /// Decodes the `[operator, operand]` array found under tag 565.
    pub(crate) fn from_cbor_content(value: Value) -> Result<Self> {
        let mut items = match value {
            Value::Array(items) if items.len() == 2 => items.into_iter(),
            other => {
                return Err(Error::invalid(format!(
                    "numeric expression: expected [operator, operand], found {}",
                    describe(&other)
                )))
            }
        };

        let (Some(op), Some(operand)) = (items.next(), items.next()) else {
            return Err(Error::invalid("numeric expression: missing items"));
        };

        Ok(Self {
            operator: NumericOperator::from_code(expect_integer(op, "numeric operator")?)?,
            operand: Number::from_cbor_value(operand)?,
        })
    }
}

impl Valid for NumericExpression {
    fn valid(&self) -> Result<()> {
        self.operand.valid()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct NumericExpressionJson {
    operator: String,
    operand: Number,
}

impl Serialize for NumericExpression {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            NumericExpressionJson {
                operator: self.operator.as_str().to_string(),
                operand: self.operand,
            }
            .serialize(serializer)
        } else {
            self.to_cbor_value()
                .map_err(crate::codec::ser_error)?
                .serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for NumericExpression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let json = NumericExpressionJson::deserialize(deserializer)?;
            Ok(Self {
                operator: NumericOperator::from_name(&json.operator).map_err(de::Error::custom)?,
                operand: json.operand,
            })
        } else {
            match Value::deserialize(deserializer)? {
                Value::Tag(TAG_NUMERIC_EXPRESSION, inner) => {
                    Self::from_cbor_content(*inner).map_err(de::Error::custom)
                }
                other => Err(de::Error::custom(format!(
                    "expected tag {TAG_NUMERIC_EXPRESSION}, found {}",
                    describe(&other)
                ))),
            }
        }
    }
}

/// Set operators of a [`SetExpression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SetOperator {
    Member = 6,
    NotMember = 7,
}

impl SetOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::NotMember => "not-member",
        }
    }
}

/// `<operator> { values }`, carried under tag 566.
#[derive(Debug, Clone, PartialEq)]
pub struct SetExpression {
    pub operator: SetOperator,
    pub values: Vec<Number>,
}

impl SetExpression {
    pub fn new(operator: SetOperator, values: Vec<Number>) -> Self {
        Self { operator, values }
    }

    fn to_cbor_value(&self) -> Result<Value> {
        Ok(Value::Tag(
            TAG_SET_EXPRESSION,
            Box::new(Value::Array(vec![
                Value::Integer((self.operator as u8).into()),
                Value::Array(
                    self.values
                        .iter()
                        .map(Number::to_cbor_value)
                        .collect::<Result<Vec<_>>>()?,
                ),
            ])),
        ))
    }

    fn from_cbor_value(value: Value) -> Result<Self> {
        let inner = match value {
            Value::Tag(TAG_SET_EXPRESSION, inner) => *inner,
            other => {
                return Err(Error::invalid(format!(
                    "expected tag {TAG_SET_EXPRESSION}, found {}",
                    describe(&other)
                )))
            }
        };

        let (op, values) = match inner {
            Value::Array(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(op), Some(Value::Array(values))) => (op, values),
                    _ => return Err(Error::invalid("set expression: expected [operator, [+ number]]")),
                }
            }
            other => {
                return Err(Error::invalid(format!(
                    "set expression: expected [operator, [+ number]], found {}",
                    describe(&other)
                )))
            }
        };

        let operator = match expect_integer(op, "set operator")? {
            6 => SetOperator::Member,
            7 => SetOperator::NotMember,
            other => return Err(Error::invalid(format!("invalid set operator {other}"))),
        };

        Ok(Self {
            operator,
            values: values
                .into_iter()
                .map(Number::from_cbor_value)
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

impl Valid for SetExpression {
    fn valid(&self) -> Result<()> {
        crate::valid::non_empty(&self.values, "empty set expression")?;
        crate::valid::valid_each(&self.values, "set member")
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetExpressionJson {
    operator: String,
    values: Vec<Number>,
}

impl Serialize for SetExpression {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            SetExpressionJson {
                operator: self.operator.as_str().to_string(),
                values: self.values.clone(),
            }
            .serialize(serializer)
        } else {
            self.to_cbor_value()
                .map_err(crate::codec::ser_error)?
                .serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for SetExpression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let json = SetExpressionJson::deserialize(deserializer)?;
            let operator = match json.operator.as_str() {
                "member" => SetOperator::Member,
                "not-member" => SetOperator::NotMember,
                other => {
                    return Err(de::Error::custom(format!("invalid set operator {other:?}")))
                }
            };
            Ok(Self {
                operator,
                values: json.values,
            })
        } else {
            Self::from_cbor_value(Value::deserialize(deserializer)?).map_err(de::Error::custom)
        }
    }
}

#[cfg(test)]
#[rustfmt::skip::macros(vec)]
mod tests {
    use super::*;
    use crate::codec::{from_cbor, from_json, to_cbor, to_json};

    #[test]
    fn test_number_discrimination() {
        assert_eq!(from_cbor::<Number>(&[0x05]).unwrap(), Number::Uint(5));
        assert_eq!(from_cbor::<Number>(&[0x24]).unwrap(), Number::Int(-5));
        assert_eq!(
            from_cbor::<Number>(&[0xf9, 0x3e, 0x00]).unwrap(),
            Number::Float(1.5)
        );

        assert_eq!(
            String::from_utf8(to_json(&Number::Int(-5)).unwrap()).unwrap(),
            r#"{"type":"int","value":-5}"#
        );

        let err = from_json::<Number>(br#"{"type":"int","value":5}"#).unwrap_err();
        assert!(err.to_string().contains("invalid int: int 5 is not negative"), "{err}");
    }

    #[test]
    fn test_numeric_expression() {
        let expr = NumericExpression::new(NumericOperator::Ge, 7u64);

        let cbor = to_cbor(&expr).unwrap();
        assert_eq!(
            cbor,
            vec![
                0xd9, 0x02, 0x35, // tag(565)
                  0x82, // array(2)
                    0x01, // ge
                    0x07,
            ]
        );
        assert_eq!(from_cbor::<NumericExpression>(&cbor).unwrap(), expr);

        let json = String::from_utf8(to_json(&expr).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"operator":"ge","operand":{"type":"uint","value":7}}"#
        );
        assert_eq!(from_json::<NumericExpression>(json.as_bytes()).unwrap(), expr);

        let bad = vec![0xd9, 0x02, 0x35, 0x82, 0x04, 0x07];
        let err = from_cbor::<NumericExpression>(&bad).unwrap_err();
        assert!(err.to_string().contains("invalid numeric operator 4"), "{err}");
    }

    #[test]
    fn test_set_expression() {
        let expr = SetExpression::new(SetOperator::NotMember, vec![1u64.into(), 2u64.into()]);

        let cbor = to_cbor(&expr).unwrap();
        assert_eq!(
            cbor,
            vec![
                0xd9, 0x02, 0x36, // tag(566)
                  0x82,
                    0x07, // not-member
                    0x82, 0x01, 0x02,
            ]
        );
        assert_eq!(from_cbor::<SetExpression>(&cbor).unwrap(), expr);

        assert_eq!(
            SetExpression::new(SetOperator::Member, vec![])
                .valid()
                .unwrap_err()
                .to_string(),
            "empty set expression"
        );
    }
}
