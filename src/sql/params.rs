//! Bind values for rendered queries.

use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use crate::store::TypedScalar;
use sqlx::{Database, Type};

/// A value bound to a PostgreSQL placeholder. Values for boolean and numeric columns
/// bind with their own type; everything else travels as text.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Text(String),
    Bool(bool),
    BigInt(i64),
    Double(f64),
    BigIntArray(Vec<i64>),
}

impl From<&str> for PgBindValue {
    fn from(s: &str) -> Self {
        PgBindValue::Text(s.to_string())
    }
}

impl From<TypedScalar> for PgBindValue {
    fn from(v: TypedScalar) -> Self {
        match v {
            TypedScalar::Bool(b) => PgBindValue::Bool(b),
            TypedScalar::Int(n) => PgBindValue::BigInt(n),
            TypedScalar::Float(f) => PgBindValue::Double(f),
        }
    }
}

impl From<&[i64]> for PgBindValue {
    fn from(ids: &[i64]) -> Self {
        PgBindValue::BigIntArray(ids.to_vec())
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::Text(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf),
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf),
            PgBindValue::BigInt(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::Double(f) => <f64 as Encode<Postgres>>::encode_by_ref(f, buf),
            PgBindValue::BigIntArray(ids) => <Vec<i64> as Encode<Postgres>>::encode_by_ref(ids, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Text(_) => <String as Type<Postgres>>::type_info(),
            PgBindValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            PgBindValue::BigInt(_) => <i64 as Type<Postgres>>::type_info(),
            PgBindValue::Double(_) => <f64 as Type<Postgres>>::type_info(),
            PgBindValue::BigIntArray(_) => <Vec<i64> as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}
