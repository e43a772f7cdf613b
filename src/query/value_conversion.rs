//! Value conversion from SeaQuery to `may_postgres` parameters.
//!
//! Every `sea_query::Value` becomes an owned, typed `ToSql` box, NULLs included, so a
//! `NULL` bound to a text column is sent as a text NULL rather than an integer one.
//! Integer and float values adapt to the width the server asks for (`int2`/`int4`/`int8`,
//! `float4`/`float8`), since SeaQuery infers `Int` for a plain `i32` literal even when the
//! column is `bigint`. Dates, times and timestamps bind as their chrono types, so the
//! server picks `date`, `time`, `timestamp` or `timestamptz` from the column.

use crate::error::XplusError;
use bytes::BytesMut;
use may_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use sea_query::{Value, Values};
use std::error::Error;

type BoxedParam = Box<dyn ToSql>;

/// Convert SeaQuery values and run `f` with the converted parameters.
///
/// # Errors
///
/// Returns `XplusError::Query` for a `BigUnsigned` above `i64::MAX` or an unsupported
/// value type.
pub fn with_converted_params<F, R>(values: &Values, f: F) -> Result<R, XplusError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, XplusError>,
{
    let owned = convert_values(values)?;
    let params: Vec<&dyn ToSql> = owned.iter().map(|p| p.as_ref()).collect();
    f(&params)
}

pub(crate) fn convert_values(values: &Values) -> Result<Vec<BoxedParam>, XplusError> {
    values.iter().map(convert_value).collect()
}

fn convert_value(value: &Value) -> Result<BoxedParam, XplusError> {
    let param: BoxedParam = match value {
        Value::Bool(b) => Box::new(*b),
        Value::TinyInt(i) => Box::new(Integer(i.map(i64::from))),
        Value::SmallInt(i) => Box::new(Integer(i.map(i64::from))),
        Value::Int(i) => Box::new(Integer(i.map(i64::from))),
        Value::BigInt(i) => Box::new(Integer(*i)),
        Value::TinyUnsigned(u) => Box::new(Integer(u.map(i64::from))),
        Value::SmallUnsigned(u) => Box::new(Integer(u.map(i64::from))),
        Value::Unsigned(u) => Box::new(Integer(u.map(i64::from))),
        Value::BigUnsigned(u) => {
            let v = u
                .map(|u| {
                    i64::try_from(u).map_err(|_| {
                        XplusError::Query(format!(
                            "BigUnsigned value {u} exceeds i64::MAX ({}), cannot be safely cast to i64",
                            i64::MAX
                        ))
                    })
                })
                .transpose()?;
            Box::new(Integer(v))
        }
        Value::Float(f) => Box::new(Float(f.map(f64::from))),
        Value::Double(d) => Box::new(Float(*d)),
        Value::String(s) => Box::new(s.clone()),
        Value::Char(c) => Box::new(c.map(|c| c.to_string())),
        Value::Bytes(b) => Box::new(b.clone()),
        Value::Json(j) => Box::new(j.as_deref().cloned()),
        Value::ChronoDate(d) => Box::new(*d),
        Value::ChronoTime(t) => Box::new(*t),
        Value::ChronoDateTime(dt) => Box::new(*dt),
        Value::ChronoDateTimeUtc(dt) => Box::new(*dt),
        Value::ChronoDateTimeLocal(dt) => Box::new(*dt),
        Value::ChronoDateTimeWithTimeZone(dt) => Box::new(*dt),
        Value::Uuid(u) => Box::new(*u),
        #[allow(unreachable_patterns)]
        other => {
            return Err(XplusError::Query(format!(
                "Unsupported value type in query: {other:?}"
            )))
        }
    };
    Ok(param)
}

/// Integer parameter that encodes as whichever integer width the column has.
#[derive(Debug)]
struct Integer(Option<i64>);

impl ToSql for Integer {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        let Some(v) = self.0 else {
            return Ok(IsNull::Yes);
        };
        if *ty == Type::INT2 {
            i16::try_from(v)?.to_sql(ty, out)
        } else if *ty == Type::INT4 {
            i32::try_from(v)?.to_sql(ty, out)
        } else {
            v.to_sql(ty, out)
        }
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8
    }

    to_sql_checked!();
}

/// Float parameter that encodes as `float4` or `float8`.
#[derive(Debug)]
struct Float(Option<f64>);

impl ToSql for Float {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        let Some(v) = self.0 else {
            return Ok(IsNull::Yes);
        };
        if *ty == Type::FLOAT4 {
            (v as f32).to_sql(ty, out)
        } else {
            v.to_sql(ty, out)
        }
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::FLOAT4 || *ty == Type::FLOAT8
    }

    to_sql_checked!();
}
