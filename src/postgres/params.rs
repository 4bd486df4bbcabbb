use std::error::Error;
use std::str::FromStr;

use rust_decimal::Decimal;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};
use tokio_util::bytes;
use uuid::Uuid;

use crate::types::RowValues;

type BoxError = Box<dyn Error + Sync + Send>;

/// Borrowed parameter list in the shape `tokio_postgres` expects.
pub(super) struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    pub(super) fn convert(params: &'a [RowValues]) -> Params<'a> {
        let mut references = Vec::with_capacity(params.len());
        for p in params {
            references.push(p as &(dyn ToSql + Sync));
        }
        Params { references }
    }

    pub(super) fn as_refs(&self) -> &[&(dyn ToSql + Sync)] {
        &self.references
    }
}

impl ToSql for RowValues {
    fn to_sql(&self, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxError> {
        match ty.kind() {
            Kind::Domain(inner) => return self.to_sql(inner, out),
            Kind::Enum(_) => {
                return match self {
                    RowValues::Text(label) => label.to_sql(ty, out),
                    RowValues::Null => Ok(IsNull::Yes),
                    other => Err(format!("{other:?} is not a label of enum {}", ty.name()).into()),
                };
            }
            _ => {}
        }
        match self {
            RowValues::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
                    i.to_string().to_sql(ty, out)
                }
                _ => i.to_sql(ty, out),
            },
            RowValues::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::NUMERIC => Decimal::from_str(&f.to_string())?.to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            RowValues::Text(s) => match *ty {
                Type::NUMERIC => Decimal::from_str(s.trim())?.to_sql(ty, out),
                Type::UUID => Uuid::parse_str(s)?.to_sql(ty, out),
                _ => s.to_sql(ty, out),
            },
            RowValues::Bool(b) => b.to_sql(ty, out),
            RowValues::Timestamp(dt) => match *ty {
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                _ => dt.to_sql(ty, out),
            },
            RowValues::Date(d) => match *ty {
                Type::TIMESTAMP => d.and_time(chrono::NaiveTime::default()).to_sql(ty, out),
                _ => d.to_sql(ty, out),
            },
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::JSON(jsval) => jsval.to_sql(ty, out),
            RowValues::Blob(bytes) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        match ty.kind() {
            Kind::Domain(inner) => Self::accepts(inner),
            Kind::Enum(_) => true,
            _ => matches!(
                *ty,
                Type::INT2
                    | Type::INT4
                    | Type::INT8
                    | Type::FLOAT4
                    | Type::FLOAT8
                    | Type::NUMERIC
                    | Type::TEXT
                    | Type::VARCHAR
                    | Type::BPCHAR
                    | Type::NAME
                    | Type::UNKNOWN
                    | Type::BOOL
                    | Type::TIMESTAMP
                    | Type::TIMESTAMPTZ
                    | Type::DATE
                    | Type::JSON
                    | Type::JSONB
                    | Type::BYTEA
                    | Type::UUID
            ),
        }
    }

    to_sql_checked!();
}
