use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    Varchar,
    Double,
    Integer,
    Blob,
    Geometry,
}

impl ColumnType {
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Varchar => "text",
            ColumnType::Double => "double",
            ColumnType::Integer => "integer",
            ColumnType::Blob => "blob",
            ColumnType::Geometry => "geometry",
        }
    }

    /// The narrowest type covering every non-null value.
    ///
    /// Boolean widens to integer, integer widens to double; any text makes
    /// the column text. An all-null column is text.
    pub fn infer<'a, I>(values: I) -> ColumnType
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut inferred: Option<ColumnType> = None;
        for value in values {
            let ty = match value {
                Value::Null => continue,
                Value::Boolean(_) => ColumnType::Boolean,
                Value::Integer(_) => ColumnType::Integer,
                Value::Real(_) => ColumnType::Double,
                Value::Text(_) => return ColumnType::Varchar,
                Value::Blob(_) => ColumnType::Blob,
            };
            inferred = Some(match inferred {
                None => ty,
                Some(prev) => widen(prev, ty),
            });
        }
        inferred.unwrap_or(ColumnType::Varchar)
    }
}

fn widen(a: ColumnType, b: ColumnType) -> ColumnType {
    use ColumnType::*;

    match (a, b) {
        (a, b) if a == b => a,
        (Boolean, Integer) | (Integer, Boolean) => Integer,
        (Boolean | Integer | Double, Boolean | Integer | Double) => Double,
        _ => Varchar,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ColumnSpecs {
    pub(crate) primary_key: String,
    pub(crate) other_columns: Vec<ColumnSpec>,
}

#[cfg(test)]
mod tests {
    use super::ColumnType;
    use crate::Value;

    #[test]
    fn infer_widens_numeric_types() {
        let values = [Value::Boolean(true), Value::Integer(3), Value::Null];
        assert_eq!(ColumnType::infer(&values), ColumnType::Integer);

        let values = [Value::Integer(3), Value::Real(0.5)];
        assert_eq!(ColumnType::infer(&values), ColumnType::Double);
    }

    #[test]
    fn infer_falls_back_to_text() {
        let values = [Value::Integer(3), Value::from("x")];
        assert_eq!(ColumnType::infer(&values), ColumnType::Varchar);

        let values = [Value::Null, Value::Null];
        assert_eq!(ColumnType::infer(&values), ColumnType::Varchar);

        let values = [Value::Blob(vec![1]), Value::Integer(1)];
        assert_eq!(ColumnType::infer(&values), ColumnType::Varchar);
    }
}
