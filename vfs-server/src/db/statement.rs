//! Calls to external database functions and their result rows

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::DbError;

/// Positional argument for an external function.
///
/// Every variant is nullable; `None` binds SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(Option<String>),
    Uuid(Option<Uuid>),
    Int(Option<i32>),
    Bool(Option<bool>),
    TextArray(Option<Vec<String>>),
    Json(Option<Value>),
}

impl Param {
    /// SQL cast applied to the placeholder so overload resolution is exact.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Uuid(_) => "uuid",
            Self::Int(_) => "integer",
            Self::Bool(_) => "boolean",
            Self::TextArray(_) => "text[]",
            Self::Json(_) => "jsonb",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => v.as_deref(),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(v) => *v,
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => *v,
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => *v,
            _ => None,
        }
    }

    pub fn as_text_array(&self) -> Option<&[String]> {
        match self {
            Self::TextArray(v) => v.as_deref(),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => v.as_ref(),
            _ => None,
        }
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Self::Text(Some(v.to_owned()))
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Self::Text(Some(v))
    }
}

impl From<Option<String>> for Param {
    fn from(v: Option<String>) -> Self {
        Self::Text(v)
    }
}

impl From<Uuid> for Param {
    fn from(v: Uuid) -> Self {
        Self::Uuid(Some(v))
    }
}

impl From<Option<Uuid>> for Param {
    fn from(v: Option<Uuid>) -> Self {
        Self::Uuid(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Self::Int(Some(v))
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Self::Bool(Some(v))
    }
}

impl From<Vec<String>> for Param {
    fn from(v: Vec<String>) -> Self {
        Self::TextArray(Some(v))
    }
}

impl From<Option<Vec<String>>> for Param {
    fn from(v: Option<Vec<String>>) -> Self {
        Self::TextArray(v)
    }
}

impl From<Value> for Param {
    fn from(v: Value) -> Self {
        Self::Json(Some(v))
    }
}

/// What the function hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Set-returning or composite result, one JSON object per row.
    Rows,
    /// Scalar or void result, discarded.
    Scalar,
}

/// A single call to a named external function.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    function: &'static str,
    params: Vec<Param>,
    shape: Shape,
}

impl Statement {
    /// Call returning rows.
    pub fn rows(function: &'static str) -> Self {
        Self {
            function,
            params: Vec::new(),
            shape: Shape::Rows,
        }
    }

    /// Call whose result is ignored.
    pub fn scalar(function: &'static str) -> Self {
        Self {
            function,
            params: Vec::new(),
            shape: Shape::Scalar,
        }
    }

    /// Append the next positional argument.
    pub fn arg(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn function(&self) -> &'static str {
        self.function
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn param(&self, index: usize) -> Option<&Param> {
        self.params.get(index)
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Render the SQL text with typed placeholders.
    ///
    /// Row results are wrapped in `to_jsonb` over a subquery so column names
    /// survive for both table-returning and scalar-returning functions.
    pub fn sql(&self) -> String {
        let args = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| format!("${}::{}", i + 1, p.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");

        match self.shape {
            Shape::Rows => format!(
                "SELECT to_jsonb(r) AS row FROM (SELECT * FROM {}({})) AS r",
                self.function, args
            ),
            Shape::Scalar => format!("SELECT {}({})", self.function, args),
        }
    }
}

/// One result row: output column name to JSON value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn new(columns: Map<String, Value>) -> Self {
        Self(columns)
    }

    /// Build a row from any serializable object.
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> Result<Self, DbError> {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(DbError::decode("row", format!("expected object, got {}", other))),
            Err(e) => Err(DbError::decode("row", e.to_string())),
        }
    }

    /// Remove and decode one column. SQL NULL and missing columns are `None`.
    pub fn take<T: DeserializeOwned>(
        &mut self,
        function: &'static str,
        column: &str,
    ) -> Result<Option<T>, DbError> {
        match self.0.remove(column) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| DbError::decode(function, format!("column '{}': {}", column, e))),
        }
    }

    /// Decode the whole row as one object.
    pub fn into_typed<T: DeserializeOwned>(self, function: &'static str) -> Result<T, DbError> {
        serde_json::from_value(Value::Object(self.0))
            .map_err(|e| DbError::decode(function, e.to_string()))
    }

    pub fn columns(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Row {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_sql_casts_every_placeholder() {
        let stmt = Statement::rows("directory_tree")
            .arg(Option::<Uuid>::None)
            .arg("public")
            .arg(100);

        assert_eq!(
            stmt.sql(),
            "SELECT to_jsonb(r) AS row FROM (SELECT * FROM directory_tree($1::uuid, $2::text, $3::integer)) AS r"
        );
    }

    #[test]
    fn scalar_sql_selects_call() {
        let stmt = Statement::scalar("file_delete").arg(Uuid::nil()).arg("public");
        assert_eq!(stmt.sql(), "SELECT file_delete($1::uuid, $2::text)");
    }

    #[test]
    fn take_treats_null_as_absent() {
        let mut row = Row::new(
            json!({"file_details": null, "tags": {"names": ["a"], "ids": [1]}})
                .as_object()
                .cloned()
                .unwrap(),
        );

        let details: Option<Value> = row.take("file_details", "file_details").unwrap();
        assert!(details.is_none());

        let missing: Option<Value> = row.take("file_details", "nope").unwrap();
        assert!(missing.is_none());

        let tags: Option<Value> = row.take("file_tags_add", "tags").unwrap();
        assert_eq!(tags, Some(json!({"names": ["a"], "ids": [1]})));
    }

    #[test]
    fn take_reports_shape_mismatch() {
        let mut row = Row::new(json!({"level": "deep"}).as_object().cloned().unwrap());
        let err = row.take::<i32>("directory_tree", "level").unwrap_err();
        assert!(matches!(err, DbError::Decode { function: "directory_tree", .. }));
    }
}
