//! Field schemas and the typed projection between resources and rows.

use regex::Regex;

use super::error::Error;
use super::types::{Resource, Row, Value};

/// The three supported field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Number,
    Text,
    List,
}

impl FieldType {
    /// Parse the on-disk type name.
    pub fn parse(s: &str) -> Option<FieldType> {
        match s {
            "number" => Some(FieldType::Number),
            "text" => Some(FieldType::Text),
            "list" => Some(FieldType::List),
            _ => None,
        }
    }

    /// The on-disk type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Number => "number",
            FieldType::Text => "text",
            FieldType::List => "list",
        }
    }
}

/// Declaration of a single column: its type plus optional numeric bounds and
/// text pattern.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub collection: String,
    pub field: String,
    pub kind: FieldType,
    pub min: f64,
    pub max: f64,
    regex: Option<Regex>,
}

impl FieldSchema {
    /// Build a field schema, compiling `pattern` once up front. An empty
    /// pattern means unconstrained text.
    pub fn new(
        collection: impl Into<String>,
        field: impl Into<String>,
        kind: FieldType,
        min: f64,
        max: f64,
        pattern: &str,
    ) -> Result<FieldSchema, Error> {
        let field = field.into();
        let regex = if pattern.is_empty() {
            None
        } else {
            Some(Regex::new(pattern).map_err(|e| {
                Error::InvalidSchemaRecord(format!("bad pattern for field {field:?}: {e}"))
            })?)
        };
        Ok(FieldSchema {
            collection: collection.into(),
            field,
            kind,
            min,
            max,
            regex,
        })
    }

    /// Check `value` against this field's type, bounds and pattern.
    ///
    /// Number bounds: `min == max == 0` means unbounded, otherwise `min` is
    /// the lower bound and `max < min` means no upper bound.
    pub fn validate(&self, value: &Value) -> bool {
        match (self.kind, value) {
            (FieldType::Number, Value::Number(n)) => {
                (self.min == 0.0 && self.max == 0.0)
                    || (*n >= self.min && (self.max < self.min || *n <= self.max))
            }
            (FieldType::Text, Value::Text(s)) => {
                self.regex.as_ref().map_or(true, |re| re.is_match(s))
            }
            (FieldType::List, Value::List(_)) => true,
            _ => false,
        }
    }

    /// The substitute for an absent field: 0, empty text or empty list.
    fn zero(&self) -> Value {
        match self.kind {
            FieldType::Number => Value::Number(0.0),
            FieldType::Text => Value::Text(String::new()),
            FieldType::List => Value::List(Vec::new()),
        }
    }
}

/// Ordered field declarations for one collection. The first two fields are
/// always `_id` (text) and `_v` (number ≥ 1).
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldSchema>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSchema>) -> Schema {
        Schema { fields }
    }

    pub fn push(&mut self, field: FieldSchema) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Project a resource into a row: for each field in declaration order,
    /// substitute the zero value if absent, validate, then serialize.
    /// Numbers render as the shortest decimal that parses back to the same
    /// double; lists join on commas (commas inside items are not escaped).
    pub fn record(&self, resource: &Resource) -> Result<Row, Error> {
        let mut row = Row::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = resource
                .get(&field.field)
                .cloned()
                .unwrap_or_else(|| field.zero());
            if !field.validate(&value) {
                return Err(Error::InvalidField(field.field.clone()));
            }
            row.push(match value {
                Value::Number(n) => n.to_string(),
                Value::Text(s) => s,
                Value::List(items) => items.join(","),
            });
        }
        Ok(row)
    }

    /// Parse a row back into a typed resource, cell by cell in declaration
    /// order. An empty list cell parses as an empty list.
    pub fn resource(&self, row: &Row) -> Result<Resource, Error> {
        let mut resource = Resource::new();
        for (i, field) in self.fields.iter().enumerate() {
            let cell = row.get(i).ok_or(Error::ShortRecord {
                got: row.len(),
                want: self.fields.len(),
            })?;
            let value = match field.kind {
                FieldType::Number => Value::Number(
                    cell.parse()
                        .map_err(|_| Error::InvalidNumber(cell.clone()))?,
                ),
                FieldType::Text => Value::Text(cell.clone()),
                FieldType::List => {
                    if cell.is_empty() {
                        Value::List(Vec::new())
                    } else {
                        Value::List(cell.split(',').map(str::to_string).collect())
                    }
                }
            };
            resource.insert(field.field.clone(), value);
        }
        Ok(resource)
    }
}
