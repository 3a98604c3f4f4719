//! Multi-collection store over per-collection row logs.
//!
//! The store bootstraps its schemas from the `_schemas` collection, opens
//! one [`RowLog`] per discovered collection and mediates create, read,
//! update, delete and list with identity and version assignment. The log
//! only checks version monotonicity; everything resource-shaped lives here.

mod error;
mod rowlog;
mod schema;
mod types;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use data_encoding::BASE32_NOPAD;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::logging;

pub use error::Error;
pub use rowlog::{RowLog, Rows};
pub use schema::{FieldSchema, FieldType, Schema};
pub use types::{Resource, Row, Value};

/// Produces fresh identifiers for created resources.
pub type IdGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Called before every mutation with `(trigger, collection, id, resource)`;
/// an error aborts the operation. Triggers are `"create"`, `"update"` and
/// `"delete"` (the latter carries no resource).
pub type Hook = Box<dyn Fn(&str, &str, &str, Option<&Resource>) -> Result<(), Error> + Send + Sync>;

/// A 26-character Base32 token carrying 128 bits of OS randomness. This is
/// the default identifier strategy and is also used for password salts.
pub fn random_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    BASE32_NOPAD.encode(&bytes)
}

/// Named collections of schema-validated resources, one row log per
/// collection.
pub struct Store {
    dir: PathBuf,
    schemas: HashMap<String, Schema>,
    logs: HashMap<String, RowLog>,
    id_gen: IdGenerator,
    hook: Option<Hook>,
}

impl Store {
    /// Bootstrap a store from `dir` by reading `_schemas.csv` and opening a
    /// row log for every collection it declares. Every schema row must have
    /// exactly 8 columns, and every collection must start with the `_id`
    /// (text) and `_v` (number) fields.
    pub fn open(dir: impl AsRef<Path>) -> Result<Store, Error> {
        let dir = dir.as_ref().to_path_buf();
        let schema_log = RowLog::open(dir.join("_schemas.csv"))?;

        let mut schemas: HashMap<String, Schema> = HashMap::new();
        let mut logs = HashMap::new();
        for row in schema_log.iter() {
            let row = row?;
            if row.len() != 8 {
                return Err(Error::InvalidSchemaRecord(format!(
                    "expected 8 columns, got {}",
                    row.len()
                )));
            }
            let kind = FieldType::parse(&row[4]).ok_or_else(|| {
                Error::InvalidSchemaRecord(format!("unknown field type {:?}", row[4]))
            })?;
            let field = FieldSchema::new(
                row[2].clone(),
                row[3].clone(),
                kind,
                parse_bound(&row[5])?,
                parse_bound(&row[6])?,
                &row[7],
            )?;
            let collection = row[2].clone();
            schemas.entry(collection.clone()).or_default().push(field);
            if !logs.contains_key(&collection) {
                let log = RowLog::open(dir.join(format!("{collection}.csv")))?;
                logs.insert(collection, log);
            }
        }

        for (collection, schema) in &schemas {
            check_system_fields(collection, schema)?;
        }
        logging::info!(dir = %dir.display(), collections = logs.len(), "store opened");

        Ok(Store {
            dir,
            schemas,
            logs,
            id_gen: Box::new(random_id),
            hook: None,
        })
    }

    /// The data directory this store was opened from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Replace the identifier strategy (e.g. with a deterministic one in
    /// tests).
    pub fn set_id_gen(&mut self, id_gen: impl Fn() -> String + Send + Sync + 'static) {
        self.id_gen = Box::new(id_gen);
    }

    /// Install a mutation hook.
    pub fn set_hook(
        &mut self,
        hook: impl Fn(&str, &str, &str, Option<&Resource>) -> Result<(), Error> + Send + Sync + 'static,
    ) {
        self.hook = Some(Box::new(hook));
    }

    fn log(&self, collection: &str) -> Result<&RowLog, Error> {
        self.logs
            .get(collection)
            .ok_or_else(|| Error::UnknownCollection(collection.to_string()))
    }

    fn schema(&self, collection: &str) -> Result<&Schema, Error> {
        self.schemas
            .get(collection)
            .ok_or_else(|| Error::UnknownCollection(collection.to_string()))
    }

    fn run_hook(
        &self,
        trigger: &str,
        collection: &str,
        id: &str,
        resource: Option<&Resource>,
    ) -> Result<(), Error> {
        match &self.hook {
            Some(hook) => hook(trigger, collection, id, resource),
            None => Ok(()),
        }
    }

    /// Create a resource: stamp a fresh `_id` and `_v = 1`, project through
    /// the collection's schema and append. Returns the stamped resource.
    pub fn create(&self, collection: &str, mut resource: Resource) -> Result<Resource, Error> {
        let log = self.log(collection)?;
        let schema = self.schema(collection)?;
        let id = (self.id_gen)();
        resource.insert("_id".to_string(), Value::Text(id.clone()));
        resource.insert("_v".to_string(), Value::Number(1.0));
        self.run_hook("create", collection, &id, Some(&resource))?;
        let row = schema.record(&resource)?;
        log.create(&row)?;
        Ok(resource)
    }

    /// Update the resource identified by `resource["_id"]`. Fields absent
    /// from `resource` keep their stored values (partial update); `_v` is
    /// bumped from the stored version. Returns the merged resource.
    pub fn update(&self, collection: &str, mut resource: Resource) -> Result<Resource, Error> {
        let log = self.log(collection)?;
        let schema = self.schema(collection)?;
        let id = match resource.get("_id") {
            Some(Value::Text(id)) => id.clone(),
            _ => return Err(Error::InvalidField("_id".to_string())),
        };
        let existing = self.get(collection, &id)?.ok_or(Error::NotFound)?;
        for field in schema.fields() {
            if !resource.contains_key(&field.field) {
                if let Some(value) = existing.get(&field.field) {
                    resource.insert(field.field.clone(), value.clone());
                }
            }
        }
        let current = existing.get("_v").and_then(Value::as_number).unwrap_or(0.0);
        resource.insert("_v".to_string(), Value::Number(current + 1.0));
        self.run_hook("update", collection, &id, Some(&resource))?;
        let row = schema.record(&resource)?;
        log.update(&row)?;
        Ok(resource)
    }

    /// Delete the resource with the given id.
    pub fn delete(&self, collection: &str, id: &str) -> Result<(), Error> {
        let log = self.log(collection)?;
        self.run_hook("delete", collection, id, None)?;
        log.delete(id)
    }

    /// Read one resource. Returns `Ok(None)` when the stored row is shorter
    /// than two fields; a missing id surfaces as [`Error::NotFound`].
    pub fn get(&self, collection: &str, id: &str) -> Result<Option<Resource>, Error> {
        let log = self.log(collection)?;
        let schema = self.schema(collection)?;
        let row = log.get(id)?;
        if row.len() < 2 {
            return Ok(None);
        }
        Ok(Some(schema.resource(&row)?))
    }

    /// Project every live row into a resource, in file order. With a sort
    /// key the result is stably ordered ascending (numeric for numbers,
    /// lexicographic for text) with missing values last. Fails on the first
    /// row that does not parse.
    pub fn list(&self, collection: &str, sort_by: Option<&str>) -> Result<Vec<Resource>, Error> {
        let log = self.log(collection)?;
        let schema = self.schema(collection)?;
        let mut resources = Vec::new();
        for row in log.iter() {
            let row = row?;
            if row.len() < 2 {
                continue;
            }
            resources.push(schema.resource(&row)?);
        }
        if let Some(key) = sort_by {
            resources.sort_by(|a, b| compare_values(a.get(key), b.get(key)));
        }
        Ok(resources)
    }

    /// Flush and close every row log.
    pub fn close(self) -> Result<(), Error> {
        for (_, log) in self.logs {
            log.close()?;
        }
        Ok(())
    }
}

fn parse_bound(cell: &str) -> Result<f64, Error> {
    if cell.is_empty() {
        return Ok(0.0);
    }
    cell.parse()
        .map_err(|_| Error::InvalidSchemaRecord(format!("bad numeric bound {cell:?}")))
}

fn check_system_fields(collection: &str, schema: &Schema) -> Result<(), Error> {
    let fields = schema.fields();
    let id_ok = fields
        .first()
        .is_some_and(|f| f.field == "_id" && f.kind == FieldType::Text);
    let v_ok = fields
        .get(1)
        .is_some_and(|f| f.field == "_v" && f.kind == FieldType::Number);
    if id_ok && v_ok {
        Ok(())
    } else {
        Err(Error::InvalidSchemaRecord(format!(
            "collection {collection:?} must start with _id (text) and _v (number)"
        )))
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::Text(x)), Some(Value::Text(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
