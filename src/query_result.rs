//! Tabular result of a text query, shared between [`crate::dbclient`] and
//! [`crate::projector`] (spec §3, §4.3).
//!
//! Columns carry their backend type OID so the supported-type check happens
//! once, at construction, rather than being rediscovered during projection
//! (spec §9, "Dynamic value typing across backends").

use thiserror::Error;

/// Backend type OIDs the Database Client is allowed to return (spec §4.3).
pub const SUPPORTED_OIDS: &[i32] = &[
    16,   // bool
    19,   // name
    1042, // bpchar
    1043, // varchar
    25,   // text
    21,   // int2
    23,   // int4
    20,   // int8
    26,   // oid
    700,  // float4
    701,  // float8
    1700, // numeric
    869,  // inet
];

#[derive(Debug, Error)]
#[error("unsupported result column type oid {0}")]
pub struct UnsupportedTypeError(pub i32);

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDescription {
    pub name: String,
    pub type_oid: i32,
}

/// A rectangular array of nullable string cells, plus column metadata.
///
/// Ownership: produced once by the Database Client, consumed once by the
/// Row Projector, then dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResult {
    columns: Vec<ColumnDescription>,
    rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    /// Construct a result, rejecting any column whose type OID is not in
    /// [`SUPPORTED_OIDS`] before a single row is converted (spec §4.3).
    ///
    /// # Errors
    /// Returns [`UnsupportedTypeError`] naming the first disallowed OID.
    pub fn new(
        columns: Vec<ColumnDescription>,
        rows: Vec<Vec<Option<String>>>,
    ) -> Result<Self, UnsupportedTypeError> {
        for col in &columns {
            if !SUPPORTED_OIDS.contains(&col.type_oid) {
                return Err(UnsupportedTypeError(col.type_oid));
            }
        }
        Ok(Self { columns, rows })
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}
