//! Schema metadata types.

use std::fmt;

use serde::Serialize;

/// Reference to a table, optionally schema-qualified.
///
/// An unqualified reference resolves through the connection's search path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.into(),
        }
    }

    /// Parse `table` or `schema.table` the way PostgreSQL reads identifiers:
    /// unquoted parts fold to lower case, `"Quoted"` parts keep their case
    /// and may contain dots (`""` is a literal quote).
    pub fn parse(qualified: &str) -> Self {
        let parts = split_identifier(qualified.trim());
        match parts.as_slice() {
            [schema, name] if !schema.is_empty() && !name.is_empty() => {
                Self::new(Some(schema.as_str()), name.as_str())
            }
            [name] => Self::new(None, name.as_str()),
            _ => Self::new(None, qualified.trim().to_ascii_lowercase()),
        }
    }
}

fn split_identifier(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => quoted = !quoted,
            '.' if !quoted => parts.push(std::mem::take(&mut current)),
            c if quoted => current.push(c),
            c => current.push(c.to_ascii_lowercase()),
        }
    }
    parts.push(current);
    parts
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Column metadata.
///
/// `max_length`, `precision` and `scale` are 0 when the type carries no such
/// modifier or when it is unknown (query result metadata never reports it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Catalog type name (`int4`, `varchar`, `numeric`, `_text`, ...).
    pub data_type: String,
    pub max_length: i32,
    pub precision: i32,
    pub scale: i32,
    pub nullable: bool,
}

impl ColumnDescriptor {
    /// Nullable column without type modifiers.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            max_length: 0,
            precision: 0,
            scale: 0,
            nullable: true,
        }
    }

    pub fn with_length(mut self, max_length: i32) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_precision(mut self, precision: i32, scale: i32) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Case-insensitive name comparison.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDescriptor {
    pub name: String,
    /// Key columns in index order.
    pub columns: Vec<String>,
    pub is_unique: bool,
    /// Backs the table's primary key constraint.
    pub is_primary: bool,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            is_unique: false,
            is_primary: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self.is_unique = true;
        self
    }

    /// Same name and same ordered column list, ignoring ASCII case.
    pub fn matches(&self, other: &IndexDescriptor) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

/// Rows to read from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceQuery {
    /// Every listed column of a table, in the listed order.
    Table {
        table: TableRef,
        columns: Vec<ColumnDescriptor>,
    },
    /// Operator supplied SQL, executed as written.
    Custom { sql: String },
}

/// Schema change applied to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlStatement {
    CreateTable {
        table: TableRef,
        columns: Vec<ColumnDescriptor>,
    },
    DropTable {
        table: TableRef,
    },
    CreateIndex {
        table: TableRef,
        index: IndexDescriptor,
    },
}

impl DdlStatement {
    pub fn table(&self) -> &TableRef {
        match self {
            DdlStatement::CreateTable { table, .. }
            | DdlStatement::DropTable { table }
            | DdlStatement::CreateIndex { table, .. } => table,
        }
    }
}
