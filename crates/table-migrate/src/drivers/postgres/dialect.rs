//! PostgreSQL SQL dialect (Strategy pattern).

use crate::core::schema::{ColumnDescriptor, DdlStatement, SourceQuery, TableRef};
use crate::core::traits::Dialect;

/// PostgreSQL truncates identifiers longer than NAMEDATALEN - 1 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    pub fn new() -> Self {
        Self
    }

    fn column_list(&self, columns: &[ColumnDescriptor]) -> String {
        columns
            .iter()
            .map(|c| self.quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `SELECT COUNT(*)` over the query's result.
    pub fn count_query(&self, query: &SourceQuery) -> String {
        format!("SELECT COUNT(*) FROM ({}) AS src", self.render_query(query))
    }

    pub fn declare_cursor(&self, cursor: &str, sql: &str) -> String {
        format!("DECLARE {} NO SCROLL CURSOR FOR {}", cursor, sql)
    }

    pub fn fetch_forward(&self, cursor: &str, count: usize) -> String {
        format!("FETCH FORWARD {} FROM {}", count, cursor)
    }

    pub fn copy_in(&self, table: &TableRef, columns: &[ColumnDescriptor]) -> String {
        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT BINARY)",
            self.qualify(table),
            self.column_list(columns)
        )
    }
}

impl Dialect for PostgresDialect {
    fn max_identifier_len(&self) -> usize {
        MAX_IDENTIFIER_LEN
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn render_ddl(&self, stmt: &DdlStatement) -> String {
        match stmt {
            DdlStatement::CreateTable { table, columns } => {
                let col_defs: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        let null = if c.nullable { "" } else { " NOT NULL" };
                        format!(
                            "    {} {}{}",
                            self.quote_ident(&c.name),
                            format_column_type(c),
                            null
                        )
                    })
                    .collect();
                format!(
                    "CREATE TABLE {} (\n{}\n)",
                    self.qualify(table),
                    col_defs.join(",\n")
                )
            }
            DdlStatement::DropTable { table } => {
                format!("DROP TABLE IF EXISTS {}", self.qualify(table))
            }
            DdlStatement::CreateIndex { table, index } => {
                let cols = index
                    .columns
                    .iter()
                    .map(|c| self.quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                if index.is_primary {
                    format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
                        self.qualify(table),
                        self.quote_ident(&index.name),
                        cols
                    )
                } else {
                    format!(
                        "CREATE {}INDEX {} ON {} ({})",
                        if index.is_unique { "UNIQUE " } else { "" },
                        self.quote_ident(&index.name),
                        self.qualify(table),
                        cols
                    )
                }
            }
        }
    }

    fn render_query(&self, query: &SourceQuery) -> String {
        match query {
            SourceQuery::Table { table, columns } => format!(
                "SELECT {} FROM {}",
                self.column_list(columns),
                self.qualify(table)
            ),
            SourceQuery::Custom { sql } => sql.trim().trim_end_matches(';').trim_end().to_string(),
        }
    }
}

/// Column type as written in a column definition.
pub fn format_column_type(col: &ColumnDescriptor) -> String {
    // Array typmods are not reported by the catalog.
    if let Some(element) = col.data_type.strip_prefix('_') {
        return format!("{}[]", format_base_type(element, 0, 0, 0));
    }
    format_base_type(&col.data_type, col.max_length, col.precision, col.scale)
}

fn format_base_type(data_type: &str, max_length: i32, precision: i32, scale: i32) -> String {
    let lower = data_type.to_lowercase();
    match lower.as_str() {
        "numeric" | "decimal" => {
            if precision > 0 {
                format!("numeric({},{})", precision, scale)
            } else {
                "numeric".to_string()
            }
        }
        "varchar" | "character varying" => {
            if max_length > 0 {
                format!("varchar({})", max_length)
            } else {
                "varchar".to_string()
            }
        }
        "bpchar" | "char" | "character" => {
            if max_length > 0 {
                format!("char({})", max_length)
            } else {
                "bpchar".to_string()
            }
        }
        "bit" | "varbit" if max_length > 0 => format!("{}({})", lower, max_length),
        other => other.to_string(),
    }
}
