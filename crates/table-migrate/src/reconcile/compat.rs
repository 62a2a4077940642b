//! Column compatibility check for `append_if_compatible`.
//!
//! A source column set fits an existing target table when both sides have
//! the same column names (ASCII case-insensitive, any order) and every
//! source type is accepted by the matching target column. Acceptance is
//! reflexive on the normalized type name, plus the widenings below:
//!
//! | source         | accepted target                                  |
//! |----------------|--------------------------------------------------|
//! | `int2`         | `int4`, `int8`, `numeric`                        |
//! | `int4`         | `int8`, `numeric`                                |
//! | `int8`         | `numeric`                                        |
//! | `float4`       | `float8`                                         |
//! | `varchar(n)`   | `varchar(m >= n)`, `text`                        |
//! | `bpchar(n)`    | `bpchar(n)`, `varchar(m >= n)`, `text`           |
//! | `numeric(p,s)` | `numeric(p',s')` with `s' >= s`, `p'-s' >= p-s`  |
//!
//! A length or precision of 0 means "not constrained" on the target and
//! "unknown" on the source. Query result metadata never carries modifiers,
//! so an unknown source length is accepted by any length. A numeric source
//! without precision only fits an unconstrained numeric target.
//! Nullability is not compared.

use crate::core::schema::ColumnDescriptor;

/// Canonical catalog name for a type, folding SQL aliases.
pub fn normalize_type(data_type: &str) -> String {
    let lower = data_type.trim().to_ascii_lowercase();
    let canonical = match lower.as_str() {
        "smallint" | "int2" => "int2",
        "integer" | "int" | "int4" => "int4",
        "bigint" | "int8" => "int8",
        "real" | "float4" => "float4",
        "double precision" | "float" | "float8" => "float8",
        "character varying" | "varchar" => "varchar",
        "character" | "char" | "bpchar" => "bpchar",
        "decimal" | "numeric" => "numeric",
        "boolean" | "bool" => "bool",
        "timestamp without time zone" | "timestamp" => "timestamp",
        "timestamp with time zone" | "timestamptz" => "timestamptz",
        "time without time zone" | "time" => "time",
        other => other,
    };
    canonical.to_string()
}

/// Whether a value of column `source` can be stored in column `target`
/// without loss.
pub fn type_accepts(target: &ColumnDescriptor, source: &ColumnDescriptor) -> bool {
    let src = normalize_type(&source.data_type);
    let dst = normalize_type(&target.data_type);

    match (src.as_str(), dst.as_str()) {
        ("int2", "int2" | "int4" | "int8")
        | ("int4", "int4" | "int8")
        | ("int8", "int8")
        | ("float4", "float4" | "float8")
        | ("float8", "float8") => true,
        ("int2", "numeric") => numeric_holds_integer(target, 5),
        ("int4", "numeric") => numeric_holds_integer(target, 10),
        ("int8", "numeric") => numeric_holds_integer(target, 19),
        ("varchar" | "bpchar", "text") => true,
        ("varchar" | "bpchar", "varchar") => length_fits(source.max_length, target.max_length),
        ("bpchar", "bpchar") => {
            source.max_length == 0 || target.max_length == source.max_length
        }
        ("numeric", "numeric") => numeric_fits(source, target),
        (s, d) => s == d,
    }
}

fn length_fits(source_len: i32, target_len: i32) -> bool {
    source_len == 0 || target_len == 0 || target_len >= source_len
}

fn numeric_holds_integer(target: &ColumnDescriptor, digits: i32) -> bool {
    target.precision == 0 || target.precision - target.scale >= digits
}

fn numeric_fits(source: &ColumnDescriptor, target: &ColumnDescriptor) -> bool {
    if target.precision == 0 {
        return true;
    }
    if source.precision == 0 {
        return false;
    }
    target.scale >= source.scale
        && target.precision - target.scale >= source.precision - source.scale
}

/// Explain why `target` cannot receive rows shaped like `source`, or return
/// `None` when the column sets are compatible.
pub fn check_compatible(
    source: &[ColumnDescriptor],
    target: &[ColumnDescriptor],
) -> Option<String> {
    let mut problems = Vec::new();

    for src in source {
        match target.iter().find(|t| t.has_name(&src.name)) {
            None => problems.push(format!("column {} is missing on the target", src.name)),
            Some(dst) if !type_accepts(dst, src) => problems.push(format!(
                "column {} has type {} on the target, which cannot hold source type {}",
                src.name,
                describe_type(dst),
                describe_type(src)
            )),
            Some(_) => {}
        }
    }
    for dst in target {
        if !source.iter().any(|s| s.has_name(&dst.name)) {
            problems.push(format!("target column {} has no source column", dst.name));
        }
    }

    if problems.is_empty() {
        None
    } else {
        Some(problems.join("; "))
    }
}

fn describe_type(col: &ColumnDescriptor) -> String {
    let ty = normalize_type(&col.data_type);
    match ty.as_str() {
        "numeric" if col.precision > 0 => format!("numeric({},{})", col.precision, col.scale),
        "varchar" | "bpchar" if col.max_length > 0 => format!("{}({})", ty, col.max_length),
        _ => ty,
    }
}
