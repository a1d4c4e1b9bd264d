use coderag_core::types::{ChunkMeta, MetaFilter, MetaValue};

/// A metadata filter lowered to a Lance SQL predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledFilter {
	/// No restriction.
	All,
	/// Some condition can never hold (unknown field or mismatched type).
	Never(String),
	Sql(String),
}

fn quote(s: &str) -> String { format!("'{}'", s.replace('\'', "''")) }

fn condition(field: &str, value: &MetaValue) -> Result<String, String> {
	let column = format!("`{field}`");
	if ChunkMeta::STRING_FIELDS.contains(&field) {
		return match value {
			MetaValue::Str(s) => Ok(format!("{column} = {}", quote(s))),
			other => Err(format!("field '{field}' holds text, filter value is {other:?}")),
		};
	}
	if ChunkMeta::INT_FIELDS.contains(&field) {
		return match value.as_int() {
			Some(v) => Ok(format!("{column} = {v}")),
			None => Err(format!("field '{field}' holds integers, filter value is {value:?}")),
		};
	}
	Err(format!("unknown metadata field '{field}'"))
}

/// Exact-match conjunction over the stored metadata columns.
pub fn compile_filter(filter: Option<&MetaFilter>) -> CompiledFilter {
	let Some(filter) = filter.filter(|f| !f.is_empty()) else { return CompiledFilter::All };
	let mut parts = Vec::with_capacity(filter.len());
	for (field, value) in filter {
		match condition(field, value) {
			Ok(sql) => parts.push(sql),
			Err(reason) => return CompiledFilter::Never(reason),
		}
	}
	CompiledFilter::Sql(parts.join(" AND "))
}
