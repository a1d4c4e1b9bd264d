use anyhow::{Context, Result};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use walkdir::WalkDir;

use coderag_core::types::{Chunk, MetaFilter, MetaValue, SourceFile};

/// One JSON chunk per line; blank lines are skipped.
pub fn read_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let file = fs::File::open(path).with_context(|| format!("opening chunk file {}", path.display()))?;
    let mut chunks = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(&line).with_context(|| format!("{}:{}: invalid chunk", path.display(), n + 1))?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

fn language_of(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "py" => Some("python"),
        _ => None,
    }
}

/// Python sources under `root`, paths relative to it with `/` separators.
pub fn collect_sources(root: &Path) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(language) = language_of(entry.path()) else { continue };
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let rel = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
        match fs::read_to_string(entry.path()) {
            Ok(content) => files.push(SourceFile::new(rel, content, language)),
            Err(e) => tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable source file"),
        }
    }
    Ok(files)
}

/// `key=value` pairs; integers and booleans are typed, everything else is text.
pub fn parse_filter(pairs: &[String]) -> Result<Option<MetaFilter>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut filter = MetaFilter::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').with_context(|| format!("filter '{pair}' is not key=value"))?;
        let value = if let Ok(i) = value.parse::<i64>() {
            MetaValue::Int(i)
        } else if let Ok(b) = value.parse::<bool>() {
            MetaValue::Bool(b)
        } else {
            MetaValue::from(value)
        };
        filter.insert(key.trim().to_string(), value);
    }
    Ok(Some(filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_jsonl_and_skips_blank_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chunks.jsonl");
        fs::write(
            &path,
            "{\"id\":\"a\",\"file_path\":\"a.py\",\"content\":\"x = 1\",\"kind\":\"module\",\"language\":\"python\",\"start_line\":1,\"end_line\":1}\n\n",
        )
        .unwrap();
        let chunks = read_chunks(&path).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].file_path, "a.py");
    }

    #[test]
    fn collects_python_files_relative_to_root() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("pkg")).unwrap();
        fs::write(tmp.path().join("pkg/mod.py"), "import os\n").unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignore me").unwrap();
        let files = collect_sources(tmp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "pkg/mod.py");
        assert_eq!(files[0].language, "python");
    }

    #[test]
    fn filter_values_are_typed() {
        let f = parse_filter(&["start_line=3".into(), "file_path=a.py".into()]).unwrap().unwrap();
        assert_eq!(f["start_line"], MetaValue::Int(3));
        assert_eq!(f["file_path"], MetaValue::from("a.py"));
        assert!(parse_filter(&["oops".into()]).is_err());
        assert!(parse_filter(&[]).unwrap().is_none());
    }
}
