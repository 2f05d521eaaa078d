//! Catalog JSON to delimited flat-file conversion.
//!
//! Produces the row source that pairs with a catalog's JSON file: one
//! header row in global header order, then one row per record across all
//! groups. List-valued fields are rendered in the bracketed form the
//! record parser reads back (`['a', 'b']`), so the pairing round-trips.

use std::path::Path;

use crate::catalog::discover_headers;
use crate::error::AdvisorError;

/// Convert a catalog JSON file into its sibling CSV row source.
pub fn run_convert(input: &Path, output: &Path) -> Result<(), AdvisorError> {
    if !input.exists() {
        return Err(AdvisorError::NotFound(format!(
            "input file does not exist: {}",
            input.display()
        )));
    }

    let raw = std::fs::read(input)
        .map_err(|e| AdvisorError::DataSource(format!("{}: {}", input.display(), e)))?;
    let catalog: serde_json::Value = serde_json::from_slice(&raw)
        .map_err(|e| AdvisorError::DataSource(format!("invalid catalog JSON: {}", e)))?;

    let groups = catalog.as_object().ok_or_else(|| {
        AdvisorError::DataSource(format!(
            "catalog root must be an object of groups: {}",
            input.display()
        ))
    })?;

    let headers = discover_headers(&catalog);
    if headers.is_empty() {
        return Err(AdvisorError::DataSource(format!(
            "catalog has no object records: {}",
            input.display()
        )));
    }

    let mut writer = csv::Writer::from_path(output)
        .map_err(|e| AdvisorError::DataSource(format!("{}: {}", output.display(), e)))?;

    writer
        .write_record(&headers)
        .map_err(|e| AdvisorError::DataSource(e.to_string()))?;

    let mut rows = 0usize;
    for records in groups.values() {
        let Some(records) = records.as_array() else {
            continue;
        };
        for record in records {
            let Some(fields) = record.as_object() else {
                continue;
            };
            let row: Vec<String> = headers
                .iter()
                .map(|h| fields.get(h).map(render_field).unwrap_or_default())
                .collect();
            writer
                .write_record(&row)
                .map_err(|e| AdvisorError::DataSource(e.to_string()))?;
            rows += 1;
        }
    }

    writer
        .flush()
        .map_err(|e| AdvisorError::DataSource(e.to_string()))?;

    eprintln!(
        "converted {} records ({} columns) to {}",
        rows,
        headers.len(),
        output.display()
    );

    Ok(())
}

/// Render one JSON field as a CSV cell.
fn render_field(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => format!("'{}'", s),
                    other => format!("'{}'", other),
                })
                .collect();
            format!("[{}]", rendered.join(", "))
        }
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_convert_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("courses.json");
        let output = dir.path().join("courses.csv");
        fs::write(
            &input,
            r#"{"courses":[{"Course Name":"CS101","Description":"Intro"},{"Course Name":"CS102","Credits":4}]}"#,
        )
        .unwrap();

        run_convert(&input, &output).unwrap();

        let text = fs::read_to_string(&output).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Course Name,Description,Credits"));
        assert_eq!(lines.next(), Some("CS101,Intro,"));
        assert_eq!(lines.next(), Some("CS102,,4"));
    }

    #[test]
    fn test_convert_renders_lists_in_bracket_form() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("courses.json");
        let output = dir.path().join("courses.csv");
        fs::write(&input, r#"{"courses":[{"Name":"x","Tags":["AI","ML"]}]}"#).unwrap();

        run_convert(&input, &output).unwrap();

        let text = fs::read_to_string(&output).unwrap();
        assert!(text.contains("\"['AI', 'ML']\""));
    }

    #[test]
    fn test_convert_missing_input() {
        let dir = TempDir::new().unwrap();
        let err = run_convert(&dir.path().join("nope.json"), &dir.path().join("out.csv"))
            .unwrap_err();
        assert!(matches!(err, AdvisorError::NotFound(_)));
    }
}
