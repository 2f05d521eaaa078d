//! Catalog loading and normalization.
//!
//! A catalog is a pair of files: an authoritative nested JSON file
//! (`{group: [record, ...], ...}`) and a sibling delimited flat file with
//! the same stem and a `.csv` extension, whose columns follow the JSON's
//! global header order. The JSON drives schema inference (the row source is
//! generated and not self-describing); the flat file drives row
//! materialization. Each row is rendered as `header: field` lines and
//! parsed into a [`Document`].

use std::path::Path;

use tracing::{info, warn};

use crate::error::AdvisorError;
use crate::models::{AttrValue, Document};
use crate::record::parse_record;

/// Discover the global header set of a parsed catalog.
///
/// Walks every object under every top-level group and accumulates keys in
/// first-seen order, deduplicated. Pure function of the JSON value; shapes
/// other than objects-in-arrays are ignored.
pub fn discover_headers(catalog: &serde_json::Value) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();

    if let Some(groups) = catalog.as_object() {
        for records in groups.values() {
            if let Some(records) = records.as_array() {
                for record in records {
                    if let Some(fields) = record.as_object() {
                        for key in fields.keys() {
                            if !headers.iter().any(|h| h == key) {
                                headers.push(key.clone());
                            }
                        }
                    }
                }
            }
        }
    }

    headers
}

/// Load a catalog into normalized documents, in row order.
///
/// Fails with [`AdvisorError::NotFound`] when the JSON file is missing and
/// [`AdvisorError::DataSource`] when it is malformed or the sibling row
/// source is absent. A row whose rendered text fails record parsing is
/// skipped with a warning; the rest of the catalog still loads.
pub fn load_catalog(path: &Path) -> Result<Vec<Document>, AdvisorError> {
    if !path.exists() {
        return Err(AdvisorError::NotFound(format!(
            "catalog file does not exist: {}",
            path.display()
        )));
    }

    let raw = std::fs::read(path)
        .map_err(|e| AdvisorError::DataSource(format!("{}: {}", path.display(), e)))?;
    let catalog: serde_json::Value = serde_json::from_slice(&raw)
        .map_err(|e| AdvisorError::DataSource(format!("invalid catalog JSON {}: {}", path.display(), e)))?;

    if !catalog.is_object() {
        return Err(AdvisorError::DataSource(format!(
            "catalog root must be an object of groups: {}",
            path.display()
        )));
    }

    let headers = discover_headers(&catalog);
    if headers.is_empty() {
        return Err(AdvisorError::DataSource(format!(
            "catalog has no object records: {}",
            path.display()
        )));
    }

    let rows_path = path.with_extension("csv");
    if !rows_path.exists() {
        return Err(AdvisorError::DataSource(format!(
            "missing delimited row source: {}",
            rows_path.display()
        )));
    }

    let rows_raw = std::fs::read(&rows_path)
        .map_err(|e| AdvisorError::DataSource(format!("{}: {}", rows_path.display(), e)))?;
    // Lossy decode: undecodable bytes become replacement characters rather
    // than failing the catalog.
    let rows_text = String::from_utf8_lossy(&rows_raw).into_owned();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(rows_text.as_bytes());

    let mut documents = Vec::new();

    for (ordinal, row) in reader.records().enumerate() {
        // The first row repeats the header set; the JSON already told us.
        if ordinal == 0 {
            continue;
        }

        let row = row.map_err(|e| {
            AdvisorError::DataSource(format!("bad row in {}: {}", rows_path.display(), e))
        })?;

        let body = render_row(&headers, &row);

        match parse_record(&body) {
            Ok(attributes) => {
                let id = headers
                    .first()
                    .and_then(|h| attributes.get(h))
                    .map(AttrValue::as_text)
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| format!("row-{}", ordinal));

                documents.push(Document {
                    id: Some(id),
                    body,
                    attributes,
                });
            }
            Err(e) => {
                warn!(row = ordinal, error = %e, "skipping malformed record");
            }
        }
    }

    info!(
        catalog = %path.display(),
        documents = documents.len(),
        "loaded catalog"
    );

    Ok(documents)
}

/// Render one row as the `header: field` record text the parser consumes.
/// Every header gets a line; rows shorter than the header set render empty
/// trailing fields. Null characters are removed here so downstream bodies
/// are always clean.
fn render_row(headers: &[String], row: &csv::StringRecord) -> String {
    let body = headers
        .iter()
        .enumerate()
        .map(|(i, header)| format!("{}: {}", header, row.get(i).unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\n");

    body.replace('\u{0000}', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_catalog(dir: &TempDir, json: &str, csv: &str) -> std::path::PathBuf {
        let json_path = dir.path().join("courses.json");
        fs::write(&json_path, json).unwrap();
        fs::write(dir.path().join("courses.csv"), csv).unwrap();
        json_path
    }

    #[test]
    fn test_header_discovery_first_seen_order() {
        let catalog: serde_json::Value =
            serde_json::from_str(r#"{"courses":[{"a":1,"b":2},{"a":3,"c":4}]}"#).unwrap();
        assert_eq!(discover_headers(&catalog), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_header_discovery_across_groups() {
        let catalog: serde_json::Value =
            serde_json::from_str(r#"{"courses":[{"a":1}],"resources":[{"b":2},{"a":3}]}"#)
                .unwrap();
        assert_eq!(discover_headers(&catalog), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_catalog(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, AdvisorError::NotFound(_)));
    }

    #[test]
    fn test_missing_row_source_is_data_source_error() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("courses.json");
        fs::write(&json_path, r#"{"courses":[{"a":1}]}"#).unwrap();
        let err = load_catalog(&json_path).unwrap_err();
        assert!(matches!(err, AdvisorError::DataSource(_)));
    }

    #[test]
    fn test_malformed_json_is_data_source_error() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("courses.json");
        fs::write(&json_path, "{not json").unwrap();
        let err = load_catalog(&json_path).unwrap_err();
        assert!(matches!(err, AdvisorError::DataSource(_)));
    }

    #[test]
    fn test_load_renders_rows_against_headers() {
        let dir = TempDir::new().unwrap();
        let path = write_catalog(
            &dir,
            r#"{"courses":[{"Course Name":"x","Description":"y"}]}"#,
            "Course Name,Description\nCS101,\"Intro to Programming, evenings\"\n",
        );

        let docs = load_catalog(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id.as_deref(), Some("CS101"));
        assert_eq!(
            docs[0].body,
            "Course Name: CS101\nDescription: Intro to Programming, evenings"
        );
        assert_eq!(
            docs[0].attributes.get("Description"),
            Some(&AttrValue::Scalar(
                "Intro to Programming, evenings".to_string()
            ))
        );
    }

    #[test]
    fn test_list_valued_field_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = write_catalog(
            &dir,
            r#"{"courses":[{"Course Name":"x","Tags":["AI","ML"]}]}"#,
            "Course Name,Tags\nCS101,\"['AI', 'ML']\"\n",
        );

        let docs = load_catalog(&path).unwrap();
        assert_eq!(
            docs[0].attributes.get("Tags"),
            Some(&AttrValue::List(vec!["AI".to_string(), "ML".to_string()]))
        );
    }

    #[test]
    fn test_null_bytes_removed_from_body() {
        let dir = TempDir::new().unwrap();
        let path = write_catalog(
            &dir,
            r#"{"courses":[{"Course Name":"x"}]}"#,
            "Course Name\n\"CS\u{0000}101\"\n",
        );

        let docs = load_catalog(&path).unwrap();
        assert!(!docs[0].body.contains('\u{0000}'));
        assert_eq!(docs[0].body, "Course Name: CS101");
    }

    #[test]
    fn test_undecodable_bytes_coerced_to_valid_text() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("courses.json");
        fs::write(&json_path, r#"{"courses":[{"Course Name":"x"}]}"#).unwrap();
        fs::write(
            dir.path().join("courses.csv"),
            b"Course Name\nCS\xff101\n".as_slice(),
        )
        .unwrap();

        let docs = load_catalog(&json_path).unwrap();
        assert_eq!(docs[0].body, "Course Name: CS\u{FFFD}101");
    }

    #[test]
    fn test_short_row_renders_empty_trailing_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_catalog(
            &dir,
            r#"{"courses":[{"Course Name":"x","Description":"y"}]}"#,
            "Course Name,Description\nCS101\n",
        );

        let docs = load_catalog(&path).unwrap();
        assert_eq!(docs[0].body, "Course Name: CS101\nDescription: ");
    }

    #[test]
    fn test_reload_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = write_catalog(
            &dir,
            r#"{"courses":[{"Course Name":"x","Description":"y"}]}"#,
            "Course Name,Description\nCS101,Intro\nCS102,Systems\n",
        );

        let first = load_catalog(&path).unwrap();
        let second = load_catalog(&path).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.body, b.body);
            assert_eq!(a.attributes, b.attributes);
        }
    }
}
