use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// One session export row, column name to value.
pub type SessionRecord = BTreeMap<String, String>;

/// A tabular session export (e.g. a Sched CSV download).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SessionTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Read CSV with a header row. Rows must all have the header's width.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv
            .headers()
            .context("Failed to read CSV header row")?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.iter().all(String::is_empty) {
            return Err(anyhow!("CSV input has no header row"));
        }

        let mut rows = Vec::new();
        for (i, record) in csv.records().enumerate() {
            // Line 1 is the header
            let record = record.with_context(|| format!("Malformed CSV record on line {}", i + 2))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        if rows.is_empty() {
            return Err(anyhow!("CSV input has a header but no data rows"));
        }

        Ok(Self { headers, rows })
    }

    pub fn from_csv_str(input: &str) -> Result<Self> {
        Self::from_csv_reader(input.as_bytes())
    }

    /// Create a table from a JSON array of objects. Headers come from the
    /// first object; missing fields read as empty strings.
    pub fn from_json(value: &Value) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| anyhow!("Session data must be a JSON array of objects"))?;

        let first = array
            .first()
            .ok_or_else(|| anyhow!("Session data array is empty"))?
            .as_object()
            .ok_or_else(|| anyhow!("Items in array must be objects"))?;
        let headers: Vec<String> = first.keys().cloned().collect();

        let mut rows = Vec::with_capacity(array.len());
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| anyhow!("Items in array must be objects"))?;

            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let cell = match obj.get(header) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::Bool(b)) => b.to_string(),
                    Some(Value::Null) | None => String::new(),
                    _ => return Err(anyhow!("Unsupported value type for field '{}'", header)),
                };
                row.push(cell);
            }
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    /// Load a `.json` export as JSON and anything else as CSV.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file '{}'", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let table = if is_json {
            let value: Value = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON in '{}'", path.display()))?;
            Self::from_json(&value)
        } else {
            Self::from_csv_str(&contents)
        };
        table.with_context(|| format!("Invalid session data in '{}'", path.display()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = SessionRecord> + '_ {
        self.rows.iter().map(|row| {
            self.headers
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
    }
}
