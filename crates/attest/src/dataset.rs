//! Newline-delimited, comma-separated records

/// One data row. Fields are kept as written (untrimmed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetRecord {
    fields: Vec<String>,
}

impl DatasetRecord {
    pub fn from_line(line: &str) -> Self {
        Self {
            fields: line.split(',').map(str::to_string).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedDataset {
    /// Trimmed header fields; empty when the first line is blank.
    pub header: Vec<String>,
    /// Non-blank lines after the header.
    pub records: Vec<DatasetRecord>,
}

impl ParsedDataset {
    pub fn row_count(&self) -> usize {
        self.records.len()
    }
}

/// Parse raw bytes. Invalid UTF-8 is decoded lossily; integrity reports it separately.
pub fn parse(bytes: &[u8]) -> ParsedDataset {
    let text = String::from_utf8_lossy(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

    let header = match lines.next() {
        Some(first) if !first.trim().is_empty() => {
            first.split(',').map(|h| h.trim().to_string()).collect()
        }
        _ => Vec::new(),
    };

    let records = lines
        .filter(|l| !l.trim().is_empty())
        .map(DatasetRecord::from_line)
        .collect();

    ParsedDataset { header, records }
}
