use std::{io::BufRead, path::Path};

use anyhow::{Context, Result};

/// Reads a JSONL file back as raw lines, skipping blank lines.
pub fn read_jsonl_lines(path: &Path) -> Result<Vec<String>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = std::io::BufReader::new(file);

    let mut rows = Vec::new();
    for (index, line_result) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line_result
            .with_context(|| format!("failed reading line {} from {}", line_no, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(line);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::read_jsonl_lines;
    use tempfile::tempdir;

    #[test]
    fn unit_read_jsonl_lines_preserves_line_order() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("records.jsonl");
        std::fs::write(&path, "{\"seq\":1}\n{\"seq\":2}\n").expect("seed file");

        let lines = read_jsonl_lines(&path).expect("read lines");
        assert_eq!(lines, vec!["{\"seq\":1}", "{\"seq\":2}"]);
    }

    #[test]
    fn unit_read_jsonl_lines_skips_blank_lines() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("records.jsonl");
        std::fs::write(&path, "{\"seq\":1}\n\n   \n{\"seq\":2}\n").expect("seed file");

        let lines = read_jsonl_lines(&path).expect("read lines");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn regression_read_jsonl_lines_errors_on_missing_file() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("absent.jsonl");

        let error = read_jsonl_lines(&path).expect_err("missing file");
        assert!(error.to_string().contains("failed to open"));
    }
}
