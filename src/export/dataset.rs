//! Sparse-vector dataset files.
//!
//! One line per bug, in the text format classifier trainers read:
//!
//! ```text
//! <label> 1:<v1> 2:<v2> 3:<v3> 4:<v4> 5:<v5> 6:<v6> 7:<v7> 8:<v8> 9:<v9>  #<bug id>
//! ```
//!
//! Files are only ever appended to. Several runs may share one file.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::accumulator::{FeatureVector, FEATURE_COUNT};
use crate::bugzilla::BugId;
use crate::error::DatasetError;

/// One labeled feature vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetLine {
    pub label: i32,
    pub features: FeatureVector,
    pub bug_id: BugId,
}

impl DatasetLine {
    pub fn new(label: i32, features: FeatureVector, bug_id: BugId) -> Self {
        Self {
            label,
            features,
            bug_id,
        }
    }

    /// Parse a line, reporting `line_no` in errors.
    pub fn parse(raw: &str, line_no: usize) -> Result<Self, DatasetError> {
        let malformed = |reason: String| DatasetError::MalformedLine {
            line: line_no,
            reason,
        };

        let (body, id) = raw
            .rsplit_once('#')
            .ok_or_else(|| malformed("missing '#<bug id>' suffix".to_string()))?;
        let bug_id: BugId = id
            .parse()
            .map_err(|e| malformed(format!("invalid bug id '{}': {}", id.trim(), e)))?;

        let mut tokens = body.split_whitespace();
        let label: i32 = tokens
            .next()
            .ok_or_else(|| malformed("missing label".to_string()))?
            .parse()
            .map_err(|e| malformed(format!("invalid label: {}", e)))?;

        let mut values = [0.0; FEATURE_COUNT];
        let mut count = 0;
        for token in tokens {
            if count == FEATURE_COUNT {
                return Err(malformed(format!(
                    "more than {} features",
                    FEATURE_COUNT
                )));
            }
            let (index, value) = token
                .split_once(':')
                .ok_or_else(|| malformed(format!("'{}' is not index:value", token)))?;
            if index != (count + 1).to_string() {
                return Err(malformed(format!(
                    "expected feature index {}, found '{}'",
                    count + 1,
                    index
                )));
            }
            values[count] = value
                .parse()
                .map_err(|e| malformed(format!("invalid value '{}': {}", value, e)))?;
            count += 1;
        }

        if count != FEATURE_COUNT {
            return Err(malformed(format!(
                "expected {} features, found {}",
                FEATURE_COUNT, count
            )));
        }

        Ok(Self::new(label, FeatureVector::new(values), bug_id))
    }
}

impl fmt::Display for DatasetLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)?;
        for (index, value) in self.features.values().iter().enumerate() {
            write!(f, " {}:{}", index + 1, value)?;
        }
        write!(f, "  #{}", self.bug_id)
    }
}

impl FromStr for DatasetLine {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, 1)
    }
}

/// Appends dataset lines to a file.
///
/// Each line is written with a single `write_all` while holding the file
/// lock, so lines from concurrent completions never interleave.
pub struct DatasetWriter {
    path: PathBuf,
    file: Mutex<File>,
    lines_written: AtomicUsize,
}

impl DatasetWriter {
    /// Open `path` for appending, creating it (and its parent directory) if needed.
    pub async fn open_append(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::debug!(path = %path.display(), "Opened dataset file for append");

        Ok(Self {
            path,
            file: Mutex::new(file),
            lines_written: AtomicUsize::new(0),
        })
    }

    /// A writer over an existing file opened without write access, so every
    /// append fails.
    #[cfg(test)]
    pub(crate) async fn open_read_only(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            lines_written: AtomicUsize::new(0),
        })
    }

    /// Append one line.
    pub async fn append(&self, line: &DatasetLine) -> Result<(), DatasetError> {
        let encoded = format!("{}\n", line);
        let mut file = self.file.lock().await;
        file.write_all(encoded.as_bytes()).await?;
        file.flush().await?;
        self.lines_written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Lines appended through this writer (not lines already in the file).
    pub fn lines_written(&self) -> usize {
        self.lines_written.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Summary of an existing dataset file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetSummary {
    pub total_lines: usize,
    pub per_label: BTreeMap<i32, usize>,
    pub distinct_bugs: usize,
    /// Bugs that appear on more than one line, e.g. after re-running a query.
    pub duplicate_bugs: Vec<BugId>,
}

impl DatasetSummary {
    pub fn from_lines(lines: &[DatasetLine]) -> Self {
        let mut per_label = BTreeMap::new();
        let mut occurrences: HashMap<BugId, usize> = HashMap::new();

        for line in lines {
            *per_label.entry(line.label).or_insert(0) += 1;
            *occurrences.entry(line.bug_id).or_insert(0) += 1;
        }

        let mut duplicate_bugs: Vec<BugId> = occurrences
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(id, _)| *id)
            .collect();
        duplicate_bugs.sort();

        Self {
            total_lines: lines.len(),
            per_label,
            distinct_bugs: occurrences.len(),
            duplicate_bugs,
        }
    }
}

/// Read every line of a dataset file. Blank lines are skipped.
pub fn load_dataset(path: &Path) -> Result<Vec<DatasetLine>, DatasetError> {
    if !path.is_file() {
        return Err(DatasetError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| DatasetLine::parse(line, index + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample_line(label: i32, bug: u64) -> DatasetLine {
        DatasetLine::new(
            label,
            FeatureVector::new([0.3, 0.1, 1.0, 0.5, 1.0, 0.3, 0.09, 0.02, 0.045]),
            BugId::new(bug),
        )
    }

    #[test]
    fn test_line_format() {
        let line = sample_line(1, 1093402);
        assert_eq!(
            line.to_string(),
            "1 1:0.3 2:0.1 3:1 4:0.5 5:1 6:0.3 7:0.09 8:0.02 9:0.045  #1093402"
        );
    }

    #[test]
    fn test_line_tokens_are_in_index_order() {
        let line = DatasetLine::new(0, FeatureVector::new([-1.0; FEATURE_COUNT]), BugId::new(5));
        let text = line.to_string();
        let (body, id) = text.rsplit_once("  #").expect("bug id suffix");
        assert_eq!(id, "5");

        let tokens: Vec<&str> = body.split(' ').collect();
        assert_eq!(tokens[0], "0");
        assert_eq!(tokens.len(), 1 + FEATURE_COUNT);
        for (i, token) in tokens[1..].iter().enumerate() {
            assert_eq!(*token, format!("{}:-1", i + 1));
        }
    }

    #[test]
    fn test_parse_reads_back_written_line() {
        let line = sample_line(0, 77);
        let parsed: DatasetLine = line.to_string().parse().expect("should parse");
        assert_eq!(parsed, line);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        let cases = [
            "1 1:0 2:0 3:0 4:0 5:0 6:0 7:0 8:0 9:0",
            "1 1:0 2:0 3:0  #12",
            "1 2:0 1:0 3:0 4:0 5:0 6:0 7:0 8:0 9:0  #12",
            "x 1:0 2:0 3:0 4:0 5:0 6:0 7:0 8:0 9:0  #12",
            "1 1:0 2:0 3:0 4:0 5:0 6:0 7:0 8:0 9:0 10:0  #12",
            "1 1:0 2:0 3:0 4:0 5:0 6:0 7:0 8:0 9:abc  #12",
        ];
        for case in cases {
            let err = DatasetLine::parse(case, 3).unwrap_err();
            assert!(
                matches!(err, DatasetError::MalformedLine { line: 3, .. }),
                "{case}"
            );
        }
    }

    #[tokio::test]
    async fn test_writer_appends_and_never_truncates() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("output.ds");

        let writer = DatasetWriter::open_append(&path).await.expect("open");
        writer.append(&sample_line(1, 1)).await.expect("append");
        drop(writer);

        let writer = DatasetWriter::open_append(&path).await.expect("reopen");
        writer.append(&sample_line(0, 2)).await.expect("append");
        assert_eq!(writer.lines_written(), 1);

        let lines = load_dataset(&path).expect("load");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].bug_id, BugId::new(1));
        assert_eq!(lines[1].label, 0);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_lines_whole() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("output.ds");
        let writer = Arc::new(DatasetWriter::open_append(&path).await.expect("open"));

        let mut handles = Vec::new();
        for bug in 0..64u64 {
            let writer = Arc::clone(&writer);
            handles.push(tokio::spawn(async move {
                writer.append(&sample_line(1, bug)).await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("append");
        }

        let lines = load_dataset(&path).expect("every line parses");
        assert_eq!(lines.len(), 64);
        assert_eq!(DatasetSummary::from_lines(&lines).distinct_bugs, 64);
    }

    #[test]
    fn test_summary_counts_labels_and_duplicates() {
        let lines = vec![
            sample_line(1, 10),
            sample_line(1, 11),
            sample_line(0, 12),
            sample_line(1, 10),
        ];
        let summary = DatasetSummary::from_lines(&lines);
        assert_eq!(summary.total_lines, 4);
        assert_eq!(summary.per_label.get(&1), Some(&3));
        assert_eq!(summary.per_label.get(&0), Some(&1));
        assert_eq!(summary.distinct_bugs, 3);
        assert_eq!(summary.duplicate_bugs, vec![BugId::new(10)]);
    }

    #[test]
    fn test_load_nonexistent_path() {
        let result = load_dataset(Path::new("/nonexistent/path.ds"));
        assert!(matches!(result, Err(DatasetError::NotFound(_))));
    }
}
