use std::collections::HashMap;
use std::io::BufRead;

use thiserror::Error;

use crate::types::Strand;

/// File dialect detected from attribute syntax.
///
/// - GFF3 typically uses: key=value;key2=value2
/// - GTF typically uses: key "value"; key2 "value2";
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Gff3,
    Gtf,
    Unknown,
}

/// A single parsed record line from GTF/GFF3.
///
/// Coordinates are converted to 0-based half-open `[start0, end0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub seqname: String,
    pub source: String,
    pub feature_type: String,
    pub start0: u32,
    pub end0: u32,
    pub score: Option<f32>,
    pub strand: Strand,
    pub phase: Option<u8>,
    pub attrs: HashMap<String, String>,
    pub dialect: Dialect,
    /// 1-based line number in the input.
    pub line_no: usize,
}

impl AnnotationRecord {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(|s| s.as_str())
    }

    pub fn is_one_of(&self, feature_types: &[String]) -> bool {
        feature_types.iter().any(|t| t == &self.feature_type)
    }

    pub fn pick_first_attr(&self, keys: &[String]) -> Option<String> {
        for k in keys {
            if let Some(v) = self.attr(k) {
                let v = v.trim();
                if !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
        None
    }
}

/// One meaningful line of an annotation file.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Record(AnnotationRecord),
    /// `##sequence-region seqid start end`, converted to `[start, end)`.
    Region { seqid: String, start: u32, end: u32 },
}

/// Parsing errors for GTF/GFF3.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error while reading '{path}': {source}")]
    IoPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line_no}: {problem}: {line_preview}")]
    MalformedLine {
        line_no: usize,
        problem: String,
        line_preview: String,
    },

    #[error("line {line_no}: bad coordinates: {line_preview}")]
    BadCoordinates { line_no: usize, line_preview: String },

    #[error("transcript '{transcript}' (line {line_no}): missing {what} (tried keys: {tried:?})")]
    MissingAttribute {
        line_no: usize,
        transcript: String,
        what: &'static str,
        tried: Vec<String>,
    },
}

fn preview(line: &str) -> String {
    const MAX: usize = 120;
    match line.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}...", &line[..i]),
        None => line.to_string(),
    }
}

fn malformed(line_no: usize, line: &str, problem: impl Into<String>) -> ParseError {
    ParseError::MalformedLine {
        line_no,
        problem: problem.into(),
        line_preview: preview(line),
    }
}

fn bad_coordinates(line_no: usize, line: &str) -> ParseError {
    ParseError::BadCoordinates {
        line_no,
        line_preview: preview(line),
    }
}

/// Low-level streaming parser for GTF/GFF3 files.
///
/// Most users should use [`crate::annotation::AnnotationBuilder`], which turns a
/// whole file into a [`crate::FeatureGraph`].
///
/// # Example
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
/// use gene_tiler::annotation::io::AnnotationReader;
///
/// let file = File::open("genes.gff3").unwrap();
/// let rdr = AnnotationReader::new(BufReader::new(file));
/// for rec in rdr.records() {
///     let rec = rec.unwrap();
///     println!("{} {}-{}", rec.seqname, rec.start0, rec.end0);
/// }
/// ```
pub struct AnnotationReader<R: BufRead> {
    reader: R,
    buf: String,
    line_no: usize,
}

impl<R: BufRead> AnnotationReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line_no: 0,
        }
    }

    /// Records and `##sequence-region` pragmas, in file order.
    ///
    /// Blank lines, other comments and a trailing `##FASTA` section are skipped.
    pub fn entries(mut self) -> impl Iterator<Item = Result<Entry, ParseError>> {
        let mut done = false;
        std::iter::from_fn(move || loop {
            if done {
                return None;
            }
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line_no += 1,
                Err(e) => {
                    done = true;
                    return Some(Err(ParseError::IoPath {
                        path: "<reader>".to_string(),
                        source: e,
                    }));
                }
            }

            let line = self.buf.trim_end_matches(&['\n', '\r'][..]);
            if line.is_empty() {
                continue;
            }
            if let Some(pragma) = line.strip_prefix("##") {
                if pragma.starts_with("FASTA") {
                    done = true;
                    return None;
                }
                if let Some(rest) = pragma.strip_prefix("sequence-region") {
                    return Some(parse_region(rest, self.line_no, line));
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }

            return Some(parse_record_line(line, self.line_no).map(Entry::Record));
        })
    }

    /// Only the feature records.
    pub fn records(self) -> impl Iterator<Item = Result<AnnotationRecord, ParseError>> {
        self.entries().filter_map(|e| match e {
            Ok(Entry::Record(r)) => Some(Ok(r)),
            Ok(Entry::Region { .. }) => None,
            Err(e) => Some(Err(e)),
        })
    }
}

fn parse_region(rest: &str, line_no: usize, line: &str) -> Result<Entry, ParseError> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let [seqid, start, end] = fields[..] else {
        return Err(malformed(line_no, line, "expected '##sequence-region seqid start end'"));
    };
    let start: u64 = start.parse().map_err(|_| bad_coordinates(line_no, line))?;
    let end: u64 = end.parse().map_err(|_| bad_coordinates(line_no, line))?;
    if start == 0 || end < start || end > u32::MAX as u64 {
        return Err(bad_coordinates(line_no, line));
    }
    Ok(Entry::Region {
        seqid: seqid.to_string(),
        start: (start - 1) as u32,
        end: end as u32,
    })
}

/// Parse a single non-comment line into an `AnnotationRecord`.
pub fn parse_record_line(line: &str, line_no: usize) -> Result<AnnotationRecord, ParseError> {
    // seqname source feature start end score strand phase attributes
    let cols: Vec<&str> = line.split('\t').collect();
    let [seqname, source, feature_type, start_s, end_s, score_s, strand_s, phase_s, attrs_s] = cols[..] else {
        return Err(malformed(
            line_no,
            line,
            format!("expected 9 tab-separated columns, found {}", cols.len()),
        ));
    };

    // 1-based inclusive -> 0-based half-open [start-1, end)
    let start_1: u64 = start_s.parse().map_err(|_| bad_coordinates(line_no, line))?;
    let end_1: u64 = end_s.parse().map_err(|_| bad_coordinates(line_no, line))?;
    if start_1 == 0 || end_1 < start_1 || end_1 > u32::MAX as u64 {
        return Err(bad_coordinates(line_no, line));
    }

    let score = if score_s == "." {
        None
    } else {
        Some(
            score_s
                .parse::<f32>()
                .map_err(|_| malformed(line_no, line, format!("bad score '{score_s}'")))?,
        )
    };

    let strand = match strand_s {
        "+" => Strand::Plus,
        "-" => Strand::Minus,
        "." | "?" => Strand::Unknown,
        other => return Err(malformed(line_no, line, format!("bad strand '{other}'"))),
    };

    let phase = match phase_s {
        "." => None,
        "0" => Some(0),
        "1" => Some(1),
        "2" => Some(2),
        other => return Err(malformed(line_no, line, format!("bad phase '{other}'"))),
    };

    let (dialect, attrs) = parse_attributes(attrs_s);

    Ok(AnnotationRecord {
        seqname: seqname.to_string(),
        source: source.to_string(),
        feature_type: feature_type.to_string(),
        start0: (start_1 - 1) as u32,
        end0: end_1 as u32,
        score,
        strand,
        phase,
        attrs,
        dialect,
        line_no,
    })
}

/// Parse the attributes field for either GFF3 or GTF.
///
/// Heuristics:
/// - If it contains '=' => treat as GFF3
/// - Else if it contains quotes => treat as GTF
/// - Else Unknown, parsed best-effort per part
pub fn parse_attributes(s: &str) -> (Dialect, HashMap<String, String>) {
    let s = s.trim();

    let dialect = if s.contains('=') {
        Dialect::Gff3
    } else if s.contains('"') {
        Dialect::Gtf
    } else {
        Dialect::Unknown
    };

    let mut map = HashMap::new();
    for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let kv = match dialect {
            Dialect::Gff3 => part.split_once('='),
            Dialect::Gtf => part.split_once(char::is_whitespace),
            Dialect::Unknown => part
                .split_once('=')
                .or_else(|| part.split_once(char::is_whitespace)),
        };
        let Some((k, v)) = kv else {
            continue;
        };
        let (k, v) = (k.trim(), unquote(v));
        if !k.is_empty() && !v.is_empty() {
            map.insert(k.to_string(), v);
        }
    }

    (dialect, map)
}

fn unquote(v: &str) -> String {
    let v = v.trim();
    let v = v.strip_prefix('"').unwrap_or(v);
    let v = v.strip_suffix('"').unwrap_or(v);
    v.to_string()
}

/// GFF3 `Parent` may hold a comma-separated list.
pub fn split_parent_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_gtf_line() {
        let line = "chr1\tsrc\texon\t101\t150\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\"; exon_number \"1\";";
        let rec = parse_record_line(line, 7).unwrap();

        assert_eq!(rec.dialect, Dialect::Gtf);
        assert_eq!(rec.seqname, "chr1");
        assert_eq!(rec.feature_type, "exon");
        // 101..150 inclusive -> [100,150)
        assert_eq!(rec.start0, 100);
        assert_eq!(rec.end0, 150);
        assert_eq!(rec.strand, Strand::Plus);
        assert_eq!(rec.line_no, 7);

        assert_eq!(rec.attr("gene_id"), Some("G1"));
        assert_eq!(rec.attr("transcript_id"), Some("T1"));
        assert_eq!(rec.attr("exon_number"), Some("1"));
    }

    #[test]
    fn parse_gff3_line() {
        let line = "chr2\tsrc\tCDS\t5\t20\t.\t-\t2\tID=cds1;Parent=tx1,tx2";
        let rec = parse_record_line(line, 1).unwrap();

        assert_eq!(rec.dialect, Dialect::Gff3);
        assert_eq!(rec.start0, 4);
        assert_eq!(rec.end0, 20);
        assert_eq!(rec.strand, Strand::Minus);
        assert_eq!(rec.phase, Some(2));
        assert_eq!(split_parent_list(rec.attr("Parent").unwrap()), vec!["tx1", "tx2"]);
    }

    #[test]
    fn malformed_lines_report_line_numbers() {
        let err = parse_record_line("chr1\tsrc\texon\t10", 3).unwrap_err();
        assert!(matches!(err, ParseError::MalformedLine { line_no: 3, .. }));

        let err = parse_record_line("chr1\tsrc\texon\t50\t10\t.\t+\t.\tID=a", 4).unwrap_err();
        assert!(matches!(err, ParseError::BadCoordinates { line_no: 4, .. }));

        let err = parse_record_line("chr1\tsrc\texon\t1\t10\t.\tx\t.\tID=a", 5).unwrap_err();
        assert!(err.to_string().contains("bad strand"));
    }

    #[test]
    fn entries_include_sequence_regions() {
        let data = "\
##gff-version 3
##sequence-region chr1 1 5000
#comment
chr1\tsrc\texon\t1\t2\t.\t+\t.\tID=e1;Parent=t1

chr1\tsrc\texon\t3\t4\t.\t+\t.\tID=e2;Parent=t1
##FASTA
>chr1
ACGT
";
        let entries: Vec<_> = AnnotationReader::new(Cursor::new(data.as_bytes()))
            .entries()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            Entry::Region {
                seqid: "chr1".to_string(),
                start: 0,
                end: 5000
            }
        );
        let Entry::Record(last) = &entries[2] else {
            panic!("expected a record");
        };
        assert_eq!(last.line_no, 6);
        assert_eq!((last.start0, last.end0), (2, 4));

        let recs: Vec<_> = AnnotationReader::new(Cursor::new(data.as_bytes()))
            .records()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(recs.len(), 2);
    }

    #[test]
    fn bad_sequence_region_is_an_error() {
        let data = "##sequence-region chr1 1\n";
        let first = AnnotationReader::new(Cursor::new(data.as_bytes())).entries().next();
        assert!(matches!(first, Some(Err(ParseError::MalformedLine { line_no: 1, .. }))));
    }
}
