//! Minimal reader and writer for the comma separated tables the catalog,
//! requirement masters and saved entries live in.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, take_while};
use nom::character::complete::char;
use nom::combinator::{eof, map, value};
use nom::error::VerboseError;
use nom::multi::{fold_many0, separated_list1};
use nom::sequence::{delimited, terminated};
use thiserror::Error;

const BOM: char = '\u{feff}';

pub type TableResult<T> = Result<T, TableError>;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed table at line {line}: {message}")]
    Parse { line: usize, message: String },
}

type IResult<'a, O> = nom::IResult<&'a str, O, VerboseError<&'a str>>;

fn quoted_chunk(input: &str) -> IResult<&str> {
    alt((value("\"", tag("\"\"")), is_not("\"")))(input)
}

fn quoted_field(input: &str) -> IResult<String> {
    delimited(
        char('"'),
        fold_many0(quoted_chunk, String::new, |mut acc, chunk| {
            acc.push_str(chunk);
            acc
        }),
        char('"'),
    )(input)
}

fn bare_field(input: &str) -> IResult<String> {
    map(
        take_while(|c: char| c != ',' && c != '\n' && c != '\r'),
        str::to_owned,
    )(input)
}

fn field(input: &str) -> IResult<String> {
    alt((quoted_field, bare_field))(input)
}

fn line_end(input: &str) -> IResult<&str> {
    alt((tag("\r\n"), tag("\n"), tag("\r"), eof))(input)
}

fn record(input: &str) -> IResult<Vec<String>> {
    terminated(separated_list1(char(','), field), line_end)(input)
}

/// Parsed table: a header row plus data rows. Blank lines are dropped.
#[derive(Debug, Clone, Default)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn parse(text: &str) -> TableResult<Self> {
        let body = text.strip_prefix(BOM).unwrap_or(text);
        let mut rest = body;
        let mut records = Vec::new();

        while !rest.is_empty() {
            match record(rest) {
                Ok((next, cells)) => {
                    rest = next;
                    if cells.len() == 1 && cells[0].trim().is_empty() {
                        continue;
                    }
                    records.push(cells);
                }
                Err(_) => {
                    let consumed = body.len() - rest.len();
                    return Err(TableError::Parse {
                        line: body[..consumed].matches('\n').count() + 1,
                        message: format!(
                            "unexpected input near '{}'",
                            rest.chars().take(16).collect::<String>()
                        ),
                    });
                }
            }
        }

        let mut records = records.into_iter();
        let header = records
            .next()
            .map(|cells| cells.into_iter().map(|cell| cell.trim().to_owned()).collect())
            .unwrap_or_default();

        Ok(Self {
            header,
            rows: records.collect(),
        })
    }

    /// Reads and parses a table, reporting a missing file as [`TableError::NotFound`].
    pub fn read<P: AsRef<Path>>(path: P) -> TableResult<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(TableError::NotFound(path.to_path_buf()))
            }
            Err(source) => Err(TableError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Index of the first header cell equal to `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|cell| cell == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row { cells })
    }
}

/// Borrowed view of one data row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    cells: &'a [String],
}

impl<'a> Row<'a> {
    /// Trimmed cell value; missing columns and short rows read as "".
    pub fn get(&self, column: Option<usize>) -> &'a str {
        column
            .and_then(|idx| self.cells.get(idx))
            .map(|cell| cell.trim())
            .unwrap_or("")
    }
}

fn quote_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_owned()
    }
}

/// Renders a header and rows as comma separated text with LF line endings.
pub fn render_table<I>(header: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut out = header
        .iter()
        .map(|cell| quote_cell(cell))
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');
    for row in rows {
        let line = row
            .iter()
            .map(|cell| quote_cell(cell))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Rewrites the whole file at `path`, creating parent directories as needed.
pub fn write_table<P, I>(path: P, header: &[&str], rows: I) -> TableResult<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = Vec<String>>,
{
    let path = path.as_ref();
    let io_err = |source| TableError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    fs::write(path, render_table(header, rows)).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn parses_header_and_rows_with_bom() {
        let table = Table::parse("\u{feff}科目ID,科目名,単位数\r\n1,微積分Ⅰ,2\r\n2,統計学,2\r\n").unwrap();

        assert_eq!(table.header(), &["科目ID", "科目名", "単位数"]);
        assert_eq!(table.len(), 2);
        let names: Vec<&str> = table.rows().map(|row| row.get(Some(1))).collect();
        assert_eq!(names, vec!["微積分Ⅰ", "統計学"]);
    }

    #[test]
    fn quoted_fields_keep_commas_quotes_and_newlines() {
        let table = Table::parse("name,note\n\"a, b\",\"say \"\"hi\"\"\nthere\"\n").unwrap();
        let row = table.rows().next().unwrap();

        assert_eq!(row.get(Some(0)), "a, b");
        assert_eq!(row.get(Some(1)), "say \"hi\"\nthere");
    }

    #[test]
    fn blank_lines_and_short_rows() {
        let table = Table::parse("a,b,c\n\n1\n\n2,3\n").unwrap();

        assert_eq!(table.len(), 2);
        let first = table.rows().next().unwrap();
        assert_eq!(first.get(Some(0)), "1");
        assert_eq!(first.get(Some(2)), "");
        assert_eq!(first.get(None), "");
    }

    #[test]
    fn trailing_garbage_after_quote_is_rejected() {
        let err = Table::parse("a,b\n1,\"x\"y\n").unwrap_err();
        assert!(matches!(err, TableError::Parse { line: 2, .. }), "got {err:?}");
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = Table::parse("").unwrap();
        assert!(table.header().is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn read_reports_missing_file() {
        let tmp = TempDir::new().expect("temp dir");
        let err = Table::read(tmp.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, TableError::NotFound(_)));
    }

    #[test]
    fn write_then_read_preserves_awkward_cells() {
        let tmp = TempDir::new().expect("temp dir");
        let path = tmp.path().join("nested").join("out.csv");

        write_table(
            &path,
            &["id", "name"],
            vec![vec!["1".to_string(), "Data, \"Structures\"".to_string()]],
        )
        .unwrap();

        let table = Table::read(&path).unwrap();
        assert_eq!(table.column("name"), Some(1));
        assert_eq!(
            table.rows().next().unwrap().get(Some(1)),
            "Data, \"Structures\""
        );
    }
}
