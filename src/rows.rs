//! Row source – lazily reads CSV records from any [`Read`] implementation.
//!
//! Records are read with the `csv` crate using RFC 4180 quoting. The first
//! record is treated as data (it becomes the table's header row) and every
//! later record must have the same number of fields.

use std::io::{self, Read};

use csv::{ReaderBuilder, StringRecord};

use crate::error::{Error, Result};
use crate::table::TableRow;

/// Where the quote scanner is within the current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    RecordStart,
    FieldStart,
    Unquoted,
    Quoted,
    /// A `"` inside a quoted field: either the closing quote or the first
    /// half of a `""` escape.
    QuoteInQuoted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QuoteError {
    /// Zero-based index of the offending record.
    record: u64,
    /// Line the offending record starts on.
    line: u64,
    message: &'static str,
}

/// Byte reader that checks RFC 4180 quoting as the input passes through.
///
/// The `csv` parser is lenient about quotes: it accepts an unterminated
/// quoted field at end of input and a bare `"` inside an unquoted field.
/// Both are rejected here. Records are counted the way the parser counts
/// them (blank lines skipped), so an error can be matched to the record the
/// parser yields for it.
struct QuoteCheck<R> {
    inner: R,
    state: FieldState,
    line: u64,
    record: u64,
    record_line: u64,
    error: Option<QuoteError>,
}

impl<R> QuoteCheck<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            state: FieldState::RecordStart,
            line: 1,
            record: 0,
            record_line: 1,
            error: None,
        }
    }

    fn scan(&mut self, byte: u8) {
        use FieldState::*;

        if self.error.is_some() {
            return;
        }
        if self.state == RecordStart && !matches!(byte, b'\r' | b'\n') {
            self.record_line = self.line;
            self.state = FieldStart;
        }
        self.state = match (self.state, byte) {
            (RecordStart, _) => RecordStart,
            (FieldStart, b'"') => Quoted,
            (FieldStart | Unquoted | QuoteInQuoted, b',') => FieldStart,
            (FieldStart | Unquoted | QuoteInQuoted, b'\r' | b'\n') => {
                self.record += 1;
                RecordStart
            }
            (Unquoted, b'"') => return self.fail("bare \" in non-quoted-field"),
            (FieldStart | Unquoted, _) => Unquoted,
            (Quoted, b'"') => QuoteInQuoted,
            (Quoted, _) => Quoted,
            (QuoteInQuoted, b'"') => Quoted,
            (QuoteInQuoted, _) => return self.fail("extraneous or missing \" in quoted-field"),
        };
        if byte == b'\n' {
            self.line += 1;
        }
    }

    fn finish(&mut self) {
        if self.error.is_none() && self.state == FieldState::Quoted {
            self.fail("extraneous or missing \" in quoted-field");
        }
    }

    fn fail(&mut self, message: &'static str) {
        self.error = Some(QuoteError {
            record: self.record,
            line: self.record_line,
            message,
        });
    }
}

impl<R: Read> Read for QuoteCheck<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.finish();
        }
        for &b in &buf[..n] {
            self.scan(b);
        }
        Ok(n)
    }
}

/// A finite, non-restartable sequence of [`TableRow`]s.
///
/// Yields `Err(Error::MalformedRow)` once for a structurally invalid record
/// and then stops. End of input is signalled by `None`.
pub struct RowSource<R: Read> {
    reader: csv::Reader<QuoteCheck<R>>,
    record: StringRecord,
    yielded: u64,
    finished: bool,
}

impl<R: Read> RowSource<R> {
    pub fn new(input: R) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(false)
            .from_reader(QuoteCheck::new(input));
        Self {
            reader,
            record: StringRecord::new(),
            yielded: 0,
            finished: false,
        }
    }

    /// Quote error in record `index` or an earlier one.
    ///
    /// The parser has read a record to its end before yielding it, so the
    /// scanner has always seen that record's bytes by now.
    fn quote_error(&self, index: u64) -> Option<Error> {
        let err = self.reader.get_ref().error.as_ref()?;
        (err.record <= index).then(|| Error::MalformedRow {
            line: err.line,
            message: err.message.to_string(),
        })
    }
}

impl<'a> RowSource<&'a [u8]> {
    /// Row source over an in-memory CSV string.
    pub fn from_text(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl<R: Read> Iterator for RowSource<R> {
    type Item = Result<TableRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let index = self.yielded;
        let item = match self.reader.read_record(&mut self.record) {
            Ok(true) => match self.quote_error(index) {
                Some(err) => Err(err),
                None => Ok(self.record.iter().map(str::to_string).collect()),
            },
            Ok(false) => {
                self.finished = true;
                return self.quote_error(u64::MAX).map(Err);
            }
            // A quoting fault explains the record better than, say, the
            // field count the parser tripped over.
            Err(err) => Err(self.quote_error(index).unwrap_or_else(|| Error::from(err))),
        };
        self.yielded += 1;
        if item.is_err() {
            self.finished = true;
        }
        Some(item)
    }
}

/// Read every record from `input`, stopping at the first malformed one.
pub fn read_rows<R: Read>(input: R) -> Result<Vec<TableRow>> {
    RowSource::new(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_records_in_order() {
        let rows = read_rows("Name,Address\nJohn,Main St\n".as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["Name".to_string(), "Address".to_string()],
                vec!["John".to_string(), "Main St".to_string()],
            ]
        );
    }

    #[test]
    fn quoted_fields_keep_commas_and_escaped_quotes() {
        let rows = read_rows(r#""Doe, John","say ""hi""""#.as_bytes()).unwrap();
        assert_eq!(rows[0], vec!["Doe, John".to_string(), r#"say "hi""#.to_string()]);
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let err = read_rows(r#"""#.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MalformedRow { .. }), "got {err:?}");
    }

    #[test]
    fn unterminated_quote_reports_the_record_line() {
        let mut source = RowSource::from_text("a,b\n\"c,d\ne,f\n");
        assert!(source.next().unwrap().is_ok());
        match source.next().unwrap() {
            Err(Error::MalformedRow { line, message }) => {
                assert_eq!(line, 2);
                assert!(message.contains("quoted-field"), "{message}");
            }
            other => panic!("expected MalformedRow, got {other:?}"),
        }
        assert!(source.next().is_none());
    }

    #[test]
    fn bare_quote_in_unquoted_field_is_malformed() {
        let mut source = RowSource::from_text("a,b\nd,e\"\"f\ng,h\n");
        assert_eq!(source.next().unwrap().unwrap(), vec!["a".to_string(), "b".to_string()]);
        match source.next().unwrap() {
            Err(Error::MalformedRow { line, message }) => {
                assert_eq!(line, 2);
                assert!(message.contains("bare"), "{message}");
            }
            other => panic!("expected MalformedRow, got {other:?}"),
        }
        assert!(source.next().is_none());
    }

    #[test]
    fn text_after_closing_quote_is_malformed() {
        let err = read_rows("x\n\n\"a\"b\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MalformedRow { line: 3, .. }), "got {err:?}");
    }

    #[test]
    fn quoted_newlines_and_crlf_are_accepted() {
        let rows = read_rows("\"one\ntwo\",x\r\ny,z\r\n".as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "one\ntwo");
    }

    #[test]
    fn unequal_field_count_is_malformed() {
        let err = read_rows("a,b\nc\n".as_bytes()).unwrap_err();
        match err {
            Error::MalformedRow { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("expected 2"), "{message}");
            }
            other => panic!("expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn stops_after_first_error() {
        let mut source = RowSource::from_text("a,b\nc\nd,e\n");
        assert!(source.next().unwrap().is_ok());
        assert!(source.next().unwrap().is_err());
        assert!(source.next().is_none());
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(RowSource::from_text("").next().is_none());
    }
}
