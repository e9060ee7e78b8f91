use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::prelude::*;

/// One data line of the `ps` output, keyed by the column names of the header
pub type Record = BTreeMap<String, String>;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

#[derive(Debug)]
enum ParserState {
    AwaitingHeader,
    ReadingRows { header: Vec<String> },
    /// Terminal, every later line is rejected with the same error
    Failed { error: PsTreeError },
}

/// Parser for the tabular output of `ps`.
///
/// Expects whitespace-trimmed, non-empty lines (see [`crate::exec::non_empty_lines`]).
/// The first line is the column header, each following line must split into
/// exactly as many fields, the last field keeping any embedded whitespace.
#[derive(Debug)]
pub struct PsParser {
    state: ParserState,
    records: Vec<Record>,
}

impl Default for PsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PsParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitingHeader,
            records: Vec::with_capacity(100),
        }
    }

    /// Consumes one line. After the first error the parser stays failed and
    /// returns that error again for every line.
    pub fn feed(&mut self, line: &str) -> PsTreeResult<()> {
        trace!("ps: {line}");

        let result = self.consume(line);
        if let Err(error) = &result {
            self.state = ParserState::Failed {
                error: error.clone(),
            };
        }
        result
    }

    fn consume(&mut self, line: &str) -> PsTreeResult<()> {
        match &self.state {
            ParserState::AwaitingHeader => {
                let header: Vec<String> = line.split_whitespace().map(str::to_string).collect();
                // `ps` prints at least PID and PPID
                if header.len() < 2 {
                    return Err(PsTreeError::Header(header.join(" ")));
                }
                self.state = ParserState::ReadingRows { header };
            }
            ParserState::ReadingRows { header } => {
                let fields: Vec<&str> = WHITESPACE.splitn(line, header.len()).collect();

                if fields.len() != header.len() {
                    return Err(PsTreeError::RowShape {
                        found: fields.len(),
                        expected: header.len(),
                        line: fields.join(" "),
                    });
                }

                let record = header
                    .iter()
                    .cloned()
                    .zip(fields.into_iter().map(str::to_string))
                    .collect();
                self.records.push(record);
            }
            ParserState::Failed { error } => return Err(error.clone()),
        }

        Ok(())
    }

    /// Column names of the header, once it has been read
    pub fn header(&self) -> Option<&[String]> {
        match &self.state {
            ParserState::ReadingRows { header } => Some(header),
            ParserState::AwaitingHeader | ParserState::Failed { .. } => None,
        }
    }

    /// Returns the records read. An input without any data line yields an
    /// empty list, a failed parser its error.
    pub fn finish(self) -> PsTreeResult<Vec<Record>> {
        match self.state {
            ParserState::Failed { error } => Err(error),
            _ => Ok(self.records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(lines: &[&str]) -> PsTreeResult<Vec<Record>> {
        let mut parser = PsParser::new();
        for line in lines {
            parser.feed(line)?;
        }
        parser.finish()
    }

    #[test]
    fn test_parse_single_row() {
        let records = parse(&["PID PPID %CPU %MEM CMD", "1 0 0.1 0.2 /sbin/init"]).unwrap();
        insta::assert_debug_snapshot!(records, @r###"
        [
            {
                "%CPU": "0.1",
                "%MEM": "0.2",
                "CMD": "/sbin/init",
                "PID": "1",
                "PPID": "0",
            },
        ]
        "###);
    }

    #[test]
    fn test_last_field_keeps_whitespace() {
        let records = parse(&[
            "PID   PPID CMD",
            "2245  2233 /usr/bin/python3 -m http.server  8080",
        ])
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["CMD"], "/usr/bin/python3 -m http.server  8080");
        assert_eq!(records[0]["PPID"], "2233");
    }

    #[test]
    fn test_header_only() {
        let mut parser = PsParser::new();
        assert!(parser.header().is_none());
        parser.feed("PID PPID CMD").unwrap();
        assert_eq!(parser.header().unwrap(), ["PID", "PPID", "CMD"]);
        assert!(parser.finish().unwrap().is_empty());
    }

    #[test]
    fn test_short_header() {
        assert_eq!(
            parse(&["PID", "1"]).unwrap_err(),
            PsTreeError::Header("PID".to_string())
        );
    }

    #[test]
    fn test_missing_columns() {
        let err = parse(&["PID PPID %CPU CMD", "1 0 0.1 /sbin/init", "2 0 0.0"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Invalid number of columns (3 instead of 4): "2 0 0.0""#
        );
    }

    #[test]
    fn test_record_count() {
        let data = include_str!("testdata/valid-data");
        let lines: Vec<&str> = data.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

        let records = parse(&lines).unwrap();
        assert_eq!(records.len(), lines.len() - 1);

        let width = lines[0].split_whitespace().count();
        assert!(records.iter().all(|r| r.len() == width));
    }

    #[test]
    fn test_failed_parser_rejects_later_lines() {
        let mut parser = PsParser::new();
        parser.feed("PID PPID CMD").unwrap();
        parser.feed("1 0 init").unwrap();

        let expected = PsTreeError::RowShape {
            found: 2,
            expected: 3,
            line: "2 0".to_string(),
        };
        assert_eq!(parser.feed("2 0"), Err(expected.clone()));
        assert_eq!(parser.feed("3 1 bash"), Err(expected.clone()));
        assert!(parser.header().is_none());
        assert_eq!(parser.finish(), Err(expected));
    }

    #[test]
    fn test_failed_header_is_terminal() {
        let mut parser = PsParser::new();
        let expected = PsTreeError::Header("PID".to_string());
        assert_eq!(parser.feed("PID"), Err(expected.clone()));
        assert_eq!(parser.feed("PID PPID CMD"), Err(expected.clone()));
        assert_eq!(parser.finish(), Err(expected));
    }
}
