use super::FormatError;

/// Strict forward-only reader over the lines of a recording file.
pub(super) struct SectionReader<'a> {
    lines: Vec<&'a str>,
    position: usize,
}

impl<'a> SectionReader<'a> {
    pub(super) fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            position: 0,
        }
    }

    /// 1-based number of the line that would be read next.
    fn line_number(&self) -> usize {
        self.position + 1
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.position).copied()
    }

    pub(super) fn expect_marker(&mut self, marker: &str) -> Result<(), FormatError> {
        match self.peek() {
            Some(line) if line == marker => {
                self.position += 1;
                Ok(())
            }
            Some(line) => Err(FormatError::UnexpectedLine {
                line: self.line_number(),
                expected: marker.to_string(),
                found: line.to_string(),
            }),
            None => Err(FormatError::UnexpectedEof {
                line: self.line_number(),
                expected: marker.to_string(),
            }),
        }
    }

    /// Next line as a single value, returned with its line number.
    pub(super) fn value(&mut self, what: &str) -> Result<(usize, &'a str), FormatError> {
        let line = self.line_number();
        match self.peek() {
            Some(text) => {
                self.position += 1;
                Ok((line, text))
            }
            None => Err(FormatError::UnexpectedEof {
                line,
                expected: what.to_string(),
            }),
        }
    }

    /// Next line unless it is blank or the end of the file.
    pub(super) fn optional_value(&mut self) -> Option<(usize, &'a str)> {
        let line = self.line_number();
        let text = self.peek().filter(|t| !t.trim().is_empty())?;
        self.position += 1;
        Some((line, text))
    }

    /// `name=value` entries up to (not including) `until`, or to the end of
    /// the file when `until` is `None`. Entries split at the first `=`.
    pub(super) fn entries(
        &mut self,
        until: Option<&str>,
    ) -> Result<Vec<(usize, &'a str, &'a str)>, FormatError> {
        let mut entries = Vec::new();
        while let Some(text) = self.peek() {
            if Some(text) == until {
                break;
            }
            if until.is_none() && self.rest_is_blank() {
                break;
            }
            let Some((name, value)) = text.split_once('=') else {
                return Err(FormatError::UnexpectedLine {
                    line: self.line_number(),
                    expected: match until {
                        Some(marker) => format!("name=value or {marker}"),
                        None => "name=value".to_string(),
                    },
                    found: text.to_string(),
                });
            };
            entries.push((self.line_number(), name, value));
            self.position += 1;
        }
        Ok(entries)
    }

    /// Fail on anything but blank lines after the last section.
    pub(super) fn finish(&self) -> Result<(), FormatError> {
        if self.rest_is_blank() {
            return Ok(());
        }
        let offset = self.lines[self.position..]
            .iter()
            .position(|l| !l.trim().is_empty())
            .unwrap_or(0);
        Err(FormatError::UnexpectedLine {
            line: self.line_number() + offset,
            expected: "end of file".to_string(),
            found: self.lines[self.position + offset].to_string(),
        })
    }

    fn rest_is_blank(&self) -> bool {
        self.lines[self.position..]
            .iter()
            .all(|l| l.trim().is_empty())
    }
}
