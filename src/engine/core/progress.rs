//! Parsing of FFmpeg's stderr stream.
//!
//! FFmpeg prints its periodic stats line terminated by `\r` and everything
//! else terminated by `\n`, so lines are split on either byte.

use std::io::{self, BufRead, BufReader, Read};

/// Progress derived from the latest stats line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub frame: Option<u64>,
    pub out_time_s: f64,
    /// Encoding speed multiplier (`speed=1.25x`)
    pub speed: Option<f64>,
    /// Fraction of the source duration processed, in [0, 1]
    pub fraction: f32,
    pub eta_s: Option<f64>,
}

/// Parser for FFmpeg stats lines (`frame= 120 fps= 24 ... time=00:00:05.00 ... speed=1.2x`)
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    duration_s: Option<f64>,
    snapshot: ProgressSnapshot,
    log: String,
}

impl ProgressParser {
    /// `duration_s` is the source duration, used for fraction and ETA
    pub fn new(duration_s: Option<f64>) -> Self {
        Self {
            duration_s: duration_s.filter(|d| d.is_finite() && *d > 0.0),
            ..Self::default()
        }
    }

    /// Parse one line. Returns true when it updated the progress fields;
    /// anything else is kept verbatim in the log buffer.
    pub fn parse_line(&mut self, line: &str) -> bool {
        let Some(out_time_s) = token(line, "time=").and_then(parse_timestamp) else {
            if !line.trim().is_empty() {
                self.log.push_str(line);
                self.log.push('\n');
            }
            return false;
        };

        let speed = token(line, "speed=")
            .map(|s| s.trim_end_matches('x'))
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|s| s.is_finite() && *s >= 0.0);

        self.snapshot.out_time_s = out_time_s;
        self.snapshot.speed = speed;
        if let Some(frame) = token(line, "frame=").and_then(|f| f.parse::<u64>().ok()) {
            self.snapshot.frame = Some(frame);
        }

        if let Some(duration) = self.duration_s {
            self.snapshot.fraction = (out_time_s / duration).clamp(0.0, 1.0) as f32;
            self.snapshot.eta_s = speed
                .filter(|s| *s > 0.0)
                .map(|s| (duration - out_time_s).max(0.0) / s);
        }

        true
    }

    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.snapshot
    }

    /// Accumulated non-stats output
    pub fn log(&self) -> &str {
        &self.log
    }

    pub fn into_log(self) -> String {
        self.log
    }
}

/// Value following `key`, with FFmpeg's padding spaces skipped (`fps=  24`)
fn token<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = line[start..].trim_start();
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let value = &rest[..end];
    (!value.is_empty()).then_some(value)
}

/// `HH:MM:SS.ss` (hours may exceed 24, a leading `-` is clamped to zero)
pub fn parse_timestamp(s: &str) -> Option<f64> {
    let mut parts = s.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let total = hours.abs() * 3600.0 + minutes * 60.0 + seconds;
    if !total.is_finite() {
        return None;
    }
    Some(if s.starts_with('-') { 0.0 } else { total })
}

/// Splits a byte stream on `\r` or `\n`, decoding lossily.
///
/// Read errors end the iteration the same way EOF does.
pub struct DiagnosticLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> DiagnosticLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    if buf.is_empty() {
        return None;
    }
    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    Some(line)
}

impl<R: BufRead> Iterator for DiagnosticLines<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let available = match self.reader.fill_buf() {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return take_line(&mut self.buf),
            };
            if available.is_empty() {
                return take_line(&mut self.buf);
            }

            match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(pos) => {
                    self.buf.extend_from_slice(&available[..pos]);
                    self.reader.consume(pos + 1);
                    return Some(take_line(&mut self.buf).unwrap_or_default());
                }
                None => {
                    let len = available.len();
                    self.buf.extend_from_slice(available);
                    self.reader.consume(len);
                }
            }
        }
    }
}

/// Drain the engine's diagnostic stream until it closes.
///
/// `on_progress` fires after every recognised stats line. The accumulated
/// log buffer is returned once the stream ends.
pub fn pump_diagnostics<R, F>(stream: R, duration_s: Option<f64>, mut on_progress: F) -> String
where
    R: Read,
    F: FnMut(&ProgressSnapshot),
{
    let mut parser = ProgressParser::new(duration_s);
    for line in DiagnosticLines::new(BufReader::new(stream)) {
        if parser.parse_line(&line) {
            on_progress(parser.snapshot());
        }
    }
    parser.into_log()
}
