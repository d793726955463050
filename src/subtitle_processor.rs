use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::debug;

use crate::errors::FormatError;
use crate::file_utils::FileManager;

// @module: Caption file parsing and serialization

// @const: Only extension the parser accepts
pub const SUBTITLE_EXTENSION: &str = "srt";

// @const: Separator between start and end timecodes
const TIMECODE_SEPARATOR: &str = "-->";

// @struct: Single timed caption unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    // @field: 1-based position in the document
    pub index: usize,

    // @field: Opaque start timecode
    pub start_time: String,

    // @field: Opaque end timecode
    pub end_time: String,

    // @field: Spoken text, possibly multi-line
    pub text: String,
}

impl Cue {
    pub fn new(index: usize, start_time: impl Into<String>, end_time: impl Into<String>, text: impl Into<String>) -> Self {
        Cue {
            index,
            start_time: start_time.into().trim().to_string(),
            end_time: end_time.into().trim().to_string(),
            text: normalize_text(&text.into()),
        }
    }

    /// Replace the text, normalised so it cannot end the cue early
    pub fn set_text(&mut self, text: &str) {
        self.text = normalize_text(text);
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{} {} {}", self.start_time, TIMECODE_SEPARATOR, self.end_time)?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Parser states, one per kind of line the scanner is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Before the first cue, nothing to accumulate yet
    ExpectIndex,
    /// An index line was seen, a timecode line must follow
    ExpectTimestamp,
    /// Timecodes were seen, text lines are collected
    AccumulateText,
}

/// Classification of one physical (trimmed) line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// Equals the next expected cue index
    Index,
    /// Contains the timecode separator
    Timestamp(&'a str),
    /// Any other non-empty line
    Text(&'a str),
    /// Empty after trimming
    Blank,
}

/// What the parser does with a classified line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseAction {
    /// Commit the pending cue (if any) and open the next one
    StartCue,
    /// Split the line into start and end timecodes and clear the text buffer
    SetTimes,
    /// Append the line to the text buffer
    AppendText,
    /// Nothing to do
    Ignore,
}

impl<'a> LineKind<'a> {
    // @classifies: Trimmed line against the next expected index
    pub fn classify(line: &'a str, next_index: usize) -> Self {
        if line.is_empty() {
            LineKind::Blank
        } else if line.parse::<usize>().is_ok_and(|n| n == next_index) {
            LineKind::Index
        } else if line.contains(TIMECODE_SEPARATOR) {
            LineKind::Timestamp(line)
        } else {
            LineKind::Text(line)
        }
    }
}

/// Transition table of the caption parser
pub fn transition(state: ParseState, line: &LineKind) -> (ParseState, ParseAction) {
    use ParseAction::*;
    use ParseState::*;

    match (state, line) {
        (_, LineKind::Index) => (ExpectTimestamp, StartCue),
        (ExpectIndex, LineKind::Timestamp(_)) => (ExpectIndex, Ignore),
        (ExpectTimestamp | AccumulateText, LineKind::Timestamp(_)) => (AccumulateText, SetTimes),
        (AccumulateText, LineKind::Text(_)) => (AccumulateText, AppendText),
        (ExpectIndex | ExpectTimestamp, LineKind::Text(_)) => (state, Ignore),
        (_, LineKind::Blank) => (state, Ignore),
    }
}

// @struct: Cue under construction
#[derive(Debug, Default)]
struct PendingCue {
    index: usize,
    times: Option<(String, String)>,
    text: String,
}

impl PendingCue {
    fn new(index: usize) -> Self {
        PendingCue { index, ..Default::default() }
    }

    fn into_cue(self) -> Result<Cue, FormatError> {
        match self.times {
            Some((start, end)) => Ok(Cue::new(self.index, start, end, self.text)),
            None => Err(FormatError::MissingTimestamp { index: self.index }),
        }
    }
}

/// Trim every line and drop the empty ones; a blank line would end the cue
pub fn normalize_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_timecodes(line: &str, line_number: usize) -> Result<(String, String), FormatError> {
    let malformed = || FormatError::MalformedTimestamp {
        line: line_number,
        content: line.to_string(),
    };

    let (start, end) = line.split_once(TIMECODE_SEPARATOR).ok_or_else(malformed)?;
    let (start, end) = (start.trim(), end.trim());
    if start.is_empty() || end.is_empty() || end.contains(TIMECODE_SEPARATOR) {
        return Err(malformed());
    }

    Ok((start.to_string(), end.to_string()))
}

/// Ordered caption cues read from one subtitle file
#[derive(Debug, Clone)]
pub struct CaptionDocument {
    /// Source filename
    pub source_file: PathBuf,

    /// Cues in document order
    pub cues: Vec<Cue>,
}

impl CaptionDocument {
    /// Create an empty document for the given source file
    pub fn new(source_file: PathBuf) -> Self {
        CaptionDocument {
            source_file,
            cues: Vec::new(),
        }
    }

    /// Read and parse a caption file
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        let path = path.as_ref();

        if !FileManager::file_exists(path) {
            return Err(FormatError::NotAFile(path.to_path_buf()));
        }

        let has_extension = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(SUBTITLE_EXTENSION));
        if !has_extension {
            return Err(FormatError::UnsupportedExtension(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| FormatError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Parsing {}", path.display());
        let document = Self::parse_str(&content, path.to_path_buf())?;
        debug!("Finished parsing {} lines.", document.len());

        Ok(document)
    }

    /// Parse caption text that is already in memory
    pub fn parse_str(content: &str, source_file: PathBuf) -> Result<Self, FormatError> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        let mut cues = Vec::new();
        let mut state = ParseState::ExpectIndex;
        let mut pending: Option<PendingCue> = None;
        let mut next_index = 1;

        for (line_number, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            let kind = LineKind::classify(line, next_index);
            let (next_state, action) = transition(state, &kind);

            match action {
                ParseAction::StartCue => {
                    if let Some(cue) = pending.take() {
                        cues.push(cue.into_cue()?);
                    }
                    pending = Some(PendingCue::new(next_index));
                    next_index += 1;
                }
                ParseAction::SetTimes => {
                    if let Some(cue) = pending.as_mut() {
                        cue.times = Some(split_timecodes(line, line_number + 1)?);
                        cue.text.clear();
                    }
                }
                ParseAction::AppendText => {
                    if let Some(cue) = pending.as_mut() {
                        cue.text.push('\n');
                        cue.text.push_str(line);
                        cue.text = cue.text.trim().to_string();
                    }
                }
                ParseAction::Ignore => {
                    if let LineKind::Text(text) = kind {
                        debug!("Ignoring stray line {} while in {:?}: {}", line_number + 1, state, text);
                    }
                }
            }

            state = next_state;
        }

        // The final block has no following index line to commit it
        if let Some(cue) = pending.take() {
            cues.push(cue.into_cue()?);
        }

        if cues.is_empty() && !content.trim().is_empty() {
            return Err(FormatError::NoCues(source_file));
        }

        Ok(CaptionDocument { source_file, cues })
    }

    /// Render the document back into caption text
    pub fn serialize(&self) -> String {
        self.cues.iter().map(|cue| cue.to_string()).collect()
    }

    /// Write the serialized document, creating parent directories as needed
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        FileManager::write_to_file(path, &self.serialize())
            .with_context(|| format!("Failed to write subtitle file: {}", path.display()))
    }

    /// File name without directory and extension
    pub fn file_stem(&self) -> String {
        self.source_file
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string())
    }

    /// Name of the translated file: `<stem>.<country>.<language>.srt`
    pub fn output_file_name(&self, country_code: &str, language_code: &str) -> String {
        format!(
            "{}.{}.{}.{}",
            self.file_stem(),
            country_code.trim().to_lowercase(),
            language_code.trim().to_lowercase(),
            SUBTITLE_EXTENSION
        )
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}

impl fmt::Display for CaptionDocument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Caption Document")?;
        writeln!(f, "Source: {:?}", self.source_file)?;
        writeln!(f, "Cues: {}", self.cues.len())?;
        Ok(())
    }
}
