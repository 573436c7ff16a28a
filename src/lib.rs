//! Applies unified-diff-style patches to text documents.
//!
//! `dpatch` parses a subset of the unified diff format and applies it to a
//! document held in memory, returning the patched text. It ships two engine
//! presets built on the *same* cursor-walk algorithm:
//!
//! - **strict** ([`apply_strict`]): every context line must match the original
//!   exactly and a target filename must be derivable. This is the right mode
//!   for brand-new-file diffs and for callers that want to detect any drift.
//! - **smart** ([`apply_smart`]): context lines are compared with a fuzzy
//!   similarity ratio, absorbing minor drift (whitespace, small typos) between
//!   the diff's recorded context and the actual source. This is the forgiving
//!   mode for patches produced against a slightly older version of the file,
//!   a common scenario with AI-generated diffs.
//!
//! Mismatches never abort the operation: each one is recorded as a
//! [`Warning`], the diff's content is applied verbatim, and the result is
//! classified as [`PatchStatus::Warning`] instead of failing outright.
//!
//! ## Getting Started
//!
//! ```rust
//! use dpatch::{apply_smart, PatchStatus};
//!
//! let original = "fn main() {\n    println!(\"Hello, world!\");\n}\n";
//! let diff = "\
//! --- a/src/main.rs
//! +++ b/src/main.rs
//! @@ -1,3 +1,3 @@
//!  fn main() {
//! -    println!(\"Hello, world!\");
//! +    println!(\"Hello, dpatch!\");
//!  }
//! ";
//!
//! let result = apply_smart(diff, Some(original), None);
//! assert_eq!(result.status, PatchStatus::Success);
//! assert!(result.warnings.is_empty());
//! assert_eq!(
//!     result.output.as_deref(),
//!     Some("fn main() {\n    println!(\"Hello, dpatch!\");\n}\n")
//! );
//! assert_eq!(result.filename.as_deref(), Some("src/main.rs"));
//! ```
//!
//! Creating a new file with the strict engine (no original content):
//!
//! ```rust
//! use dpatch::{apply_strict, PatchStatus};
//!
//! let diff = "+++ b/notes.txt\n@@ -0,0 +1,2 @@\n+one\n+two\n";
//! let result = apply_strict(diff, None);
//!
//! assert_eq!(result.status, PatchStatus::Success);
//! assert_eq!(result.output.as_deref(), Some("one\ntwo\n"));
//! assert_eq!(result.filename.as_deref(), Some("notes.txt"));
//! ```
//!
//! ## Key Concepts
//!
//! Patching is a two-step pipeline:
//!
//! 1. **Parsing**: [`parse_diff`] turns raw diff text into a [`ParsedDiff`] —
//!    an optional target filename plus an ordered list of [`Hunk`]s. Hunks
//!    whose `@@` header is malformed are not fatal; they are recorded as
//!    [`RejectedHunk`]s and surfaced as warnings by the engine.
//! 2. **Applying**: [`apply_hunks`] (or a [`HunkApplier`] for step-by-step
//!    control) walks a single cursor through the original lines, reconciling
//!    each hunk's context, addition, and removal lines against the document.
//!    The cursor never moves backwards, hunks are processed strictly in parse
//!    order, and any leftover original lines are flushed exactly once after
//!    the last hunk.
//!
//! The line-equivalence policy is pluggable through the [`LineMatcher`] trait:
//! [`ExactMatcher`] for the strict engine, [`FuzzyMatcher`] for the smart one.
//! [`apply_patch`] ties the pipeline together, taking an explicit
//! [`PatchRequest`] and [`EngineOptions`] and returning a [`PatchResult`]
//! that is always a plain value — parse failures, missing filenames, and line
//! mismatches are all reported through it, never panicked or thrown.
//!
//! Each call is a pure function of its inputs. No state is shared between
//! calls, so concurrent invocations need no coordination; iterative editing
//! means feeding one call's `output` back in as the next call's original.
use log::{debug, info, trace, warn};
use similar::TextDiff;
use thiserror::Error;

/// The default similarity threshold used by the smart engine's fuzzy matcher.
///
/// Two non-empty lines are considered equivalent when their character-level
/// similarity ratio is at least this value.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;

/// The reporting name the smart engine substitutes when no filename is
/// supplied and none can be extracted from the diff.
pub const FALLBACK_FILENAME: &str = "untitled";

// --- Error Types ---

/// The fatal failure modes of a patch operation.
///
/// These are the only conditions that stop a request outright; line-level
/// mismatches and malformed hunk headers degrade to [`Warning`]s instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The diff text was empty (or whitespace-only) after trimming.
    #[error("empty diff content provided")]
    EmptyDiff,
    /// No filename was supplied by the caller and none could be extracted
    /// from a `+++ b/<path>` line. Only raised when the engine is configured
    /// with `require_filename` (the strict preset).
    #[error("no target filename found in diff or provided by caller")]
    MissingFilename,
}

// --- Data Structures ---

/// The role of a single line within a hunk body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineKind {
    /// A line expected to already exist in the original document (` ` marker).
    Context,
    /// A line to insert into the output (`+` marker).
    Addition,
    /// A line to consume from the original document (`-` marker).
    Removal,
}

/// One classified line of a hunk body: its kind plus the text after the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub text: String,
}

/// A single `@@ ... @@` block of a diff.
///
/// Line numbers are 1-based, exactly as they appear in the header. Omitted
/// counts default to 1. A hunk is immutable once parsed.
///
/// # Example
///
/// ```
/// # use dpatch::parse_diff;
/// let parsed = parse_diff("@@ -3 +3,2 @@\n context\n+added\n").unwrap();
/// let hunk = &parsed.hunks[0];
/// assert_eq!(hunk.original_start, 3);
/// assert_eq!(hunk.original_count, 1);
/// assert_eq!(hunk.modified_start, 3);
/// assert_eq!(hunk.modified_count, 2);
/// assert_eq!(hunk.lines.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// Starting line in the original document, from the `-` range.
    pub original_start: usize,
    /// Number of original lines the hunk spans, from the `-` range.
    pub original_count: usize,
    /// Starting line in the modified document, from the `+` range.
    pub modified_start: usize,
    /// Number of modified lines the hunk spans, from the `+` range.
    pub modified_count: usize,
    /// The classified body lines, in order.
    pub lines: Vec<DiffLine>,
}

/// A hunk whose `@@` header could not be parsed.
///
/// The parser records these instead of failing; the engine reports each one
/// as a warning and skips its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedHunk {
    /// The 1-based line number of the offending header in the diff text.
    pub line_number: usize,
    /// The raw header line.
    pub header: String,
}

/// The structured form of a diff: an optional target filename plus hunks in
/// the order they appeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDiff {
    /// The path from the first `+++ b/<path>` line, if any.
    pub target_filename: Option<String>,
    /// Successfully parsed hunks, in parse order.
    pub hunks: Vec<Hunk>,
    /// Hunks skipped because their header was malformed.
    pub rejected: Vec<RejectedHunk>,
}

/// A non-fatal problem encountered while applying a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

// --- Parsing ---

/// Parses unified-diff text into a [`ParsedDiff`].
///
/// Recognized input, line by line:
///
/// - `+++ b/<path>` records the target filename (first occurrence wins) and
///   belongs to no hunk.
/// - `@@ -<start>[,<count>] +<start>[,<count>] @@` opens a new hunk, closing
///   the previous one. Text after the closing `@@` is ignored. A header that
///   does not match this shape is recorded as a [`RejectedHunk`] and the
///   lines that follow it are discarded until the next valid header.
/// - While a hunk is open, lines starting with ` `, `+`, or `-` are
///   classified as context, addition, or removal. An empty line counts as an
///   empty context line. `\ No newline at end of file` markers are ignored.
/// - Everything before the first header (e.g. `--- a/<path>`) is discarded.
///
/// # Errors
///
/// Returns [`PatchError::EmptyDiff`] when the input is empty after trimming.
///
/// # Example
///
/// ```rust
/// use dpatch::{parse_diff, DiffLineKind};
///
/// let parsed = parse_diff(
///     "+++ b/hello.txt\n@@ -1 +1 @@\n-Hello, world!\n+Hello, dpatch!\n",
/// ).unwrap();
///
/// assert_eq!(parsed.target_filename.as_deref(), Some("hello.txt"));
/// assert_eq!(parsed.hunks.len(), 1);
/// assert_eq!(parsed.hunks[0].lines[0].kind, DiffLineKind::Removal);
/// assert_eq!(parsed.hunks[0].lines[1].text, "Hello, dpatch!");
/// ```
pub fn parse_diff(diff_text: &str) -> Result<ParsedDiff, PatchError> {
    if diff_text.trim().is_empty() {
        return Err(PatchError::EmptyDiff);
    }

    let mut target_filename: Option<String> = None;
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut rejected: Vec<RejectedHunk> = Vec::new();
    let mut current: Option<Hunk> = None;

    for (index, raw) in diff_text.lines().enumerate() {
        let line_number = index + 1;

        if let Some(path) = raw.strip_prefix("+++ b/") {
            if target_filename.is_none() {
                // Everything after the prefix is the filename, whitespace
                // included; `lines()` has already removed the terminator.
                trace!("line {}: target filename '{}'", line_number, path);
                target_filename = Some(path.to_string());
            }
            continue;
        }

        if raw.starts_with("@@") {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            match parse_hunk_header(raw) {
                Some((original_start, original_count, modified_start, modified_count)) => {
                    trace!(
                        "line {}: hunk header -{},{} +{},{}",
                        line_number,
                        original_start,
                        original_count,
                        modified_start,
                        modified_count
                    );
                    current = Some(Hunk {
                        original_start,
                        original_count,
                        modified_start,
                        modified_count,
                        lines: Vec::new(),
                    });
                }
                None => {
                    warn!(
                        "line {}: malformed hunk header '{}', skipping its hunk",
                        line_number, raw
                    );
                    rejected.push(RejectedHunk {
                        line_number,
                        header: raw.to_string(),
                    });
                }
            }
            continue;
        }

        if let Some(hunk) = current.as_mut() {
            if let Some(diff_line) = classify_diff_line(raw) {
                hunk.lines.push(diff_line);
            }
        }
    }

    if let Some(hunk) = current.take() {
        hunks.push(hunk);
    }

    debug!(
        "parsed {} hunk(s), {} rejected, target {:?}",
        hunks.len(),
        rejected.len(),
        target_filename
    );
    Ok(ParsedDiff {
        target_filename,
        hunks,
        rejected,
    })
}

/// Classifies one hunk body line by its leading marker.
///
/// Returns `None` for lines that carry no content: `\ No newline at end of
/// file` markers and anything else with an unrecognized marker.
fn classify_diff_line(raw: &str) -> Option<DiffLine> {
    if let Some(text) = raw.strip_prefix(' ') {
        Some(DiffLine {
            kind: DiffLineKind::Context,
            text: text.to_string(),
        })
    } else if let Some(text) = raw.strip_prefix('+') {
        Some(DiffLine {
            kind: DiffLineKind::Addition,
            text: text.to_string(),
        })
    } else if let Some(text) = raw.strip_prefix('-') {
        Some(DiffLine {
            kind: DiffLineKind::Removal,
            text: text.to_string(),
        })
    } else if raw.is_empty() {
        // Some diff producers emit truly empty lines for empty context lines.
        Some(DiffLine {
            kind: DiffLineKind::Context,
            text: String::new(),
        })
    } else {
        if !raw.starts_with('\\') {
            debug!("ignoring unclassifiable diff line: '{}'", raw);
        }
        None
    }
}

/// Parses a hunk header like `@@ -1,3 +1,3 @@`, returning
/// `(original_start, original_count, modified_start, modified_count)`.
/// Omitted counts default to 1; trailing text after the closing `@@` is
/// ignored.
fn parse_hunk_header(line: &str) -> Option<(usize, usize, usize, usize)> {
    let body = line.strip_prefix("@@ ")?;
    let end = body.find(" @@")?;
    let mut parts = body[..end].split(' ');
    let (original_start, original_count) = parse_line_range(parts.next()?, '-')?;
    let (modified_start, modified_count) = parse_line_range(parts.next()?, '+')?;
    if parts.next().is_some() {
        return None;
    }
    Some((original_start, original_count, modified_start, modified_count))
}

/// Parses one side of a hunk header range, e.g. `-12,3` or `+7`.
fn parse_line_range(part: &str, sign: char) -> Option<(usize, usize)> {
    let body = part.strip_prefix(sign)?;
    match body.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((body.parse().ok()?, 1)),
    }
}

// --- Line Matching ---

/// Decides whether a diff's expected line and an original line should be
/// treated as equivalent.
///
/// This is the seam that separates the strict and smart engines: the applier
/// is written once against this trait and the engine plugs in either
/// [`ExactMatcher`] or [`FuzzyMatcher`].
pub trait LineMatcher {
    /// Returns `true` when `actual` (a line of the original document)
    /// satisfies `expected` (a context line from the diff).
    fn matches(&self, expected: &str, actual: &str) -> bool;
}

/// Byte-for-byte line equality, modulo a trailing line terminator.
///
/// Interior and leading whitespace are significant; only a trailing `\n`,
/// `\r\n`, or `\r` is stripped before comparing.
///
/// # Example
///
/// ```
/// use dpatch::{ExactMatcher, LineMatcher};
///
/// assert!(ExactMatcher.matches("alpha\n", "alpha"));
/// assert!(!ExactMatcher.matches("alpha", " alpha"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl LineMatcher for ExactMatcher {
    fn matches(&self, expected: &str, actual: &str) -> bool {
        strip_line_terminator(expected) == strip_line_terminator(actual)
    }
}

fn strip_line_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Similarity-based line equivalence for the smart engine.
///
/// Both lines are trimmed of leading and trailing whitespace first. Two
/// trimmed-empty lines always match; an empty line never matches a non-empty
/// one. Otherwise the lines match when [`similarity_ratio`] meets the
/// configured threshold.
///
/// # Example
///
/// ```
/// use dpatch::{FuzzyMatcher, LineMatcher};
///
/// let matcher = FuzzyMatcher::default();
/// // Indentation drift is absorbed.
/// assert!(matcher.matches("let total = 0;", "  let total = 0;"));
/// // Unrelated lines are not.
/// assert!(!matcher.matches("let total = 0;", "return total;"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    threshold: f32,
}

impl FuzzyMatcher {
    /// Creates a matcher with the given similarity threshold (0.0 to 1.0).
    /// Higher is stricter.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// The configured similarity threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl LineMatcher for FuzzyMatcher {
    fn matches(&self, expected: &str, actual: &str) -> bool {
        let expected = expected.trim();
        let actual = actual.trim();
        match (expected.is_empty(), actual.is_empty()) {
            (true, true) => true,
            (true, false) | (false, true) => false,
            (false, false) => {
                let ratio = similarity_ratio(expected, actual);
                trace!(
                    "fuzzy compare '{}' vs '{}': ratio {:.3} (threshold {:.2})",
                    expected,
                    actual,
                    ratio,
                    self.threshold
                );
                ratio >= f64::from(self.threshold)
            }
        }
    }
}

/// The character-level similarity of two strings, in `[0.0, 1.0]`.
///
/// This is the classic sequence-matcher ratio `2*M / (len(a) + len(b))`,
/// where `M` is the number of characters covered by the longest common
/// subsequence alignment. It is symmetric in its arguments.
///
/// # Example
///
/// ```
/// use dpatch::similarity_ratio;
///
/// assert_eq!(similarity_ratio("abc", "abc"), 1.0);
/// assert_eq!(similarity_ratio("abc", "axc"), similarity_ratio("axc", "abc"));
/// ```
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    f64::from(TextDiff::from_chars(a, b).ratio())
}

// --- Hunk Application ---

/// Walks hunks against an original document one at a time.
///
/// The applier holds the single cursor shared by all hunks of a patch. For
/// each hunk it copies untouched original lines up to the hunk's recorded
/// start, then reconciles the hunk's body against the document:
///
/// - a *context* line that matches (per the [`LineMatcher`]) re-emits the
///   original line; one that does not match emits the diff's text verbatim,
///   records a warning, and still consumes the original line so later hunks
///   stay aligned;
/// - an *addition* emits its text without touching the cursor;
/// - a *removal* consumes the original line (even past the end of the
///   document), warning when the consumed line is not exactly equal to the
///   expected text (removal comparison is exact in both engines).
///
/// Remaining original lines are flushed only by [`finish`](Self::finish),
/// after the last hunk. The cursor never decreases.
///
/// Most callers want [`apply_hunks`]; use the applier directly to inspect
/// state between hunks.
///
/// # Example
///
/// ```rust
/// use dpatch::{parse_diff, ExactMatcher, HunkApplier};
///
/// let parsed = parse_diff("@@ -2 +2 @@\n-two\n+2\n").unwrap();
/// let original = vec!["one", "two", "three"];
/// let mut applier = HunkApplier::new(&original, &ExactMatcher);
///
/// for hunk in &parsed.hunks {
///     applier.apply_hunk(hunk);
/// }
/// assert_eq!(applier.cursor(), 2);
///
/// let (lines, warnings) = applier.finish();
/// assert_eq!(lines, vec!["one", "2", "three"]);
/// assert!(warnings.is_empty());
/// ```
pub struct HunkApplier<'a, T: AsRef<str>> {
    original: &'a [T],
    matcher: &'a dyn LineMatcher,
    cursor: usize,
    output: Vec<String>,
    warnings: Vec<Warning>,
}

impl<'a, T: AsRef<str>> HunkApplier<'a, T> {
    /// Creates an applier over the original document's lines.
    pub fn new(original: &'a [T], matcher: &'a dyn LineMatcher) -> Self {
        Self {
            original,
            matcher,
            cursor: 0,
            output: Vec::with_capacity(original.len()),
            warnings: Vec::new(),
        }
    }

    /// The index of the next unconsumed original line.
    ///
    /// May exceed the original's length when removal lines run past the end
    /// of the document; such removals are still counted as consumed.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The lines emitted so far.
    pub fn output_lines(&self) -> &[String] {
        &self.output
    }

    /// Warnings recorded so far.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Applies one hunk, advancing the cursor.
    pub fn apply_hunk(&mut self, hunk: &Hunk) {
        // Copy untouched lines up to the hunk's 0-indexed start.
        let target = hunk.original_start.saturating_sub(1);
        while self.cursor < target && self.cursor < self.original.len() {
            self.emit_original();
        }

        // `consumed` tracks original lines eaten within this hunk, so warning
        // messages can point near the right original line.
        let mut consumed = 0usize;
        for line in &hunk.lines {
            match line.kind {
                DiffLineKind::Context => {
                    let in_bounds = self.cursor < self.original.len();
                    if in_bounds
                        && self
                            .matcher
                            .matches(&line.text, self.original[self.cursor].as_ref())
                    {
                        self.emit_original();
                        consumed += 1;
                    } else {
                        self.warn(format!(
                            "context line mismatch near original line {}, diff content applied verbatim",
                            hunk.original_start + consumed
                        ));
                        self.output.push(line.text.clone());
                        // Consume the mismatched original line anyway so the
                        // cursor stays aligned for subsequent hunks.
                        if in_bounds {
                            self.cursor += 1;
                            consumed += 1;
                        }
                    }
                }
                DiffLineKind::Addition => {
                    self.output.push(line.text.clone());
                }
                DiffLineKind::Removal => {
                    if self.cursor < self.original.len() {
                        if self.original[self.cursor].as_ref() != line.text {
                            self.warn(format!(
                                "removal line mismatch near original line {}",
                                hunk.original_start + consumed
                            ));
                        }
                    } else {
                        trace!("removal past end of original: '{}'", line.text);
                    }
                    // The line is treated as consumed in all cases, even past
                    // the end of the original.
                    self.cursor += 1;
                    consumed += 1;
                }
            }
        }
    }

    /// Flushes the remaining original lines and returns the emitted output
    /// with any warnings.
    pub fn finish(mut self) -> (Vec<String>, Vec<Warning>) {
        while self.cursor < self.original.len() {
            self.emit_original();
        }
        (self.output, self.warnings)
    }

    fn emit_original(&mut self) {
        self.output.push(self.original[self.cursor].as_ref().to_string());
        self.cursor += 1;
    }

    fn warn(&mut self, message: String) {
        debug!("{}", message);
        self.warnings.push(Warning { message });
    }
}

/// Applies a sequence of hunks to an original document's lines.
///
/// Drives a [`HunkApplier`] to completion and returns the emitted lines plus
/// one [`Warning`] per mismatching line.
///
/// # Example
///
/// ```rust
/// use dpatch::{apply_hunks, parse_diff, ExactMatcher};
///
/// let parsed = parse_diff("@@ -1,2 +1,2 @@\n one\n-two\n+TWO\n").unwrap();
/// let original = vec!["one", "two"];
///
/// let (lines, warnings) = apply_hunks(&original, &parsed.hunks, &ExactMatcher);
/// assert_eq!(lines, vec!["one", "TWO"]);
/// assert!(warnings.is_empty());
/// ```
pub fn apply_hunks<T: AsRef<str>>(
    original: &[T],
    hunks: &[Hunk],
    matcher: &dyn LineMatcher,
) -> (Vec<String>, Vec<Warning>) {
    let mut applier = HunkApplier::new(original, matcher);
    for (index, hunk) in hunks.iter().enumerate() {
        trace!(
            "applying hunk {}/{} (original start {})",
            index + 1,
            hunks.len(),
            hunk.original_start
        );
        applier.apply_hunk(hunk);
    }
    applier.finish()
}

// --- Engine ---

/// The overall outcome of a patch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    /// Every hunk applied with no mismatches.
    Success,
    /// The patch applied, but at least one line mismatched or a hunk header
    /// was malformed; `output` is still valid.
    Warning,
    /// A fatal error; no output was produced.
    Error,
}

/// The inputs to one patch operation.
///
/// All per-request state lives here; the engine holds nothing between calls.
#[derive(Debug, Clone, Copy)]
pub struct PatchRequest<'a> {
    /// The unified diff text.
    pub diff_text: &'a str,
    /// The document the diff applies to. `None` means an empty document,
    /// which is the usual choice for new-file diffs.
    pub original_text: Option<&'a str>,
    /// An override for the reported filename. Takes precedence over the
    /// diff's `+++ b/<path>` target; reporting-only, never affects patching.
    pub filename: Option<&'a str>,
}

/// How context lines are compared against the original document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchPolicy {
    /// Byte-exact comparison ([`ExactMatcher`]).
    Exact,
    /// Similarity-ratio comparison ([`FuzzyMatcher`]) with the given
    /// threshold.
    Fuzzy { threshold: f32 },
}

/// Configuration for [`apply_patch`].
///
/// The strict and smart engines are the same algorithm under different
/// options; use the presets or construct options directly for a custom mix.
///
/// # Example
///
/// ```
/// use dpatch::{EngineOptions, MatchPolicy};
///
/// let strict = EngineOptions::strict();
/// assert_eq!(strict.match_policy, MatchPolicy::Exact);
/// assert!(strict.require_filename);
///
/// let smart = EngineOptions::smart();
/// assert!(!smart.require_filename);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    /// The context-line comparison policy.
    pub match_policy: MatchPolicy,
    /// When `true`, a request with no derivable filename fails with
    /// [`PatchError::MissingFilename`]; otherwise [`FALLBACK_FILENAME`] is
    /// substituted.
    pub require_filename: bool,
}

impl EngineOptions {
    /// The strict preset: exact matching, filename required.
    pub fn strict() -> Self {
        Self {
            match_policy: MatchPolicy::Exact,
            require_filename: true,
        }
    }

    /// The smart preset: fuzzy matching at [`DEFAULT_SIMILARITY_THRESHOLD`],
    /// fallback filename.
    pub fn smart() -> Self {
        Self {
            match_policy: MatchPolicy::Fuzzy {
                threshold: DEFAULT_SIMILARITY_THRESHOLD,
            },
            require_filename: false,
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::smart()
    }
}

/// The packaged outcome of a patch operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchResult {
    /// Success, Warning, or Error.
    pub status: PatchStatus,
    /// A human-readable summary of the outcome.
    pub message: String,
    /// The resolved reporting filename. `None` only when the operation
    /// failed before a name could be resolved.
    pub filename: Option<String>,
    /// One entry per rejected hunk header or mismatching line. Parse-stage
    /// warnings (rejected headers) come first in diff order, followed by
    /// application warnings in hunk order.
    pub warnings: Vec<Warning>,
    /// The patched text. Present whenever `status` is not `Error`.
    pub output: Option<String>,
}

impl PatchResult {
    /// `true` when the patch applied without any warnings.
    pub fn is_success(&self) -> bool {
        self.status == PatchStatus::Success
    }

    /// `true` when the operation failed fatally and produced no output.
    pub fn is_error(&self) -> bool {
        self.status == PatchStatus::Error
    }

    fn from_error(error: PatchError) -> Self {
        Self {
            status: PatchStatus::Error,
            message: error.to_string(),
            filename: None,
            warnings: Vec::new(),
            output: None,
        }
    }
}

/// Applies a diff to a document and packages the outcome.
///
/// This is the full pipeline: parse the diff, resolve the reporting
/// filename, apply the hunks with the configured matcher, and classify the
/// result. All failures come back inside the [`PatchResult`]; this function
/// never panics on malformed input.
///
/// # Example
///
/// A request with no filename anywhere fails under the strict preset:
///
/// ```rust
/// use dpatch::{apply_patch, EngineOptions, PatchRequest, PatchStatus};
///
/// let request = PatchRequest {
///     diff_text: "@@ -1 +1 @@\n-a\n+b\n",
///     original_text: None,
///     filename: None,
/// };
/// let result = apply_patch(&request, &EngineOptions::strict());
///
/// assert_eq!(result.status, PatchStatus::Error);
/// assert!(result.output.is_none());
/// ```
pub fn apply_patch(request: &PatchRequest<'_>, options: &EngineOptions) -> PatchResult {
    match apply_patch_inner(request, options) {
        Ok(result) => result,
        Err(error) => {
            warn!("patch failed: {}", error);
            PatchResult::from_error(error)
        }
    }
}

/// Applies a diff with the strict preset and no original content.
///
/// Context lines must match exactly and a filename must be derivable from
/// the `filename` argument or the diff itself.
pub fn apply_strict(diff_text: &str, filename: Option<&str>) -> PatchResult {
    apply_patch(
        &PatchRequest {
            diff_text,
            original_text: None,
            filename,
        },
        &EngineOptions::strict(),
    )
}

/// Applies a diff to the given original content with the smart preset.
///
/// Context lines are compared fuzzily, so minor drift between the diff and
/// the document is absorbed; anything below the similarity threshold is
/// reported as a warning rather than failing the patch.
pub fn apply_smart(
    diff_text: &str,
    original_text: Option<&str>,
    filename: Option<&str>,
) -> PatchResult {
    apply_patch(
        &PatchRequest {
            diff_text,
            original_text,
            filename,
        },
        &EngineOptions::smart(),
    )
}

fn apply_patch_inner(
    request: &PatchRequest<'_>,
    options: &EngineOptions,
) -> Result<PatchResult, PatchError> {
    let parsed = parse_diff(request.diff_text)?;
    let filename = resolve_filename(
        request.filename,
        parsed.target_filename.as_deref(),
        options.require_filename,
    )?;

    info!(
        "applying {} hunk(s) to '{}' ({} rejected)",
        parsed.hunks.len(),
        filename,
        parsed.rejected.len()
    );

    // Malformed headers were skipped during parsing; report each one.
    let mut warnings: Vec<Warning> = parsed
        .rejected
        .iter()
        .map(|r| Warning {
            message: format!(
                "malformed hunk header '{}' on line {} skipped",
                r.header, r.line_number
            ),
        })
        .collect();

    let original_lines: Vec<&str> = request
        .original_text
        .map(|text| text.lines().collect())
        .unwrap_or_default();

    let exact = ExactMatcher;
    let fuzzy;
    let matcher: &dyn LineMatcher = match options.match_policy {
        MatchPolicy::Exact => &exact,
        MatchPolicy::Fuzzy { threshold } => {
            fuzzy = FuzzyMatcher::new(threshold);
            &fuzzy
        }
    };

    let (lines, apply_warnings) = apply_hunks(&original_lines, &parsed.hunks, matcher);
    warnings.extend(apply_warnings);

    let output = assemble_output(&lines, request.original_text);

    let (status, message) = if warnings.is_empty() {
        (
            PatchStatus::Success,
            format!("successfully applied patch to '{}'", filename),
        )
    } else {
        (
            PatchStatus::Warning,
            format!(
                "applied patch to '{}' with {} warning(s)",
                filename,
                warnings.len()
            ),
        )
    };

    Ok(PatchResult {
        status,
        message,
        filename: Some(filename),
        warnings,
        output: Some(output),
    })
}

/// Resolves the reporting filename: the caller's hint wins, then the diff's
/// `+++ b/` target, then either an error or the fallback name.
fn resolve_filename(
    hint: Option<&str>,
    parsed: Option<&str>,
    require_filename: bool,
) -> Result<String, PatchError> {
    if let Some(hint) = hint {
        if !hint.trim().is_empty() {
            return Ok(hint.to_string());
        }
    }
    if let Some(parsed) = parsed {
        return Ok(parsed.to_string());
    }
    if require_filename {
        Err(PatchError::MissingFilename)
    } else {
        Ok(FALLBACK_FILENAME.to_string())
    }
}

/// Joins emitted lines into the final output text.
///
/// Line terminators are normalized away for comparison but restored here:
/// when the original document uses CRLF the output does too, otherwise LF.
/// The trailing terminator likewise follows the original: absent or empty
/// originals (and newline-terminated ones) produce newline-terminated
/// output, so a zero-hunk patch reproduces its input byte for byte.
fn assemble_output(lines: &[String], original_text: Option<&str>) -> String {
    let terminator = if original_text.is_some_and(|t| t.contains("\r\n")) {
        "\r\n"
    } else {
        "\n"
    };
    let mut output = lines.join(terminator);
    let newline_terminated = original_text.map_or(true, |t| t.is_empty() || t.ends_with('\n'));
    if newline_terminated && !output.is_empty() {
        output.push_str(terminator);
    }
    output
}
