//! Mapping driver diagnostics back to the source as written.

use crate::CompiledStage;
use webrashader_preprocess::Provenance;

/// Parse `digits` followed by `end` at the start of `text`.
fn number_before(text: &str, end: char) -> Option<(u32, &str)> {
    let digits = text.find(|c: char| !c.is_ascii_digit())?;
    if digits == 0 || !text[digits..].starts_with(end) {
        return None;
    }
    Some((text[..digits].parse().ok()?, &text[digits + end.len_utf8()..]))
}

/// The line of the compiled source a driver info log line blames.
///
/// Understands `ERROR: 0:12: ...` (ANGLE, Mesa) and `0(12) : error ...`
/// (NVIDIA).
pub fn blamed_line(log_line: &str) -> Option<u32> {
    let text = log_line.trim_start();
    let rest = ["ERROR:", "WARNING:"]
        .iter()
        .find_map(|prefix| text.strip_prefix(prefix))
        .map(str::trim_start);
    if let Some(rest) = rest {
        let (_, rest) = number_before(rest, ':')?;
        return number_before(rest, ':').map(|(line, _)| line);
    }
    let (_, rest) = number_before(text, '(')?;
    number_before(rest, ')').map(|(line, _)| line)
}

impl CompiledStage {
    /// Where the first line the driver log blames was written.
    pub fn locate(&self, log: &str) -> Option<Provenance> {
        log.lines()
            .filter_map(blamed_line)
            .find_map(|line| self.map.get(line).cloned())
    }
}
