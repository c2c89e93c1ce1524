use crate::include::{ExpandedSource, SourceLine};
use crate::pragma::is_meta_pragma;
use crate::{PreprocessError, Provenance, SourceMap, StageSource};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Stage {
    Vertex,
    Fragment,
}

/// A condition that selects a stage, and whether it is negated.
pub(crate) type Guard = Option<(Stage, bool)>;

/// A conditional compilation directive.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Conditional {
    Open(Guard),
    ElseIf(Guard),
    Else,
    Close,
}

fn strip_comment(arg: &str) -> &str {
    match arg.find("//") {
        Some(idx) => &arg[..idx],
        None => arg,
    }
    .trim()
}

fn stage_name(arg: &str) -> Option<Stage> {
    match arg.trim() {
        "VERTEX" => Some(Stage::Vertex),
        "FRAGMENT" => Some(Stage::Fragment),
        _ => None,
    }
}

fn defined_guard(arg: &str) -> Guard {
    let arg = strip_comment(arg);
    let (negated, arg) = match arg.strip_prefix('!') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, arg),
    };
    let arg = arg.strip_prefix("defined")?.trim();
    let arg = arg
        .strip_prefix('(')
        .and_then(|a| a.strip_suffix(')'))
        .unwrap_or(arg);
    stage_name(arg).map(|stage| (stage, negated))
}

/// Classify a line as a conditional compilation directive.
pub(crate) fn conditional(line: &str) -> Option<Conditional> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let word_end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let (word, arg) = rest.split_at(word_end);
    Some(match word {
        "ifdef" => Conditional::Open(stage_name(strip_comment(arg)).map(|s| (s, false))),
        "ifndef" => Conditional::Open(stage_name(strip_comment(arg)).map(|s| (s, true))),
        "if" => Conditional::Open(defined_guard(arg)),
        "elif" => Conditional::ElseIf(defined_guard(arg)),
        "else" => Conditional::Else,
        "endif" => Conditional::Close,
        _ => return None,
    })
}

pub(crate) fn is_stage_pragma(line: &str) -> bool {
    stage_pragma(line).is_some()
}

fn stage_pragma(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("pragma")?.trim_start();
    let rest = rest.strip_prefix("stage")?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

fn push(stage: &mut StageSource, text: &str, origin: &Provenance) {
    stage.text.push_str(text);
    stage.text.push('\n');
    stage.map.push(origin.clone());
}

/// Split a `#pragma stage` delimited source. Lines before the first marker
/// belong to both stages.
fn split_by_pragma(
    lines: &[SourceLine],
) -> Result<(StageSource, StageSource), PreprocessError> {
    let mut vertex = StageSource::default();
    let mut fragment = StageSource::default();
    let mut current = None;

    for line in lines {
        if let Some(stage) = stage_pragma(&line.text) {
            current = Some(match stage {
                "vertex" => Stage::Vertex,
                "fragment" => Stage::Fragment,
                _ => return Err(PreprocessError::InvalidStage(line.origin.clone())),
            });
            continue;
        }
        if is_meta_pragma(&line.text) {
            continue;
        }
        match current {
            None => {
                push(&mut vertex, &line.text, &line.origin);
                push(&mut fragment, &line.text, &line.origin);
            }
            Some(Stage::Vertex) => push(&mut vertex, &line.text, &line.origin),
            Some(Stage::Fragment) => push(&mut fragment, &line.text, &line.origin),
        }
    }
    Ok((vertex, fragment))
}

enum Frame {
    Guard { taking: bool, taken: bool },
    Passthrough,
}

fn visible(stack: &[Frame]) -> bool {
    stack.iter().all(|frame| match frame {
        Frame::Guard { taking, .. } => *taking,
        Frame::Passthrough => true,
    })
}

/// Select the lines of one stage from a source with `VERTEX`/`FRAGMENT`
/// guards. Guards that only test the stage are evaluated and removed, every
/// other conditional is passed through for the GLSL compiler.
fn select_stage(source: &ExpandedSource, stage: Stage) -> StageSource {
    let mut output = StageSource::default();
    let define = match stage {
        Stage::Vertex => "#define VERTEX",
        Stage::Fragment => "#define FRAGMENT",
    };
    push(&mut output, define, &source.header_origin);
    push(&mut output, "#define PARAMETER_UNIFORM", &source.header_origin);

    let mut stack: Vec<Frame> = Vec::new();
    let matches = |guard: Guard| guard.is_some_and(|(s, negated)| (s == stage) != negated);

    for line in &source.lines {
        match conditional(&line.text) {
            Some(Conditional::Open(guard @ Some(_))) => {
                let taking = matches(guard);
                stack.push(Frame::Guard {
                    taking,
                    taken: taking,
                });
                continue;
            }
            Some(Conditional::ElseIf(guard)) => {
                if let Some(Frame::Guard { taking, taken }) = stack.last_mut() {
                    *taking = !*taken && matches(guard);
                    *taken |= *taking;
                    continue;
                }
            }
            Some(Conditional::Else) => {
                if let Some(Frame::Guard { taking, taken }) = stack.last_mut() {
                    *taking = !*taken;
                    *taken = true;
                    continue;
                }
            }
            Some(Conditional::Close) => {
                if let Some(Frame::Guard { .. }) = stack.pop() {
                    continue;
                }
                if visible(&stack) {
                    push(&mut output, &line.text, &line.origin);
                }
                continue;
            }
            Some(Conditional::Open(None)) => {
                if visible(&stack) {
                    push(&mut output, &line.text, &line.origin);
                }
                stack.push(Frame::Passthrough);
                continue;
            }
            None => {}
        }

        if is_meta_pragma(&line.text) {
            continue;
        }
        if visible(&stack) {
            push(&mut output, &line.text, &line.origin);
        }
    }
    output
}

pub(crate) fn split_stages(
    path: &str,
    source: &ExpandedSource,
) -> Result<(StageSource, StageSource), PreprocessError> {
    if source.lines.iter().any(|l| is_stage_pragma(&l.text)) {
        return split_by_pragma(&source.lines);
    }

    let guarded = source
        .lines
        .iter()
        .any(|l| matches!(conditional(&l.text), Some(Conditional::Open(Some(_)))));
    if !guarded {
        return Err(PreprocessError::MissingStage(path.to_string()));
    }

    Ok((
        select_stage(source, Stage::Vertex),
        select_stage(source, Stage::Fragment),
    ))
}

impl StageSource {
    /// Build a stage from text that has no include history, such as
    /// generated source. Every line maps to itself in `file`.
    pub fn from_text(file: &str, text: &str) -> StageSource {
        let file: std::sync::Arc<str> = std::sync::Arc::from(file);
        let mut map = SourceMap::default();
        for line in 0..text.lines().count() {
            map.push(Provenance {
                file: file.clone(),
                line: line as u32 + 1,
            });
        }
        StageSource {
            text: text.to_string(),
            map,
        }
    }
}
