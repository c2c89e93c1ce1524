use crate::{PreprocessError, Provenance, VersionHeader, MAX_INCLUDE_DEPTH};
use std::sync::Arc;
use webrashader_common::resolve::{join_relative, Resolver};

/// A line of expanded source and where it was written.
#[derive(Debug, Clone)]
pub(crate) struct SourceLine {
    pub text: String,
    pub origin: Provenance,
}

/// A root source file with every `#include` expanded in place.
#[derive(Debug)]
pub(crate) struct ExpandedSource {
    pub version: VersionHeader,
    pub header_origin: Provenance,
    /// The lines following the version header.
    pub lines: Vec<SourceLine>,
}

trait SourceOutput {
    fn push_line(&mut self, text: &str, file: &Arc<str>, line: usize);
}

impl SourceOutput for Vec<SourceLine> {
    fn push_line(&mut self, text: &str, file: &Arc<str>, line: usize) {
        self.push(SourceLine {
            text: text.to_string(),
            origin: Provenance {
                file: Arc::clone(file),
                line: line as u32,
            },
        })
    }
}

fn parse_version(header: &str) -> Option<VersionHeader> {
    let mut parts = header.strip_prefix("#version")?.split_whitespace();
    let version = parts.next()?.parse().ok()?;
    let es = parts.next() == Some("es");
    Some(VersionHeader { version, es })
}

pub(crate) fn read_source(
    path: &str,
    source: &str,
    resolver: &mut impl Resolver,
) -> Result<ExpandedSource, PreprocessError> {
    let file: Arc<str> = Arc::from(path);
    let mut lines = source.lines().enumerate().skip_while(|(_, l)| l.trim().is_empty());

    let Some((header_idx, header)) = lines.next() else {
        return Err(PreprocessError::MissingVersionHeader(path.to_string()));
    };
    let Some(version) = parse_version(header.trim()) else {
        return Err(PreprocessError::MissingVersionHeader(path.to_string()));
    };

    let mut output = Vec::new();
    let mut stack = vec![path.to_string()];
    preprocess(lines, &file, resolver, &mut stack, &mut output)?;

    Ok(ExpandedSource {
        version,
        header_origin: Provenance {
            file,
            line: header_idx as u32 + 1,
        },
        lines: output,
    })
}

fn include_target(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("include")?;
    Some(rest.trim().trim_matches('"').trim_matches(|c| c == '<' || c == '>'))
}

fn preprocess<'a>(
    lines: impl Iterator<Item = (usize, &'a str)>,
    file: &Arc<str>,
    resolver: &mut impl Resolver,
    stack: &mut Vec<String>,
    output: &mut Vec<SourceLine>,
) -> Result<(), PreprocessError> {
    for (line_idx, line) in lines {
        let line_no = line_idx + 1;
        let Some(include_file) = include_target(line) else {
            output.push_line(line, file, line_no);
            continue;
        };

        let origin = Provenance {
            file: Arc::clone(file),
            line: line_no as u32,
        };
        if include_file.is_empty() {
            return Err(PreprocessError::UnexpectedEol(origin));
        }
        if stack.len() >= MAX_INCLUDE_DEPTH {
            return Err(PreprocessError::ExceededIncludeDepth(MAX_INCLUDE_DEPTH));
        }

        let include_path = join_relative(file, include_file);
        if stack.contains(&include_path) {
            return Err(PreprocessError::IncludeCycle(include_path));
        }

        let source = resolver
            .read_text(&include_path)
            .ok_or_else(|| PreprocessError::NotFound {
                path: include_path.clone(),
                included_from: Some(origin),
            })?;

        let include_file: Arc<str> = Arc::from(include_path.as_str());
        stack.push(include_path);
        preprocess(source.lines().enumerate(), &include_file, resolver, stack, output)?;
        stack.pop();
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::include::read_source;
    use crate::PreprocessError;
    use webrashader_common::resolve::MemoryResolver;

    #[test]
    fn expands_nested_includes_with_origins() {
        let mut resolver = MemoryResolver::new()
            .with("a/inc/one.h", "// one\n#include \"../two.h\"\nfloat one;")
            .with("a/two.h", "float two;");
        let expanded = read_source(
            "a/main.slang",
            "\n#version 450\n#include \"inc/one.h\"\nvoid main() {}\n",
            &mut resolver,
        )
        .unwrap();

        assert_eq!(expanded.version.version, 450);
        assert_eq!(expanded.header_origin.line, 2);
        let lines: Vec<(&str, &str, u32)> = expanded
            .lines
            .iter()
            .map(|l| (l.text.as_str(), &*l.origin.file, l.origin.line))
            .collect();
        assert_eq!(
            lines,
            vec![
                ("// one", "a/inc/one.h", 1),
                ("float two;", "a/two.h", 1),
                ("float one;", "a/inc/one.h", 3),
                ("void main() {}", "a/main.slang", 4),
            ]
        );
    }

    #[test]
    fn rejects_cycles_and_missing_headers() {
        let mut resolver = MemoryResolver::new()
            .with("x.h", "#include \"y.h\"")
            .with("y.h", "#include \"x.h\"");
        let err = read_source("main.slang", "#version 450\n#include \"x.h\"\n", &mut resolver)
            .unwrap_err();
        assert!(matches!(err, PreprocessError::IncludeCycle(p) if p == "x.h"));

        let err = read_source("main.slang", "void main() {}", &mut resolver).unwrap_err();
        assert!(matches!(err, PreprocessError::MissingVersionHeader(_)));

        let err = read_source("main.slang", "#version 450\n#include \"nope.h\"", &mut resolver)
            .unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::NotFound { included_from: Some(origin), .. } if origin.line == 2
        ));
    }

    #[test]
    fn parses_es_headers() {
        let mut resolver = MemoryResolver::new();
        let expanded = read_source("a.glsl", "#version 300 es\n", &mut resolver).unwrap();
        assert!(expanded.version.es);
        assert_eq!(expanded.version.version, 300);
    }
}
