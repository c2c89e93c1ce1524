use crate::include::SourceLine;
use crate::stage::{conditional, Conditional};
use crate::{PreprocessError, ShaderParameter};
use nom::bytes::complete::{tag, take_until, take_while1};
use nom::character::complete::{multispace0, multispace1};
use nom::combinator::opt;
use nom::number::complete::float;
use nom::sequence::{delimited, preceded};
use nom::IResult;
use std::str::FromStr;
use webrashader_common::map::ShortString;
use webrashader_common::ImageFormat;

#[derive(Debug)]
pub(crate) struct ShaderMeta {
    pub(crate) format: ImageFormat,
    pub(crate) parameters: Vec<ShaderParameter>,
    pub(crate) name: Option<ShortString>,
}

fn parse_parameter_string(input: &str) -> IResult<&str, ShaderParameter> {
    let (input, _) = tag("#pragma")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag("parameter")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, name) = take_while1(|c: char| !c.is_whitespace())(input)?;
    let (input, _) = multispace1(input)?;
    let (input, description) = delimited(tag("\""), take_until("\""), tag("\""))(input)?;
    let (input, initial) = preceded(multispace0, float)(input)?;
    let (input, minimum) = preceded(multispace1, float)(input)?;
    let (input, maximum) = preceded(multispace1, float)(input)?;
    // step is optional, some shaders leave it out entirely
    let (input, step) = opt(preceded(multispace1, float))(input)?;
    Ok((
        input,
        ShaderParameter {
            id: ShortString::from(name),
            description: description.to_string(),
            initial,
            minimum,
            maximum,
            step: step.unwrap_or(0.0),
            active: true,
        },
    ))
}

fn pragma_argument<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("pragma")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start().strip_prefix(name)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

/// Whether `line` is a metadata pragma consumed here rather than passed to
/// the GLSL compiler.
pub(crate) fn is_meta_pragma(line: &str) -> bool {
    ["parameter", "name", "format", "stage"]
        .iter()
        .any(|name| pragma_argument(line, name).is_some())
}

pub(crate) fn parse_pragma_meta(source: &[SourceLine]) -> Result<ShaderMeta, PreprocessError> {
    let mut parameters: Vec<ShaderParameter> = Vec::new();
    let mut format = ImageFormat::default();
    let mut name = None;

    // Only conditionals that do not select a stage make a declaration inactive.
    let mut conditionals: Vec<bool> = Vec::new();

    for line in source {
        let text = line.text.trim();
        match conditional(text) {
            Some(Conditional::Open(guard)) => {
                conditionals.push(guard.is_none());
                continue;
            }
            Some(Conditional::Close) => {
                conditionals.pop();
                continue;
            }
            Some(Conditional::Else | Conditional::ElseIf(_)) => continue,
            None => {}
        }

        if pragma_argument(text, "parameter").is_some() {
            let Ok((_, mut parameter)) = parse_parameter_string(text) else {
                return Err(PreprocessError::PragmaParseError {
                    text: text.to_string(),
                    origin: line.origin.clone(),
                });
            };
            parameter.active = !conditionals.iter().any(|&inactive| inactive);

            if let Some(existing) = parameters.iter_mut().find(|p| p.id == parameter.id) {
                if !existing.same_bounds(&parameter) {
                    return Err(PreprocessError::DuplicatePragmaError(parameter.id.to_string()));
                }
                existing.active |= parameter.active;
            } else {
                parameters.push(parameter);
            }
            continue;
        }

        if let Some(format_string) = pragma_argument(text, "format") {
            if format != ImageFormat::Unknown {
                return Err(PreprocessError::DuplicatePragmaError(text.to_string()));
            }
            format = ImageFormat::from_str(format_string).unwrap_or_default();
            if format == ImageFormat::Unknown {
                return Err(PreprocessError::UnknownImageFormat(format_string.to_string()));
            }
            continue;
        }

        if let Some(alias) = pragma_argument(text, "name") {
            if name.is_some() {
                return Err(PreprocessError::DuplicatePragmaError(text.to_string()));
            }
            name = Some(ShortString::from(alias));
        }
    }

    Ok(ShaderMeta {
        name,
        format,
        parameters,
    })
}

#[cfg(test)]
mod test {
    use crate::include::SourceLine;
    use crate::pragma::{parse_parameter_string, parse_pragma_meta};
    use crate::{PreprocessError, Provenance, ShaderParameter};
    use webrashader_common::ImageFormat;

    fn lines(source: &str) -> Vec<SourceLine> {
        source
            .lines()
            .enumerate()
            .map(|(idx, text)| SourceLine {
                text: text.to_string(),
                origin: Provenance {
                    file: "test.slang".into(),
                    line: idx as u32 + 1,
                },
            })
            .collect()
    }

    #[test]
    fn parses_parameter_pragma() {
        assert_eq!(
            ShaderParameter {
                id: "exc".into(),
                description: "orizontal correction hack (games where players stay at center)"
                    .to_string(),
                initial: 0.0,
                minimum: -10.0,
                maximum: 10.0,
                step: 0.25,
                active: true,
            },
            parse_parameter_string(r#"#pragma parameter exc "orizontal correction hack (games where players stay at center)" 0.0 -10.0 10.0 0.25"#)
                .unwrap()
                .1
        )
    }

    #[test]
    fn parses_parameter_pragma_without_step() {
        let (_, parameter) =
            parse_parameter_string("#pragma  parameter\tSPACER \"\" 0.0 0.0 1.0").unwrap();
        assert_eq!(parameter.id, "SPACER");
        assert_eq!(parameter.description, "");
        assert_eq!(parameter.step, 0.0);
    }

    #[test]
    fn marks_conditional_parameters_inactive() {
        let meta = parse_pragma_meta(&lines(
            r#"#pragma name CorePass
#pragma format R16G16B16A16_SFLOAT
#pragma parameter A "a" 1.0 0.0 2.0 0.1
#ifdef USE_B
#pragma parameter B "b" 1.0 0.0 2.0 0.1
#endif
#if defined(VERTEX)
#pragma parameter C "c" 1.0 0.0 2.0 0.1
#endif"#,
        ))
        .unwrap();
        assert_eq!(meta.name.as_deref(), Some("CorePass"));
        assert_eq!(meta.format, ImageFormat::R16G16B16A16Sfloat);
        let active: Vec<(&str, bool)> = meta
            .parameters
            .iter()
            .map(|p| (p.id.as_str(), p.active))
            .collect();
        assert_eq!(active, vec![("A", true), ("B", false), ("C", true)]);
    }

    #[test]
    fn rejects_conflicting_redeclaration() {
        let err = parse_pragma_meta(&lines(
            "#pragma parameter A \"a\" 1.0 0.0 2.0 0.1\n#pragma parameter A \"a\" 1.0 0.0 3.0 0.1",
        ))
        .unwrap_err();
        assert!(matches!(err, PreprocessError::DuplicatePragmaError(name) if name == "A"));

        let meta = parse_pragma_meta(&lines(
            "#pragma parameter A \"a\" 1.0 0.0 2.0 0.1\n#pragma parameter A \"other label\" 0.5 0.0 2.0 0.1",
        ))
        .unwrap();
        assert_eq!(meta.parameters.len(), 1);
        assert_eq!(meta.parameters[0].initial, 1.0);
    }

    #[test]
    fn reports_malformed_parameter_line() {
        let err = parse_pragma_meta(&lines("\n#pragma parameter A \"a\" one 0.0 2.0")).unwrap_err();
        assert!(matches!(err, PreprocessError::PragmaParseError { origin, .. } if origin.line == 2));
    }
}
