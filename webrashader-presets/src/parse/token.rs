use crate::error::ParsePresetError;
use crate::parse::Span;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till1, take_until};
use nom::character::complete::{line_ending, multispace0, multispace1, not_line_ending, space0};
use nom::combinator::{eof, value};
use nom::error::{ErrorKind, ParseError};
use nom::sequence::delimited;
use nom::{IResult, InputTake, Slice};

#[derive(Debug)]
pub(crate) struct Token<'a> {
    pub key: Span<'a>,
    pub value: Span<'a>,
}

impl<'a> Token<'a> {
    pub fn row(&self) -> u32 {
        self.key.location_line()
    }
}

fn parse_assignment(input: Span) -> IResult<Span, ()> {
    let (input, _) = space0(input)?;
    let (input, _) = tag("=")(input)?;
    let (input, _) = space0(input)?;
    Ok((input, ()))
}

fn multiline_comment(i: Span) -> IResult<Span, Span> {
    delimited(tag("/*"), take_until("*/"), tag("*/"))(i)
}

fn single_comment(i: Span) -> IResult<Span, Span> {
    delimited(
        alt((tag("//"), tag("#"), tag(";"))),
        not_line_ending,
        alt((line_ending, eof)),
    )(i)
}

fn whitespace(i: Span) -> IResult<Span, ()> {
    value(
        (), // Output is thrown away.
        multispace0,
    )(i)
}

/// Strip quotes or a trailing comment from the remainder of a line.
///
/// A quoted value ends at its closing quote and anything after it is ignored.
/// A bare value ends at the first `//`, `#` or `;`.
fn unquote(input: Span) -> IResult<Span, Span> {
    let text = *input.fragment();
    if let Some(quoted) = text.strip_prefix('"') {
        let Some(end) = quoted.find('"') else {
            return Err(nom::Err::Failure(nom::error::Error::from_error_kind(
                input,
                ErrorKind::Char,
            )));
        };
        return Ok((input.slice(text.len()..), input.slice(1..end + 1)));
    }

    let mut end = text.len();
    if let Some(idx) = text.find("//") {
        end = end.min(idx);
    }
    if let Some(idx) = text.find(['#', ';']) {
        end = end.min(idx);
    }
    let trimmed = text[..end].trim_end().len();
    Ok((input.slice(text.len()..), input.take(trimmed)))
}

fn parse_reference(input: Span) -> IResult<Span, Token> {
    let (input, key) = tag("#reference")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, rest) = not_line_ending(input)?;
    let (_, value) = unquote(rest)?;
    Ok((input, Token { key, value }))
}

fn parse_key_value(input: Span) -> IResult<Span, Token> {
    let (input, key) = take_till1(|c: char| c == '=' || c == '\n' || c == '\r')(input)?;
    let key = key.take(key.fragment().trim_end().len());
    if key.fragment().is_empty() {
        return Err(nom::Err::Failure(nom::error::Error::from_error_kind(
            key,
            ErrorKind::TakeTill1,
        )));
    }
    let (input, _) = parse_assignment(input)
        .map_err(|_: nom::Err<nom::error::Error<Span>>| {
            nom::Err::Failure(nom::error::Error::from_error_kind(key, ErrorKind::Tag))
        })?;
    let (input, rest) = not_line_ending(input)?;
    let (_, value) = unquote(rest)?;
    Ok((input, Token { key, value }))
}

fn parse_tokens(mut span: Span) -> IResult<Span, Vec<Token>> {
    let mut values = Vec::new();
    while !span.is_empty() {
        // important to munch whitespace first.
        if let Ok((input, _)) = whitespace(span) {
            span = input;
        }
        if span.is_empty() {
            break;
        }
        // handle references before comments because comments can start with #
        if let Ok((input, token)) = parse_reference(span) {
            span = input;
            values.push(token);
            continue;
        }
        if let Ok((input, _)) = multiline_comment(span) {
            span = input;
            continue;
        }
        if let Ok((input, _)) = single_comment(span) {
            span = input;
            continue;
        }
        let (input, token) = parse_key_value(span)?;
        span = input;
        values.push(token)
    }
    Ok((span, values))
}

pub(crate) fn do_lex(input: &str) -> Result<Vec<Token>, ParsePresetError> {
    let span = Span::new(input.trim_start_matches('\u{feff}'));
    let (_, tokens) = parse_tokens(span).map_err(|e| match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let input: Span = e.input;
            ParsePresetError::LexerError {
                offset: input.location_offset(),
                row: input.location_line(),
                col: input.get_column(),
            }
        }
        _ => ParsePresetError::LexerError {
            offset: 0,
            row: 0,
            col: 0,
        },
    })?;
    Ok(tokens)
}

#[cfg(test)]
mod test {
    use crate::parse::token::{do_lex, single_comment};
    use crate::ParsePresetError;

    fn pairs(input: &str) -> Vec<(String, String)> {
        do_lex(input)
            .unwrap()
            .into_iter()
            .map(|t| (t.key.fragment().to_string(), t.value.fragment().to_string()))
            .collect()
    }

    #[test]
    fn parses_single_line_comment() {
        let (rest, _) =
            single_comment("// Define textures to be used by the different passes\ntex=n".into())
                .unwrap();
        assert_eq!(*rest.fragment(), "tex=n");
    }

    #[test]
    fn parses_key_value_lines() {
        let tokens = pairs(
            r#"
#reference "../../base.slangp"
shaders = 2
/* block
   shader9 = ignored.slang */
shader0 = ../shaders/stock.slang
alias0 = "CorePass" # trailing comment
shader1="../shaders/with space.slang"   // trailing comment
scale_type1 = viewport // why
; shader5 = commented.slang
BOOST = 2.0 ; red boost
"#,
        );
        assert_eq!(
            tokens,
            vec![
                ("#reference".into(), "../../base.slangp".into()),
                ("shaders".into(), "2".into()),
                ("shader0".into(), "../shaders/stock.slang".into()),
                ("alias0".into(), "CorePass".into()),
                ("shader1".into(), "../shaders/with space.slang".into()),
                ("scale_type1".into(), "viewport".into()),
                ("BOOST".into(), "2.0".into()),
            ]
        );
    }

    #[test]
    fn tracks_rows_through_crlf() {
        let tokens = do_lex("shaders = 1\r\n\r\nshader0 = a.slang\r\n").unwrap();
        assert_eq!(tokens[1].row(), 3);
        assert_eq!(*tokens[1].value.fragment(), "a.slang");
    }

    #[test]
    fn line_without_assignment_is_an_error() {
        let err = do_lex("shaders = 1\nshader0 a.slang\n").unwrap_err();
        assert!(matches!(err, ParsePresetError::LexerError { row: 2, .. }));
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = do_lex("shaders = 1\nshader0 = \"a.slang\n").unwrap_err();
        assert!(matches!(err, ParsePresetError::LexerError { row: 2, .. }));
    }
}
