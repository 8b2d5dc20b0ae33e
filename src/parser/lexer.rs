use nom::{
    character::complete::{digit1, multispace0},
    combinator::map_res,
    error::ParseError,
    sequence::delimited,
    IResult,
};

/// Wrap a parser so it tolerates surrounding whitespace
pub fn ws<'a, F, O, E>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where
    F: FnMut(&'a str) -> IResult<&'a str, O, E>,
    E: ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

/// Parse a decimal colour channel (0-255)
pub fn channel(input: &str) -> IResult<&str, u8> {
    map_res(digit1, |s: &str| s.parse::<u8>())(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_in_range() {
        assert_eq!(channel("255"), Ok(("", 255)));
        assert_eq!(channel("0,"), Ok((",", 0)));
    }

    #[test]
    fn test_channel_out_of_range() {
        assert!(channel("256").is_err());
        assert!(channel("-1").is_err());
    }

    #[test]
    fn test_ws_strips_padding() {
        let result: IResult<&str, u8> = ws(channel)("  42  )");
        assert_eq!(result, Ok((")", 42)));
    }
}
