use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1, take_while_m_n},
    character::complete::char,
    combinator::{all_consuming, map_opt},
    sequence::{preceded, tuple},
    IResult,
};

use super::lexer::{channel, ws};
use crate::request::Rgb;

/// Parse a colour string: `#RGB`, `#RRGGBB`, `rgb(r, g, b)` or a named colour
pub fn parse_colour(input: &str) -> Option<Rgb> {
    all_consuming(ws(alt((hex_colour, rgb_function, named))))(input)
        .ok()
        .map(|(_, colour)| colour)
}

/// The fixed palette carried over from the event branding
pub fn named_colour(name: &str) -> Option<Rgb> {
    match name.to_ascii_lowercase().as_str() {
        "black" => Some(Rgb::new(0, 0, 0)),
        "white" => Some(Rgb::new(255, 255, 255)),
        "grey" | "gray" => Some(Rgb::new(153, 153, 153)),
        "linaro-blue" => Some(Rgb::new(70, 145, 218)),
        _ => None,
    }
}

fn hex_colour(input: &str) -> IResult<&str, Rgb> {
    map_opt(
        preceded(
            char('#'),
            take_while_m_n(3, 6, |c: char| c.is_ascii_hexdigit()),
        ),
        expand_hex,
    )(input)
}

fn expand_hex(hex: &str) -> Option<Rgb> {
    match hex.len() {
        6 => Some(Rgb::new(
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        )),
        3 => Some(Rgb::new(
            u8::from_str_radix(&hex[0..1], 16).ok()? * 17,
            u8::from_str_radix(&hex[1..2], 16).ok()? * 17,
            u8::from_str_radix(&hex[2..3], 16).ok()? * 17,
        )),
        _ => None,
    }
}

fn rgb_function(input: &str) -> IResult<&str, Rgb> {
    let (input, _) = tag_no_case("rgb")(input)?;
    let (input, (_, r, _, g, _, b, _)) = tuple((
        ws(char('(')),
        ws(channel),
        char(','),
        ws(channel),
        char(','),
        ws(channel),
        char(')'),
    ))(input)?;
    Ok((input, Rgb::new(r, g, b)))
}

fn named(input: &str) -> IResult<&str, Rgb> {
    map_opt(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '-'),
        named_colour,
    )(input)
}
