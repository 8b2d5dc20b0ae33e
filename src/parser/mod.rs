// Colour string parsers for layout documents

pub mod colour;
pub mod lexer;

pub use colour::{named_colour, parse_colour};
