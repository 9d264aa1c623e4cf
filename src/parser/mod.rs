pub mod molit_parser;

pub use molit_parser::{MolitParser, Parser, ResponsePage};
