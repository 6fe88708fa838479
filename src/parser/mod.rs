pub mod cepea_parser;

pub use cepea_parser::{CepeaParser, Parser};
