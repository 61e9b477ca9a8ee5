mod loader;
mod nom_parser;
mod yaml_parser;

pub use self::{
    loader::{load, load_str, LoadedTree},
    nom_parser::{parse_rule, parse_rule_str, Rule},
    yaml_parser::load_yaml,
};
