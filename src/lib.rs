pub mod compiler;
pub mod converter;
pub mod derivation;
pub mod error_handling;
pub mod generator;
pub mod grammar;
pub mod matcher;
pub mod parser;
pub mod sql;

pub use compiler::{compile, compile_file, CompileError, CompiledGrammar, GrammarConfig, LiteralAugmentation, NameTables};
pub use converter::{convert_batch, to_action_sequence};
pub use derivation::{DerivationError, DerivationState, LinkingTable};
pub use grammar::action::Action;
pub use matcher::ParseError;
