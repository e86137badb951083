/*
    The built-in SQL grammar
*/

use crate::compiler::{compile, CompileError, CompiledGrammar, GrammarConfig, LiteralAugmentation, NameTables};

pub const SQL_GRAMMAR: &str = include_str!("../example_data/sql.peg");

// Compiles the SQL grammar over a database schema, table name to column names
pub fn sql_grammar(tables: &NameTables, literals: Option<&LiteralAugmentation>) -> Result<CompiledGrammar, CompileError> {
    compile(SQL_GRAMMAR, Some(tables), literals, &GrammarConfig::sql())
}
