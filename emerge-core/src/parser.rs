use tracing::debug;

use crate::ast::SourceFile;
use crate::error::FrontendError;
use crate::grammar::SourceGrammar;
use crate::lexer::lex;
use crate::matcher::{MatchingResult, match_tokens};

/// Lexes and matches a whole source file. `file` names the source in
/// spans and diagnostics.
pub fn parse_source(
    grammar: &SourceGrammar,
    file: &str,
    text: &str,
) -> Result<SourceFile, FrontendError> {
    let tokens = lex(file, text)?;
    debug!(file, tokens = tokens.len(), "lexed source");
    match match_tokens(grammar.grammar(), grammar.source_file(), tokens)? {
        MatchingResult::Success {
            value,
            is_ambiguous,
        } => {
            if is_ambiguous {
                debug!(file, "source matched with tied derivations");
            }
            Ok(value)
        }
        MatchingResult::Error(mismatch) => Err(FrontendError::Mismatch(mismatch)),
    }
}
