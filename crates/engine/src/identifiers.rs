use crate::{EngineError, EngineResult};

/// Accepts `table` or `schema.table`, each part a plain SQL identifier.
pub fn validate_table_name(table_name: &str) -> EngineResult<()> {
    let invalid = |reason| EngineError::InvalidTableName {
        name: table_name.to_string(),
        reason,
    };

    let parts: Vec<&str> = table_name.split('.').collect();
    if parts.len() > 2 {
        return Err(invalid("at most one schema qualifier is allowed"));
    }
    for part in parts {
        let mut chars = part.chars();
        let Some(first) = chars.next() else {
            return Err(invalid("name parts cannot be empty"));
        };
        if !is_ident_start(first) || !chars.all(is_ident_continue) {
            return Err(invalid(
                "name must be alphanumeric or underscore and start with a letter or underscore",
            ));
        }
    }
    Ok(())
}

fn is_ident_start(value: char) -> bool {
    value == '_' || value.is_ascii_alphabetic()
}

fn is_ident_continue(value: char) -> bool {
    is_ident_start(value) || value.is_ascii_digit()
}
