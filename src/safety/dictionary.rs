//! Built-in forbidden-term dictionaries.
//!
//! Weights express how strongly a term suggests an injection attempt. The
//! update dictionary omits the vocabulary needed to describe an insert or
//! update.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedTerm {
    pub term: &'static str,
    pub weight: u32,
}

const fn term(term: &'static str, weight: u32) -> WeightedTerm {
    WeightedTerm { term, weight }
}

pub const READ_PROMPT_TERMS: &[WeightedTerm] = &[
    term("SELECT", 5),
    term("INSERT", 5),
    term("UPDATE", 5),
    term("DELETE", 5),
    term("DROP", 10),
    term("ALTER", 8),
    term("CREATE", 7),
    term("EXECUTE", 8),
    term(";", 4),
    term("--", 6),
    term("/*", 6),
    term("*/", 6),
    term("`", 3),
    term("OR", 4),
    term("AND", 4),
    term("NOT", 3),
    term("LIKE", 3),
    term("WHERE", 4),
    term("1=1", 7),
    term("0=0", 7),
    term("NULL", 3),
    term("TRUE", 3),
    term("FALSE", 3),
    term("script", 8),
    term("alert", 7),
    term("onerror", 7),
    term("onload", 7),
    term("<script>", 10),
    term("</script>", 10),
    term("<img", 8),
    term("javascript:", 10),
    term("eval", 8),
    term("function", 5),
    term("console", 4),
    term("document", 4),
];

pub const UPDATE_PROMPT_TERMS: &[WeightedTerm] = &[
    term("DELETE", 5),
    term("DROP", 10),
    term(";", 4),
    term("--", 6),
    term("/*", 6),
    term("*/", 6),
    term("`", 3),
    term("1=1", 7),
    term("0=0", 7),
    term("script", 8),
    term("alert", 7),
    term("onerror", 7),
    term("onload", 7),
    term("<script>", 10),
    term("</script>", 10),
    term("<img", 8),
    term("javascript:", 10),
    term("eval", 8),
    term("function", 5),
    term("console", 4),
    term("document", 4),
];

pub const READ_SQL_KEYWORDS: &[&str] = &[
    "DROP",
    "DELETE",
    "TRUNCATE",
    "ALTER",
    "CREATE",
    "INSERT INTO",
    "UPDATE",
    "EXECUTE",
    "--",
    "1=1",
    "0=0",
];

pub const UPDATE_SQL_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "EXECUTE", "--", "1=1", "0=0",
];
