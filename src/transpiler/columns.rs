//! Column name resolution, projections and sort lists.

use crate::ast::SortOrder;
use crate::cache::FragmentKind;

use super::Compiler;

/// Trailing marker for per-language columns: `name§` becomes `"name_<lang>"`.
pub const LANGUAGE_MARKER: char = '§';

/// Separator used when joining raw lists into cache keys.
const KEY_SEPARATOR: char = '\u{1f}';

/// Whether a raw column should be emitted verbatim.
///
/// True when it contains a quote or bracket, whitespace, `:`, `.`, `(` or `*`,
/// i.e. it is already quoted, qualified, cast, or an expression.
pub fn looks_qualified(raw: &str) -> bool {
    raw.chars().any(|c| {
        c.is_whitespace() || matches!(c, '"' | '[' | ':' | '.' | '(' | '*')
    })
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Resolve a raw column reference for predicates and sorting.
pub fn resolve_column(raw: &str, language: &str) -> String {
    if raw.ends_with(LANGUAGE_MARKER) {
        replace_language(raw, language, false)
    } else if looks_qualified(raw) {
        raw.to_string()
    } else {
        quote_identifier(raw)
    }
}

/// Resolve a projected field; language columns are aliased to the logical name.
pub fn resolve_projection(raw: &str, language: &str) -> String {
    if raw.ends_with(LANGUAGE_MARKER) {
        replace_language(raw, language, true)
    } else if looks_qualified(raw) {
        raw.to_string()
    } else {
        quote_identifier(raw)
    }
}

/// Rewrite every `word§` in `raw` to its physical per-language column.
pub fn replace_language(raw: &str, language: &str, alias: bool) -> String {
    let mut out = String::with_capacity(raw.len() + language.len() + 8);
    let mut word = String::new();

    for c in raw.chars() {
        if c == LANGUAGE_MARKER && !word.is_empty() {
            out.push_str(&language_column(&word, language, alias));
            word.clear();
        } else if c.is_ascii_alphanumeric() || c == '_' {
            word.push(c);
        } else {
            out.push_str(&word);
            word.clear();
            out.push(c);
        }
    }

    out.push_str(&word);
    out
}

fn language_column(name: &str, language: &str, alias: bool) -> String {
    if language.is_empty() {
        quote_identifier(name)
    } else if alias {
        format!("\"{}_{}\" AS \"{}\"", name, language, name)
    } else {
        format!("\"{}_{}\"", name, language)
    }
}

/// Split `column_direction`; the direction is whatever follows the last `_`.
pub fn parse_sort(entry: &str) -> (&str, SortOrder) {
    match entry.rfind('_') {
        Some(index) => {
            let order = if entry[index + 1..].eq_ignore_ascii_case("desc") {
                SortOrder::Desc
            } else {
                SortOrder::Asc
            };
            (&entry[..index], order)
        }
        None => (entry, SortOrder::Asc),
    }
}

impl Compiler {
    /// Resolved column reference, memoized per language.
    pub fn column(&self, raw: &str, language: &str) -> String {
        self.cache
            .get_or_compute(FragmentKind::Column, language, raw, || {
                resolve_column(raw, language)
            })
    }

    /// SELECT projection list.
    pub fn fields(&self, fields: &[String], language: &str) -> String {
        let key = join_key(fields);
        self.cache.get_or_compute(FragmentKind::Fields, language, &key, || {
            fields
                .iter()
                .map(|f| resolve_projection(f, language))
                .collect::<Vec<_>>()
                .join(", ")
        })
    }

    /// ORDER BY list, without the keyword.
    pub fn sort(&self, sort: &[String], language: &str) -> String {
        let key = join_key(sort);
        self.cache.get_or_compute(FragmentKind::Sort, language, &key, || {
            sort.iter()
                .map(|entry| {
                    let (name, order) = parse_sort(entry);
                    format!("{} {}", resolve_column(name, language), order.as_sql())
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
    }
}

fn join_key(items: &[String]) -> String {
    let mut key = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(item);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name_is_quoted() {
        assert_eq!(resolve_column("name", ""), "\"name\"");
    }

    #[test]
    fn test_qualified_names_verbatim() {
        assert_eq!(resolve_column("u.name", ""), "u.name");
        assert_eq!(resolve_column("\"Name\"", ""), "\"Name\"");
        assert_eq!(resolve_column("[Name]", ""), "[Name]");
        assert_eq!(resolve_column("data:int", ""), "data:int");
        assert_eq!(resolve_column("first name", ""), "first name");
        assert_eq!(resolve_column("COUNT(id)", ""), "COUNT(id)");
        assert_eq!(resolve_column("*", ""), "*");
    }

    #[test]
    fn test_language_column() {
        assert_eq!(resolve_column("name§", "en"), "\"name_en\"");
        assert_eq!(resolve_column("name§", ""), "\"name\"");
        assert_eq!(resolve_column("first_name§", "de"), "\"first_name_de\"");
        assert_eq!(resolve_column("t.title§", "sk"), "t.\"title_sk\"");
    }

    #[test]
    fn test_language_projection_alias() {
        assert_eq!(resolve_projection("name§", "en"), "\"name_en\" AS \"name\"");
        assert_eq!(resolve_projection("name§", ""), "\"name\"");
    }

    #[test]
    fn test_lone_marker_untouched() {
        assert_eq!(replace_language("a + §", "en", false), "a + §");
    }

    #[test]
    fn test_parse_sort() {
        assert_eq!(parse_sort("name_asc"), ("name", SortOrder::Asc));
        assert_eq!(parse_sort("created_at_DESC"), ("created_at", SortOrder::Desc));
        assert_eq!(parse_sort("price_up"), ("price", SortOrder::Asc));
        assert_eq!(parse_sort("price"), ("price", SortOrder::Asc));
    }

    #[test]
    fn test_sort_list_with_language() {
        let compiler = Compiler::new();
        let sort = vec!["title§_desc".to_string(), "id_asc".to_string()];
        assert_eq!(compiler.sort(&sort, "en"), "\"title_en\" DESC, \"id\" ASC");
    }

    #[test]
    fn test_fields_key_does_not_collide() {
        let compiler = Compiler::new();
        let joined = compiler.fields(&["a,b".to_string()], "");
        let split = compiler.fields(&["a".to_string(), "b".to_string()], "");
        assert_eq!(joined, "\"a,b\"");
        assert_eq!(split, "\"a\", \"b\"");
    }
}
