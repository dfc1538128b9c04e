//! Field-reference tokenizer.
//!
//! Markup is cut on the left delimiter. Every piece after the first starts
//! with a field tag that runs up to the first right delimiter; the rest of
//! the piece is literal text. The first piece is literal text unless it
//! contains a right delimiter, in which case it is read as a tag too.
//!
//! A piece with no right delimiter is all tag and has no trailing text.
//! Tokens borrow from the scanned markup only, so text produced by a
//! substitution is never scanned again.

/// One token of scanned markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Field(FieldRef<'a>),
}

/// A field tag: `name|filter|filter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef<'a> {
    pub name: &'a str,
    pub filters: Vec<&'a str>,
}

impl<'a> FieldRef<'a> {
    pub fn parse(tag: &'a str) -> Self {
        let mut parts = tag.split('|');
        let name = parts.next().unwrap_or_default();
        FieldRef {
            name,
            filters: parts.collect(),
        }
    }
}

/// Split `markup` into literal text and field references.
pub fn tokenize<'a>(markup: &'a str, ldelim: &str, rdelim: &str) -> Vec<Segment<'a>> {
    let mut out = Vec::new();
    let mut pieces = markup.split(ldelim);

    if let Some(first) = pieces.next() {
        if first.contains(rdelim) {
            push_tag_piece(first, rdelim, &mut out);
        } else if !first.is_empty() {
            out.push(Segment::Text(first));
        }
    }
    for piece in pieces {
        push_tag_piece(piece, rdelim, &mut out);
    }
    out
}

fn push_tag_piece<'a>(piece: &'a str, rdelim: &str, out: &mut Vec<Segment<'a>>) {
    let (tag, trailing) = piece.split_once(rdelim).unwrap_or((piece, ""));
    out.push(Segment::Field(FieldRef::parse(tag)));
    if !trailing.is_empty() {
        out.push(Segment::Text(trailing));
    }
}

/// True when `markup` holds at least one field reference.
pub fn has_fields(markup: &str, ldelim: &str, rdelim: &str) -> bool {
    markup.contains(ldelim) || markup.contains(rdelim)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(name: &'a str, filters: &[&'a str]) -> Segment<'a> {
        Segment::Field(FieldRef {
            name,
            filters: filters.to_vec(),
        })
    }

    #[test]
    fn plain_text_is_one_segment() {
        assert_eq!(tokenize("<p>hi</p>", "[[", "]]"), vec![Segment::Text("<p>hi</p>")]);
        assert!(tokenize("", "[[", "]]").is_empty());
    }

    #[test]
    fn fields_and_text_alternate() {
        assert_eq!(
            tokenize("Hi [[name]], you weigh [[weight]] lbs", "[[", "]]"),
            vec![
                Segment::Text("Hi "),
                field("name", &[]),
                Segment::Text(", you weigh "),
                field("weight", &[]),
                Segment::Text(" lbs"),
            ]
        );
    }

    #[test]
    fn filters_split_on_pipe() {
        assert_eq!(
            tokenize("[[weight|sIfPlural|safe]]", "[[", "]]"),
            vec![field("weight", &["sIfPlural", "safe"])]
        );
    }

    #[test]
    fn unclosed_tag_swallows_rest_of_piece() {
        assert_eq!(
            tokenize("a [[name and more", "[[", "]]"),
            vec![Segment::Text("a "), field("name and more", &[])]
        );
    }

    #[test]
    fn leading_piece_with_right_delimiter_is_a_tag() {
        assert_eq!(
            tokenize("x]] y[[z]]", "[[", "]]"),
            vec![
                field("x", &[]),
                Segment::Text(" y"),
                field("z", &[])
            ]
        );
    }

    #[test]
    fn extra_right_delimiters_stay_in_text() {
        assert_eq!(
            tokenize("[[a]]b]]c", "[[", "]]"),
            vec![field("a", &[]), Segment::Text("b]]c")]
        );
    }

    #[test]
    fn custom_delimiters() {
        assert_eq!(
            tokenize("{{n|count}}!", "{{", "}}"),
            vec![field("n", &["count"]), Segment::Text("!")]
        );
        assert!(has_fields("{{n}}", "{{", "}}"));
        assert!(!has_fields("[[n]]", "{{", "}}"));
    }
}
