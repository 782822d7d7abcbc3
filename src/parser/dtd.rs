//! Scan the internal subset of a document type declaration.
//!
//! Only general entity declarations are kept. Element, attribute-list and
//! notation declarations, parameter entities, comments and processing
//! instructions are skipped.

use std::collections::{HashMap, hash_map::Entry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntityValue {
    /// The literal value with its character references replaced. General
    /// entity references are kept for the reader to expand.
    Internal(String),
    External {
        public_id: Option<String>,
        system_id: String,
    },
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_blanks(&mut self) -> bool {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches([' ', '\t', '\r', '\n']);
        self.pos += rest.len() - trimmed.len();
        rest.len() != trimmed.len()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_past(&mut self, token: &str) -> Result<(), String> {
        match self.rest().find(token) {
            Some(at) => {
                self.pos += at + token.len();
                Ok(())
            }
            None => Err(format!("'{token}' is missing in the internal subset")),
        }
    }

    /// Skip to the end of the current markup declaration, stepping over
    /// quoted literals.
    fn skip_declaration(&mut self) -> Result<(), String> {
        let mut quote = None;
        for (i, c) in self.rest().char_indices() {
            match (quote, c) {
                (None, '"' | '\'') => quote = Some(c),
                (Some(q), c) if q == c => quote = None,
                (None, '>') => {
                    self.pos += i + 1;
                    return Ok(());
                }
                _ => {}
            }
        }
        Err("unterminated markup declaration".to_owned())
    }

    fn name(&mut self) -> Result<&'a str, String> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '>' | '"' | '\'' | '%' | ';'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err("a name is expected in the internal subset".to_owned());
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn quoted(&mut self) -> Result<&'a str, String> {
        let rest = self.rest();
        let Some(quote) = rest.chars().next().filter(|&c| c == '"' || c == '\'') else {
            return Err("a quoted literal is expected".to_owned());
        };
        let body = &rest[1..];
        let end = body
            .find(quote)
            .ok_or_else(|| "unterminated literal".to_owned())?;
        self.pos += end + 2;
        Ok(&body[..end])
    }

    fn entity_declaration(&mut self) -> Result<Option<(&'a str, EntityValue)>, String> {
        self.skip_blanks();
        if self.rest().starts_with('%') {
            self.skip_declaration()?;
            return Ok(None);
        }
        let name = self.name()?;
        if !self.skip_blanks() {
            return Err(format!("space is required after the entity name '{name}'"));
        }
        let value = if self.eat("SYSTEM") {
            self.skip_blanks();
            EntityValue::External {
                public_id: None,
                system_id: self.quoted()?.to_owned(),
            }
        } else if self.eat("PUBLIC") {
            self.skip_blanks();
            let public_id = self.quoted()?.to_owned();
            self.skip_blanks();
            EntityValue::External {
                public_id: Some(public_id),
                system_id: self.quoted()?.to_owned(),
            }
        } else {
            EntityValue::Internal(replace_char_refs(self.quoted()?)?)
        };
        self.skip_blanks();
        if self.eat("NDATA") {
            // unparsed entities never appear in content
            self.skip_declaration()?;
            return Ok(None);
        }
        if !self.eat(">") {
            return Err(format!("'>' is expected at the end of the entity '{name}'"));
        }
        Ok(Some((name, value)))
    }
}

/// Replace the `&#N;` and `&#xH;` references of an entity literal.
fn replace_char_refs(literal: &str) -> Result<String, String> {
    let mut out = String::with_capacity(literal.len());
    let mut rest = literal;
    while let Some(at) = rest.find("&#") {
        out.push_str(&rest[..at]);
        let body = &rest[at + 2..];
        let end = body
            .find(';')
            .ok_or_else(|| format!("unterminated character reference in '{literal}'"))?;
        let digits = &body[..end];
        let code = match digits.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => digits.parse::<u32>(),
        };
        let c = code
            .ok()
            .filter(|_| !digits.starts_with(['+', '-']))
            .and_then(char::from_u32)
            .filter(|&c| c != '\0')
            .ok_or_else(|| format!("invalid character reference '&#{digits};'"))?;
        out.push(c);
        rest = &body[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Collect the general entities declared in the content of a `DOCTYPE`.
///
/// The first declaration of an entity is binding.
pub(crate) fn parse_doctype(content: &str) -> Result<HashMap<String, EntityValue>, String> {
    let mut entities = HashMap::new();
    let (Some(open), Some(close)) = (content.find('['), content.rfind(']')) else {
        return Ok(entities);
    };
    if close < open {
        return Err("malformed internal subset".to_owned());
    }

    let mut scanner = Scanner {
        input: &content[open + 1..close],
        pos: 0,
    };
    loop {
        scanner.skip_blanks();
        if scanner.eof() {
            break;
        }
        if scanner.eat("<!--") {
            scanner.skip_past("-->")?;
        } else if scanner.eat("<?") {
            scanner.skip_past("?>")?;
        } else if scanner.eat("<!ENTITY") {
            if let Some((name, value)) = scanner.entity_declaration()? {
                if let Entry::Vacant(entry) = entities.entry(name.to_owned()) {
                    entry.insert(value);
                }
            }
        } else if scanner.eat("<!") {
            scanner.skip_declaration()?;
        } else if scanner.eat("%") {
            scanner.skip_past(";")?;
        } else {
            return Err("unexpected content in the internal subset".to_owned());
        }
    }
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_entities() {
        let content = r#" xsl:stylesheet [
            <!-- a comment with <!ENTITY fake "x"> inside -->
            <!ELEMENT xsl:stylesheet ANY>
            <!ATTLIST xsl:stylesheet version CDATA "1.0">
            <!ENTITY copy "&#169; ACME">
            <!ENTITY copy "ignored">
            <!ENTITY % pe "<!ENTITY hidden 'x'>">
            %pe;
            <!ENTITY common SYSTEM "common.ent">
            <!ENTITY pub PUBLIC "-//ACME//Common//EN" 'pub.ent'>
            <!ENTITY logo SYSTEM "logo.png" NDATA png>
            <?pi data?>
        ]"#;
        let entities = parse_doctype(content).unwrap();
        assert_eq!(entities.len(), 3);
        assert_eq!(
            entities["copy"],
            EntityValue::Internal("\u{a9} ACME".to_owned())
        );
        assert_eq!(
            entities["common"],
            EntityValue::External {
                public_id: None,
                system_id: "common.ent".to_owned()
            }
        );
        assert_eq!(
            entities["pub"],
            EntityValue::External {
                public_id: Some("-//ACME//Common//EN".to_owned()),
                system_id: "pub.ent".to_owned()
            }
        );
    }

    #[test]
    fn character_references_are_replaced_in_literals() {
        const CASES: &[(&str, &str)] = &[
            ("plain", "plain"),
            ("&#169; ACME", "\u{a9} ACME"),
            ("&#xA9;&#x41;", "\u{a9}A"),
            ("x&copy;y", "x&copy;y"),
            ("&#38;amp;", "&amp;"),
        ];
        for &(literal, expected) in CASES {
            let content = format!(" r [<!ENTITY e '{literal}'>]");
            let entities = parse_doctype(&content).unwrap();
            assert_eq!(entities["e"], EntityValue::Internal(expected.to_owned()), "{literal}");
        }

        for literal in ["&#169", "&#xZZ;", "&#0;", "&#-1;"] {
            let content = format!(" r [<!ENTITY e '{literal}'>]");
            assert!(parse_doctype(&content).is_err(), "{literal}");
        }
    }

    #[test]
    fn doctype_without_subset() {
        assert!(parse_doctype(" root SYSTEM 'root.dtd'").unwrap().is_empty());
    }

    #[test]
    fn malformed_subsets() {
        const CASES: &[&str] = &[
            " r [ <!ENTITY a \"unterminated> ]",
            " r [ <!ENTITY a> ]",
            " r [ <!ENTITY a 'x' junk> ]",
            " r [ stray ]",
        ];
        for &content in CASES {
            assert!(parse_doctype(content).is_err(), "{content}");
        }
    }
}
