//! BibTeX parsing tool
//!
//! Accepts either a path to a `.bib` file or raw BibTeX text starting with `@`,
//! and returns the entries as pretty-printed JSON objects with `ENTRYTYPE`,
//! `ID` and one lower-cased key per field.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};

use super::BIBTEX_PARSE;
use crate::registry::Tool;

const DESCRIPTION: &str =
    "Parse a .bib file path or raw BibTeX text (starting with '@') and return the entries as JSON.";

pub type BibEntry = Map<String, Value>;

pub fn tool() -> Tool {
    Tool::new(BIBTEX_PARSE, DESCRIPTION, parse_bibtex_input)
}

/// Tool entry point: raw BibTeX or a path to a `.bib` file
pub fn parse_bibtex_input(input: &str) -> Result<String, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("ERROR: Expected path to a .bib file or raw BibTeX content.".to_string());
    }

    let text = if input.starts_with('@') {
        input.to_string()
    } else {
        let path = Path::new(input);
        if !path.exists() {
            return Err(format!("ERROR: BibTeX file not found: {}", input));
        }
        std::fs::read_to_string(path).map_err(|e| format!("ERROR reading {}: {}", input, e))?
    };

    let entries = parse_bibtex(&text).map_err(|e| format!("BibTeX parsing error: {}", e))?;
    let json: Vec<Value> = entries.into_iter().map(Value::Object).collect();
    serde_json::to_string_pretty(&json).map_err(|e| format!("BibTeX parsing error: {}", e))
}

/// Parse all entries in `text`. `@string` macros are expanded; `@comment` and
/// `@preamble` blocks are skipped.
pub fn parse_bibtex(text: &str) -> Result<Vec<BibEntry>, String> {
    Parser::new(text).parse()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    strings: HashMap<String, String>,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            strings: HashMap::new(),
        }
    }

    fn parse(mut self) -> Result<Vec<BibEntry>, String> {
        let mut entries = Vec::new();
        while self.skip_to_entry() {
            self.pos += 1;
            let kind = self.identifier().to_lowercase();
            self.skip_ws();
            let close = match self.peek() {
                Some('{') => '}',
                Some('(') => ')',
                // Not an entry: an unbraced @comment or stray text
                _ => continue,
            };
            if kind.is_empty() {
                continue;
            }
            self.pos += 1;

            match kind.as_str() {
                "comment" | "preamble" => self.skip_block(close)?,
                "string" => {
                    let (name, value) = self.field()?;
                    self.strings.insert(name, value);
                    self.skip_ws();
                    self.expect(close)?;
                }
                _ => entries.push(self.entry(kind, close)?),
            }
        }
        Ok(entries)
    }

    fn entry(&mut self, kind: String, close: char) -> Result<BibEntry, String> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == ',' || c == close || c.is_whitespace() {
                break;
            }
            self.pos += 1;
        }
        let key: String = self.chars[start..self.pos].iter().collect();

        let mut entry = Map::new();
        entry.insert("ENTRYTYPE".to_string(), Value::String(kind));
        entry.insert("ID".to_string(), Value::String(key));

        loop {
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.peek() == Some(close) {
                        continue;
                    }
                    let (name, value) = self.field()?;
                    entry.insert(name, Value::String(value));
                }
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(entry);
                }
                Some(c) => return Err(format!("unexpected '{}' at offset {}", c, self.pos)),
                None => return Err("unterminated entry".to_string()),
            }
        }
    }

    /// `name = value # value ...`
    fn field(&mut self) -> Result<(String, String), String> {
        self.skip_ws();
        let name = self.identifier().to_lowercase();
        if name.is_empty() {
            return Err(format!("expected field name at offset {}", self.pos));
        }
        self.skip_ws();
        self.expect('=')?;

        let mut value = String::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('{') => {
                    self.pos += 1;
                    value.push_str(&self.braced()?);
                }
                Some('"') => {
                    self.pos += 1;
                    value.push_str(&self.quoted()?);
                }
                Some(c) if c.is_ascii_digit() => {
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.pos += 1;
                    }
                    value.extend(&self.chars[start..self.pos]);
                }
                Some(_) => {
                    let word = self.identifier();
                    if word.is_empty() {
                        return Err(format!("expected value for '{}'", name));
                    }
                    let expanded = self
                        .strings
                        .get(&word.to_lowercase())
                        .cloned()
                        .unwrap_or(word);
                    value.push_str(&expanded);
                }
                None => return Err(format!("unterminated value for '{}'", name)),
            }
            self.skip_ws();
            if self.peek() == Some('#') {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok((name, normalize_ws(&value)))
    }

    /// Contents up to the matching `}`; nested braces are kept
    fn braced(&mut self) -> Result<String, String> {
        let start = self.pos;
        let mut depth = 1;
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.chars[start..self.pos - 1].iter().collect());
                    }
                }
                _ => {}
            }
        }
        Err("unbalanced braces".to_string())
    }

    /// Contents up to the closing `"` outside any braces
    fn quoted(&mut self) -> Result<String, String> {
        let start = self.pos;
        let mut depth = 0;
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                '"' if depth == 0 => {
                    return Ok(self.chars[start..self.pos - 1].iter().collect());
                }
                _ => {}
            }
        }
        Err("unterminated quoted value".to_string())
    }

    fn skip_block(&mut self, close: char) -> Result<(), String> {
        let open = if close == '}' { '{' } else { '(' };
        let mut depth = 1;
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        Err("unterminated block".to_string())
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || "_-:./+".contains(c))
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected '{}' at offset {}", expected, self.pos))
        }
    }

    /// Advance to the next `@` that can open an entry; false at end of input.
    /// An `@` inside a word (an email address in comment text) does not count.
    fn skip_to_entry(&mut self) -> bool {
        while let Some(c) = self.peek() {
            if c == '@' {
                let in_word = self.pos > 0 && self.chars[self.pos - 1].is_alphanumeric();
                if !in_word {
                    return true;
                }
            }
            self.pos += 1;
        }
        false
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }
}

fn normalize_ws(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
@comment{ exported by a reference manager }
@string{ jpl = "Journal of Propulsion" }

@Article{agni2022,
  title   = {Design of a {3D} Printed
             Semi-Cryogenic Engine},
  Author  = "Rao, A. and Ravi, S.",
  journal = jpl,
  year    = 2022,
  note    = "Vol. " # "4",
}

@misc(launch,
  howpublished = {\url{https://example.org}}
)
"#;

    #[test]
    fn test_parse_entries() {
        let entries = parse_bibtex(SAMPLE).unwrap();
        assert_eq!(entries.len(), 2);

        let article = &entries[0];
        assert_eq!(article["ENTRYTYPE"], "article");
        assert_eq!(article["ID"], "agni2022");
        assert_eq!(article["title"], "Design of a {3D} Printed Semi-Cryogenic Engine");
        assert_eq!(article["author"], "Rao, A. and Ravi, S.");
        assert_eq!(article["journal"], "Journal of Propulsion");
        assert_eq!(article["year"], "2022");
        assert_eq!(article["note"], "Vol. 4");

        let misc = &entries[1];
        assert_eq!(misc["ENTRYTYPE"], "misc");
        assert_eq!(misc["ID"], "launch");
        assert_eq!(misc["howpublished"], "\\url{https://example.org}");
    }

    #[test]
    fn test_email_in_comment_text_is_ignored() {
        let text = "@article{a1, title = {Rockets}}\n\
                    % contact: me@example.com\n\
                    @book{b1, title = {Engines}}";
        let entries = parse_bibtex(text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["ID"], "b1");
    }

    #[test]
    fn test_unbraced_comment_is_ignored() {
        let text = "@comment This file was generated\n@book{b1, title = {Engines}}";
        let entries = parse_bibtex(text).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["title"], "Engines");
    }

    #[test]
    fn test_stray_at_sign_between_entries() {
        let text = "@misc{m1, note = {a}}\n@ not an entry\n@misc{m2, note = {b}}";
        let entries = parse_bibtex(text).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_unbalanced_braces_error() {
        let err = parse_bibtex("@book{key, title = {Open").unwrap_err();
        assert!(err.contains("unbalanced"));
    }

    #[test]
    fn test_empty_text_has_no_entries() {
        assert!(parse_bibtex("no entries here").unwrap().is_empty());
    }

    #[test]
    fn test_input_raw_text() {
        let out = parse_bibtex_input("@book{k1, title={Rockets}}").unwrap();
        let json: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json[0]["title"], "Rockets");
        assert_eq!(json[0]["ID"], "k1");
    }

    #[test]
    fn test_input_file_path() {
        let mut file = tempfile::Builder::new().suffix(".bib").tempfile().unwrap();
        write!(file, "{}", SAMPLE).unwrap();
        let out = parse_bibtex_input(file.path().to_str().unwrap()).unwrap();
        let json: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_input_missing_file() {
        let err = parse_bibtex_input("/nonexistent/refs.bib").unwrap_err();
        assert_eq!(err, "ERROR: BibTeX file not found: /nonexistent/refs.bib");
    }

    #[test]
    fn test_input_empty() {
        assert!(parse_bibtex_input("   ").unwrap_err().starts_with("ERROR: Expected"));
    }
}
