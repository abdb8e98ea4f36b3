//! Eclmap file parser, ported from `eclmap_load`/`control`/`set` in the
//! original `eclmap.c`.
//!
//! The text format is a sequence of `!section` control lines, each
//! followed by `id value` pairs until the next control line. `ins_names`
//! is the implicit default section when a file starts without one.

use crate::error::{Error, Result};
use crate::script::format::FormatOverrides;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    InsNames,
    InsSignatures,
    GvarNames,
    GvarTypes,
    TimelineInsNames,
    TimelineInsSignatures,
}

#[derive(Debug, Clone, Default)]
pub struct EclMap {
    pub ins_names: IndexMap<i32, String>,
    pub ins_signatures: IndexMap<i32, String>,
    pub gvar_names: IndexMap<i32, String>,
    pub gvar_types: IndexMap<i32, String>,
    pub timeline_ins_names: IndexMap<i32, String>,
    pub timeline_ins_signatures: IndexMap<i32, String>,
}

/// Identifiers may not start with a digit, may only contain
/// alphanumerics and underscore, and may not start with `ins_` (that
/// prefix is reserved for the fallback `ins_<id>` display name).
fn validate_ident(value: &str, linenum: usize) -> Result<()> {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => {
            return Err(Error::format(format!("eclmap line {linenum}: '{value}' isn't a valid identifier")))
        }
        None => return Err(Error::format(format!("eclmap line {linenum}: empty identifier"))),
        _ => {}
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::format(format!("eclmap line {linenum}: '{value}' isn't a valid identifier")));
    }
    if value.starts_with("ins_") {
        return Err(Error::format(format!("eclmap line {linenum}: value can't start with 'ins_'")));
    }
    Ok(())
}

fn validate_type(value: &str, linenum: usize) -> Result<()> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some('$'), None) | (Some('%'), None) => Ok(()),
        _ => Err(Error::format(format!("eclmap line {linenum}: unknown type '{value}'"))),
    }
}

pub fn parse(text: &str) -> Result<EclMap> {
    let mut map = EclMap::default();
    let mut section = Section::InsNames;

    for (i, raw_line) in text.lines().enumerate() {
        let linenum = i + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(control) = line.strip_prefix('!') {
            section = match control {
                "ins_names" => Section::InsNames,
                "ins_signatures" => Section::InsSignatures,
                "gvar_names" => Section::GvarNames,
                "gvar_types" => Section::GvarTypes,
                "timeline_ins_names" => Section::TimelineInsNames,
                "timeline_ins_signatures" => Section::TimelineInsSignatures,
                other => return Err(Error::format(format!("eclmap line {linenum}: unknown control line '!{other}'"))),
            };
            continue;
        }

        let mut parts = line.splitn(2, char::is_whitespace);
        let id_str = parts.next().unwrap_or("");
        let value = parts.next().unwrap_or("").trim().to_string();
        let id: i32 = id_str
            .parse()
            .map_err(|_| Error::format(format!("eclmap line {linenum}: expected an integer id, got '{id_str}'")))?;

        match section {
            Section::InsNames | Section::TimelineInsNames => validate_ident(&value, linenum)?,
            Section::GvarNames => validate_ident(&value, linenum)?,
            Section::GvarTypes => validate_type(&value, linenum)?,
            Section::InsSignatures | Section::TimelineInsSignatures => {}
        }

        let target = match section {
            Section::InsNames => &mut map.ins_names,
            Section::InsSignatures => &mut map.ins_signatures,
            Section::GvarNames => &mut map.gvar_names,
            Section::GvarTypes => &mut map.gvar_types,
            Section::TimelineInsNames => &mut map.timeline_ins_names,
            Section::TimelineInsSignatures => &mut map.timeline_ins_signatures,
        };
        target.insert(id, value);
    }

    Ok(map)
}

impl EclMap {
    /// Reverse lookup for the lowerer: the opcode id declared under `name`
    /// in `!ins_names`, if any. `IndexMap`'s iteration order matches file
    /// declaration order, so the first match wins on a duplicate name the
    /// same way the last `insert` wins on a duplicate id.
    pub fn ins_id(&self, name: &str) -> Option<i32> {
        self.ins_names.iter().find(|(_, v)| v.as_str() == name).map(|(&id, _)| id)
    }

    /// Projects the signature sections into the [`FormatOverrides`] the
    /// format-resolution chain consults first.
    pub fn to_format_overrides(&self) -> FormatOverrides {
        FormatOverrides {
            signatures: self
                .ins_signatures
                .iter()
                .filter_map(|(&id, v)| u16::try_from(id).ok().map(|id| (id, v.clone())))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_as_the_implicit_default_section() {
        let map = parse("0 ins_initialize_wait\n1 ins_delete\n").unwrap();
        assert_eq!(map.ins_names.get(&0).unwrap(), "ins_initialize_wait");
        assert_eq!(map.ins_names.len(), 2);
    }

    #[test]
    fn switches_sections_on_control_lines() {
        let map = parse("!ins_signatures\n0 SSff\n!gvar_types\n-1 $\n").unwrap();
        assert_eq!(map.ins_signatures.get(&0).unwrap(), "SSff");
        assert_eq!(map.gvar_types.get(&-1).unwrap(), "$");
    }

    #[test]
    fn rejects_identifier_starting_with_ins_prefix() {
        assert!(parse("0 ins_foo\n").is_err());
    }

    #[test]
    fn rejects_unknown_control_line() {
        assert!(parse("!not_a_real_section\n0 x\n").is_err());
    }

    #[test]
    fn rejects_malformed_gvar_type() {
        assert!(parse("!gvar_types\n-1 int\n").is_err());
    }
}
