//! Script data model (§3 "Instruction model"), generalized from
//! `thecl_instr_t`/`thecl_sub_t`/`thecl_t` in `thecl.h`: one parameter, one
//! instruction, one subroutine, one module, each carrying exactly the
//! fields the lifter and lowerer both need, independent of which on-disk
//! instruction header produced them.

use crate::value::Value;

/// One instruction parameter: a typed value plus whether its "on stack"
/// mask bit was set (`param->stack` in the original).
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub type_tag: char,
    pub value: Value,
    pub on_stack: bool,
}

impl Param {
    pub fn new(type_tag: char, value: Value) -> Self {
        Self {
            type_tag,
            value,
            on_stack: false,
        }
    }
}

/// A time marker, rank marker, label, or a real instruction — the four
/// `thecl_instr_type` variants, modeled as an enum instead of a tagged
/// union so each kind only carries the fields it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Instr(Instruction),
    Time(u32),
    Rank(u8),
    Label(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: u16,
    pub params: Vec<Param>,
    /// Byte offset from the start of the sub's instruction stream;
    /// filled in by the lifter, recomputed by the lowerer during label
    /// resolution.
    pub offset: u32,
}

impl Instruction {
    pub fn new(opcode: u16) -> Self {
        Self {
            opcode,
            params: Vec::new(),
            offset: 0,
        }
    }
}

/// A resolved jump target: byte offset plus the time value in effect at
/// that offset (`thecl_label_t`).
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
    pub offset: i32,
    pub time: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sub {
    pub name: String,
    /// Declared parameter types (`S`/`f`/`?` per parameter), used by
    /// sub-call validation. `None` for old-family subs, which have no
    /// declared signature.
    pub format: Option<String>,
    pub is_inline: bool,
    pub forward_declaration: bool,
    pub items: Vec<Item>,
}

impl Sub {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: None,
            is_inline: false,
            forward_declaration: false,
            items: Vec::new(),
        }
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.items.iter().filter_map(|i| match i {
            Item::Instr(ins) => Some(ins),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub version: u32,
    pub anim_names: Vec<String>,
    pub ecli_names: Vec<String>,
    pub include_names: Vec<String>,
    pub subs: Vec<Sub>,
    pub no_warn: bool,
}

impl Module {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    pub fn find_sub(&self, name: &str) -> Option<&Sub> {
        self.subs.iter().find(|s| s.name == name)
    }
}
