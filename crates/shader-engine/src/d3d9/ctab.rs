//! `CTAB` constant table embedded in a D3D9 comment token.

use thiserror::Error;

pub const CTAB_FOURCC: u32 = u32::from_le_bytes(*b"CTAB");

const HEADER_LEN: usize = 28;
const ENTRY_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterSet {
    Bool,
    Int4,
    Float4,
    Sampler,
}

impl RegisterSet {
    fn from_raw(raw: u16) -> Option<Self> {
        Some(match raw {
            0 => Self::Bool,
            1 => Self::Int4,
            2 => Self::Float4,
            3 => Self::Sampler,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtabConstant {
    pub name: String,
    pub register_set: RegisterSet,
    pub register_index: u16,
    pub register_count: u16,
}

impl CtabConstant {
    pub fn covers(&self, set: RegisterSet, register: u32) -> bool {
        let start = u32::from(self.register_index);
        let end = start + u32::from(self.register_count.max(1));
        self.register_set == set && (start..end).contains(&register)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantTable {
    pub creator: Option<String>,
    pub target: Option<String>,
    pub constants: Vec<CtabConstant>,
}

impl ConstantTable {
    pub fn find(&self, set: RegisterSet, register: u32) -> Option<&CtabConstant> {
        self.constants.iter().find(|c| c.covers(set, register))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CtabError {
    #[error("CTAB truncated: need {what} at {offset}..{end}, but the table is {len} bytes")]
    Truncated {
        what: &'static str,
        offset: usize,
        end: usize,
        len: usize,
    },
    #[error("CTAB string at offset {0} is missing a null terminator")]
    UnterminatedString(usize),
    #[error("CTAB constant '{name}' has unknown register set {raw}")]
    UnknownRegisterSet { name: String, raw: u16 },
}

fn read_bytes<'a>(
    bytes: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], CtabError> {
    let end = offset.saturating_add(len);
    bytes.get(offset..end).ok_or(CtabError::Truncated {
        what,
        offset,
        end,
        len: bytes.len(),
    })
}

fn read_u32(bytes: &[u8], offset: usize, what: &'static str) -> Result<u32, CtabError> {
    let b = read_bytes(bytes, offset, 4, what)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u16(bytes: &[u8], offset: usize, what: &'static str) -> Result<u16, CtabError> {
    let b = read_bytes(bytes, offset, 2, what)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn read_cstring(bytes: &[u8], offset: usize, what: &'static str) -> Result<String, CtabError> {
    let tail = bytes.get(offset..).ok_or(CtabError::Truncated {
        what,
        offset,
        end: offset,
        len: bytes.len(),
    })?;
    let nul = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(CtabError::UnterminatedString(offset))?;
    Ok(String::from_utf8_lossy(&tail[..nul]).into_owned())
}

/// Offset 0 means "absent" for the optional creator/target strings.
fn read_optional_cstring(
    bytes: &[u8],
    offset: u32,
    what: &'static str,
) -> Result<Option<String>, CtabError> {
    match offset {
        0 => Ok(None),
        off => read_cstring(bytes, off as usize, what).map(Some),
    }
}

/// Parses a constant table. `bytes` is the comment payload following the `CTAB` fourcc; all
/// offsets inside the table are relative to its start.
pub fn parse_ctab(bytes: &[u8]) -> Result<ConstantTable, CtabError> {
    read_bytes(bytes, 0, HEADER_LEN, "header")?;
    let creator = read_u32(bytes, 4, "creator offset")?;
    let count = read_u32(bytes, 12, "constant count")? as usize;
    let info = read_u32(bytes, 16, "constant info offset")? as usize;
    let target = read_u32(bytes, 24, "target offset")?;

    let mut constants = Vec::with_capacity(count.min(bytes.len() / ENTRY_LEN));
    for i in 0..count {
        let entry = info.saturating_add(i.saturating_mul(ENTRY_LEN));
        read_bytes(bytes, entry, ENTRY_LEN, "constant info entry")?;
        let name_offset = read_u32(bytes, entry, "name offset")? as usize;
        let raw_set = read_u16(bytes, entry + 4, "register set")?;
        let register_index = read_u16(bytes, entry + 6, "register index")?;
        let register_count = read_u16(bytes, entry + 8, "register count")?;

        let name = read_cstring(bytes, name_offset, "constant name")?;
        let register_set = RegisterSet::from_raw(raw_set).ok_or_else(|| {
            CtabError::UnknownRegisterSet {
                name: name.clone(),
                raw: raw_set,
            }
        })?;
        constants.push(CtabConstant {
            name,
            register_set,
            register_index,
            register_count,
        });
    }

    Ok(ConstantTable {
        creator: read_optional_cstring(bytes, creator, "creator")?,
        target: read_optional_cstring(bytes, target, "target")?,
        constants,
    })
}
