//! D3D9 (SM2/SM3) token stream reflection.

pub mod ctab;

use std::collections::{BTreeMap, BTreeSet};

use shader_harness::{
    Attribute, Constant, ConstantValue, Diagnostic, Sampler, SamplerType, ShaderKind,
    ShaderReflection, Uniform, UniformType, Usage,
};
use thiserror::Error;

use self::ctab::{parse_ctab, ConstantTable, CtabError, RegisterSet, CTAB_FOURCC};
use crate::profile;

const OPCODE_DCL: u32 = 0x1F;
const OPCODE_DEFB: u32 = 0x2F;
const OPCODE_DEFI: u32 = 0x30;
const OPCODE_DEF: u32 = 0x51;
const OPCODE_COMMENT: u32 = 0xFFFE;
const TOKEN_END: u32 = 0x0000_FFFF;

const REG_INPUT: u8 = 1;
const REG_CONST: u8 = 2;
const REG_TEXTURE: u8 = 3;
const REG_CONSTINT: u8 = 7;
const REG_CONST2: u8 = 11;
const REG_CONST3: u8 = 12;
const REG_CONST4: u8 = 13;
const REG_CONSTBOOL: u8 = 14;
const REG_SAMPLER: u8 = 10;

const RELATIVE_ADDRESSING: u32 = 0x2000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BytecodeError {
    #[error("Shader bytecode is empty")]
    Empty,
    #[error("Shader bytecode length {0} is not a multiple of 4")]
    Misaligned(usize),
    #[error("Unexpected EOF")]
    UnexpectedEof,
    #[error("Unsupported shader version token 0x{0:08X}")]
    UnsupportedVersion(u32),
    #[error("Shader model {major}.{minor} is not supported")]
    UnsupportedModel { major: u8, minor: u8 },
    #[error("Missing END token")]
    MissingEnd,
    #[error("Unknown usage {0} in dcl")]
    UnknownUsage(u32),
    #[error("Unsupported sampler texture type {0}")]
    UnsupportedSamplerType(u32),
    #[error(transparent)]
    Ctab(#[from] CtabError),
}

/// A [`BytecodeError`] and the 1-based token number it was detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedError {
    pub position: u32,
    pub error: BytecodeError,
}

impl PositionedError {
    fn at(index: usize, error: BytecodeError) -> Self {
        Self {
            position: u32::try_from(index + 1).unwrap_or(u32::MAX),
            error,
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        Diagnostic::new(None, self.position, self.error.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
struct Register {
    ty: u8,
    number: u32,
    relative: bool,
}

impl Register {
    fn decode(token: u32) -> Self {
        let ty = (((token >> 28) & 0x7) | ((token >> 8) & 0x18)) as u8;
        Self {
            ty,
            number: token & 0x7FF,
            relative: token & RELATIVE_ADDRESSING != 0,
        }
    }

    /// Constant register file and flattened index, for `c#`, `i#` and `b#`.
    fn constant(self) -> Option<(UniformType, u32)> {
        Some(match self.ty {
            REG_CONST => (UniformType::Float, self.number),
            REG_CONST2 => (UniformType::Float, self.number + 2048),
            REG_CONST3 => (UniformType::Float, self.number + 4096),
            REG_CONST4 => (UniformType::Float, self.number + 6144),
            REG_CONSTINT => (UniformType::Int, self.number),
            REG_CONSTBOOL => (UniformType::Bool, self.number),
            _ => return None,
        })
    }
}

fn register_set(ty: UniformType) -> RegisterSet {
    match ty {
        UniformType::Float => RegisterSet::Float4,
        UniformType::Int => RegisterSet::Int4,
        UniformType::Bool => RegisterSet::Bool,
    }
}

#[derive(Debug, Default)]
struct Scan {
    kind: ShaderKind,
    major: u8,
    minor: u8,
    instruction_count: u32,
    attributes: Vec<Attribute>,
    constants: Vec<Constant>,
    /// Referenced constant registers; the flag records relative addressing.
    used: BTreeMap<(UniformType, u32), bool>,
    samplers: Vec<(u32, SamplerType)>,
    ctab: Option<ConstantTable>,
}

fn to_words(bytes: &[u8]) -> Result<Vec<u32>, PositionedError> {
    if bytes.is_empty() {
        return Err(PositionedError::at(0, BytecodeError::Empty));
    }
    if bytes.len() % 4 != 0 {
        return Err(PositionedError::at(
            bytes.len() / 4,
            BytecodeError::Misaligned(bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn operands(words: &[u32], pos: usize, len: usize) -> Result<&[u32], PositionedError> {
    words
        .get(pos + 1..pos + 1 + len)
        .ok_or_else(|| PositionedError::at(words.len(), BytecodeError::UnexpectedEof))
}

fn scan(bytes: &[u8]) -> Result<Scan, PositionedError> {
    let words = to_words(bytes)?;
    let version = words[0];
    let kind = match version >> 16 {
        0xFFFE => ShaderKind::Vertex,
        0xFFFF => ShaderKind::Pixel,
        _ => {
            return Err(PositionedError::at(
                0,
                BytecodeError::UnsupportedVersion(version),
            ))
        }
    };
    let major = ((version >> 8) & 0xFF) as u8;
    let minor = (version & 0xFF) as u8;
    if !matches!((major, minor), (2, 0) | (2, 1) | (3, 0)) {
        return Err(PositionedError::at(
            0,
            BytecodeError::UnsupportedModel { major, minor },
        ));
    }

    let mut out = Scan {
        kind,
        major,
        minor,
        ..Scan::default()
    };
    let mut pos = 1;
    loop {
        let Some(&token) = words.get(pos) else {
            return Err(PositionedError::at(pos, BytecodeError::MissingEnd));
        };
        if token == TOKEN_END {
            break;
        }

        let opcode = token & 0xFFFF;
        if opcode == OPCODE_COMMENT {
            let len = ((token >> 16) & 0x7FFF) as usize;
            let payload = operands(&words, pos, len)?;
            if payload.first() == Some(&CTAB_FOURCC) {
                let start = (pos + 2) * 4;
                let end = (pos + 1 + len) * 4;
                let table = parse_ctab(&bytes[start..end])
                    .map_err(|e| PositionedError::at(pos, e.into()))?;
                tracing::debug!(
                    constants = table.constants.len(),
                    creator = ?table.creator,
                    target = ?table.target,
                    "found CTAB"
                );
                out.ctab = Some(table);
            }
            pos += 1 + len;
            continue;
        }

        let len = ((token >> 24) & 0x0F) as usize;
        let ops = operands(&words, pos, len)?;
        match opcode {
            OPCODE_DCL => out.declare(ops, pos)?,
            OPCODE_DEF | OPCODE_DEFI | OPCODE_DEFB => out.define(opcode, ops),
            _ => {
                out.instruction_count += 1;
                for &op in ops.iter().filter(|&&op| op & 0x8000_0000 != 0) {
                    let reg = Register::decode(op);
                    if let Some(key) = reg.constant() {
                        let relative = out.used.entry(key).or_insert(false);
                        *relative |= reg.relative;
                    }
                }
            }
        }
        pos += 1 + len;
    }

    Ok(out)
}

impl Scan {
    fn declare(&mut self, ops: &[u32], pos: usize) -> Result<(), PositionedError> {
        let (Some(&decl), Some(&dst)) = (ops.first(), ops.get(1)) else {
            return Err(PositionedError::at(pos, BytecodeError::UnexpectedEof));
        };
        let reg = Register::decode(dst);
        let legacy_pixel = self.kind == ShaderKind::Pixel && self.major < 3;

        match reg.ty {
            REG_INPUT if legacy_pixel => self.attributes.push(Attribute {
                usage: Usage::Color,
                index: reg.number,
                name: None,
            }),
            REG_TEXTURE if legacy_pixel => self.attributes.push(Attribute {
                usage: Usage::TexCoord,
                index: reg.number,
                name: None,
            }),
            REG_INPUT => {
                let raw = decl & 0x1F;
                let usage = u8::try_from(raw)
                    .ok()
                    .and_then(Usage::from_raw)
                    .ok_or_else(|| PositionedError::at(pos + 1, BytecodeError::UnknownUsage(raw)))?;
                self.attributes.push(Attribute {
                    usage,
                    index: (decl >> 16) & 0xF,
                    name: None,
                });
            }
            REG_SAMPLER => {
                let ty = match (decl >> 27) & 0xF {
                    2 => SamplerType::TwoD,
                    3 => SamplerType::Cube,
                    4 => SamplerType::Volume,
                    other => {
                        return Err(PositionedError::at(
                            pos + 1,
                            BytecodeError::UnsupportedSamplerType(other),
                        ))
                    }
                };
                self.samplers.push((reg.number, ty));
            }
            _ => {}
        }
        Ok(())
    }

    fn define(&mut self, opcode: u32, ops: &[u32]) {
        let Some((&dst, values)) = ops.split_first() else {
            return;
        };
        let reg = Register::decode(dst);
        let Some((_, index)) = reg.constant() else {
            return;
        };
        let mut four = [0u32; 4];
        for (slot, v) in four.iter_mut().zip(values) {
            *slot = *v;
        }
        let value = match opcode {
            OPCODE_DEF => ConstantValue::Float(four.map(f32::from_bits)),
            OPCODE_DEFI => ConstantValue::Int(four.map(|v| v as i32)),
            _ => ConstantValue::Bool(four[0] != 0),
        };
        self.constants.push(Constant { index, value });
    }

    fn uniforms(&self) -> Vec<Uniform> {
        let defined: BTreeSet<(UniformType, u32)> = self
            .constants
            .iter()
            .map(|c| (c.value.uniform_type(), c.index))
            .collect();
        let mut uniforms: BTreeMap<(UniformType, u32), Uniform> = BTreeMap::new();

        for (&(ty, register), &relative) in &self.used {
            let entry = self
                .ctab
                .as_ref()
                .and_then(|t| t.find(register_set(ty), register));
            let is_defined = defined.contains(&(ty, register));

            let uniform = match entry {
                Some(entry) if relative || entry.register_count > 1 => Uniform {
                    index: u32::from(entry.register_index),
                    ty,
                    array_count: u32::from(entry.register_count),
                    constant: is_defined,
                    name: Some(entry.name.clone()),
                },
                _ if is_defined && !relative => continue,
                _ if is_defined => {
                    // Relative access into a block of defined constants: the whole contiguous
                    // run is exposed as one constant array.
                    let mut start = register;
                    while start > 0 && defined.contains(&(ty, start - 1)) {
                        start -= 1;
                    }
                    let mut end = register + 1;
                    while defined.contains(&(ty, end)) {
                        end += 1;
                    }
                    let count = end - start;
                    Uniform {
                        index: start,
                        ty,
                        array_count: if count > 1 { count } else { 0 },
                        constant: true,
                        name: None,
                    }
                }
                _ => Uniform {
                    index: register,
                    ty,
                    array_count: 0,
                    constant: false,
                    name: entry.map(|e| e.name.clone()),
                },
            };
            uniforms.entry((ty, uniform.index)).or_insert(uniform);
        }

        uniforms.into_values().collect()
    }

    fn samplers(&self) -> Vec<Sampler> {
        self.samplers
            .iter()
            .map(|&(index, ty)| Sampler {
                index,
                ty,
                name: self
                    .ctab
                    .as_ref()
                    .and_then(|t| t.find(RegisterSet::Sampler, index))
                    .map(|e| e.name.clone()),
            })
            .collect()
    }
}

/// Reflects a single D3D9 shader.
pub fn parse_shader(profile: &str, bytecode: &[u8]) -> ShaderReflection {
    if !profile::is_supported(profile) {
        return ShaderReflection::failed(
            profile,
            vec![Diagnostic::new(None, 0, profile::unsupported_message(profile))],
        );
    }

    match scan(bytecode) {
        Ok(scan) => ShaderReflection {
            profile: profile.to_owned(),
            kind: scan.kind,
            major: scan.major,
            minor: scan.minor,
            instruction_count: scan.instruction_count,
            uniforms: scan.uniforms(),
            samplers: scan.samplers(),
            attributes: scan.attributes,
            constants: scan.constants,
            output: None,
            diagnostics: Vec::new(),
        },
        Err(err) => {
            tracing::debug!(position = err.position, error = %err.error, "shader parse failed");
            ShaderReflection::failed(profile, vec![err.into_diagnostic()])
        }
    }
}
