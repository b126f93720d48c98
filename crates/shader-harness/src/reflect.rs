//! Reflection data returned by bytecode parsers.

use crate::diagnostic::Diagnostic;
use crate::engine::BytecodeParser;

/// Leading bytes of an effect bundle (`0xFEFF0901` little-endian).
///
/// This is a heuristic inherited from existing tooling and has not been checked against an
/// official format description; anything else is treated as a single compiled shader.
pub const EFFECT_MAGIC: [u8; 4] = [0x01, 0x09, 0xFF, 0xFE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShaderKind {
    #[default]
    Unknown,
    Pixel,
    Vertex,
    Geometry,
}

impl ShaderKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Pixel => "pixel",
            Self::Vertex => "vertex",
            Self::Geometry => "geometry",
        }
    }
}

/// Vertex/pixel input semantic, in `D3DDECLUSAGE` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Usage {
    Position,
    BlendWeight,
    BlendIndices,
    Normal,
    PointSize,
    TexCoord,
    Tangent,
    Binormal,
    TessFactor,
    PositionT,
    Color,
    Fog,
    Depth,
    Sample,
}

impl Usage {
    pub fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Position,
            1 => Self::BlendWeight,
            2 => Self::BlendIndices,
            3 => Self::Normal,
            4 => Self::PointSize,
            5 => Self::TexCoord,
            6 => Self::Tangent,
            7 => Self::Binormal,
            8 => Self::TessFactor,
            9 => Self::PositionT,
            10 => Self::Color,
            11 => Self::Fog,
            12 => Self::Depth,
            13 => Self::Sample,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::BlendWeight => "blendweight",
            Self::BlendIndices => "blendindices",
            Self::Normal => "normal",
            Self::PointSize => "psize",
            Self::TexCoord => "texcoord",
            Self::Tangent => "tangent",
            Self::Binormal => "binormal",
            Self::TessFactor => "tessfactor",
            Self::PositionT => "positiont",
            Self::Color => "color",
            Self::Fog => "fog",
            Self::Depth => "depth",
            Self::Sample => "sample",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub usage: Usage,
    pub index: u32,
    pub name: Option<String>,
}

/// Value of a constant baked into the bytecode. The variant is the element type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantValue {
    Float([f32; 4]),
    Int([i32; 4]),
    Bool(bool),
}

impl ConstantValue {
    pub fn uniform_type(&self) -> UniformType {
        match self {
            Self::Float(_) => UniformType::Float,
            Self::Int(_) => UniformType::Int,
            Self::Bool(_) => UniformType::Bool,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant {
    pub index: u32,
    pub value: ConstantValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UniformType {
    Float,
    Int,
    Bool,
}

impl UniformType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Bool => "bool",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uniform {
    pub index: u32,
    pub ty: UniformType,
    /// Number of registers for array uniforms; 0 for a single register.
    pub array_count: u32,
    /// Set when the uniform is backed entirely by constants defined in the bytecode.
    pub constant: bool,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerType {
    TwoD,
    Cube,
    Volume,
}

impl SamplerType {
    pub fn name(self) -> &'static str {
        match self {
            Self::TwoD => "2d",
            Self::Cube => "cube",
            Self::Volume => "volume",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sampler {
    pub index: u32,
    pub ty: SamplerType,
    pub name: Option<String>,
}

/// Parse result for a single compiled shader.
///
/// When `diagnostics` is non-empty every other field except `profile` is unreliable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderReflection {
    pub profile: String,
    pub kind: ShaderKind,
    pub major: u8,
    pub minor: u8,
    pub instruction_count: u32,
    pub attributes: Vec<Attribute>,
    pub constants: Vec<Constant>,
    pub uniforms: Vec<Uniform>,
    pub samplers: Vec<Sampler>,
    /// Generated program text, when the engine produced any.
    pub output: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ShaderReflection {
    pub fn failed(profile: &str, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            profile: profile.to_owned(),
            diagnostics,
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectState {
    /// Raw state type code.
    pub ty: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub name: String,
    pub states: Vec<EffectState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Technique {
    pub name: String,
    pub passes: Vec<Pass>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub name: String,
    pub param: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectShader {
    pub technique: u32,
    pub pass: u32,
    pub shader: ShaderReflection,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffectReflection {
    pub profile: String,
    pub diagnostics: Vec<Diagnostic>,
    pub techniques: Vec<Technique>,
    pub textures: Vec<Texture>,
    pub shaders: Vec<EffectShader>,
}

impl EffectReflection {
    pub fn failed(profile: &str, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            profile: profile.to_owned(),
            diagnostics,
            ..Self::default()
        }
    }

    /// True when neither the bundle nor any embedded shader reported diagnostics.
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty() && self.shaders.iter().all(|s| s.shader.is_ok())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBytecode {
    Shader(ShaderReflection),
    Effect(EffectReflection),
}

impl ParsedBytecode {
    pub fn is_ok(&self) -> bool {
        match self {
            Self::Shader(shader) => shader.is_ok(),
            Self::Effect(effect) => effect.is_ok(),
        }
    }
}

pub fn is_effect_bytecode(bytecode: &[u8]) -> bool {
    bytecode.starts_with(&EFFECT_MAGIC)
}

/// Dispatches to the effect or shader parser based on [`EFFECT_MAGIC`].
pub fn parse_bytecode(
    parser: &dyn BytecodeParser,
    profile: &str,
    bytecode: &[u8],
) -> ParsedBytecode {
    if is_effect_bytecode(bytecode) {
        tracing::debug!(len = bytecode.len(), "effect magic found; parsing as effect");
        ParsedBytecode::Effect(parser.parse_effect(profile, bytecode))
    } else {
        ParsedBytecode::Shader(parser.parse_shader(profile, bytecode))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[derive(Default)]
    struct CountingParser {
        shaders: Cell<u32>,
        effects: Cell<u32>,
    }

    impl BytecodeParser for CountingParser {
        fn parse_shader(&self, profile: &str, _: &[u8]) -> ShaderReflection {
            self.shaders.set(self.shaders.get() + 1);
            ShaderReflection {
                profile: profile.to_owned(),
                ..Default::default()
            }
        }

        fn parse_effect(&self, profile: &str, _: &[u8]) -> EffectReflection {
            self.effects.set(self.effects.get() + 1);
            EffectReflection {
                profile: profile.to_owned(),
                ..Default::default()
            }
        }
    }

    #[test]
    fn magic_selects_effect_parser() {
        let parser = CountingParser::default();
        let parsed = parse_bytecode(&parser, "glsl", &[0x01, 0x09, 0xFF, 0xFE, 0, 0]);
        assert!(matches!(parsed, ParsedBytecode::Effect(_)));

        let parsed = parse_bytecode(&parser, "glsl", &[0x00, 0x02, 0xFE, 0xFF]);
        assert!(matches!(parsed, ParsedBytecode::Shader(_)));

        // Too short to carry the magic.
        let parsed = parse_bytecode(&parser, "glsl", &[0x01, 0x09]);
        assert!(matches!(parsed, ParsedBytecode::Shader(_)));

        assert_eq!(parser.effects.get(), 1);
        assert_eq!(parser.shaders.get(), 2);
    }

    #[test]
    fn usage_table_has_fourteen_entries() {
        for raw in 0..14u8 {
            assert!(Usage::from_raw(raw).is_some(), "{raw}");
        }
        assert_eq!(Usage::from_raw(14), None);
        assert_eq!(Usage::from_raw(5).map(Usage::name), Some("texcoord"));
        assert_eq!(Usage::PointSize.name(), "psize");
    }

    #[test]
    fn effect_ok_considers_embedded_shaders() {
        let mut effect = EffectReflection {
            shaders: vec![EffectShader {
                technique: 0,
                pass: 0,
                shader: ShaderReflection::default(),
            }],
            ..Default::default()
        };
        assert!(effect.is_ok());

        effect.shaders[0].shader.diagnostics.push(Diagnostic::new(None, 1, "bad"));
        assert!(!effect.is_ok());
    }
}
