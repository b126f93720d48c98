//! Built-in engine for `shader-harness`.
//!
//! [`BuiltinEngine`] implements both engine traits: preprocessing with [`BuiltinPreprocessor`]
//! and reflection of D3D9 shader bytecode ([`d3d9`]) and effect bundles ([`effect`]). GLSL is
//! never generated, so reflection results carry no output text.

#![forbid(unsafe_code)]

pub mod backends;
pub mod d3d9;
pub mod effect;
pub mod pp;
pub mod profile;

use shader_harness::{
    BytecodeParser, EffectReflection, IncludeHandler, MacroDefinition, PreprocessResult,
    Preprocessor, ShaderReflection,
};

pub use crate::backends::shaderc::ShadercPreprocessor;
pub use crate::pp::{BuiltinPreprocessor, DEFAULT_MAX_INCLUDE_DEPTH};

#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinEngine {
    pub preprocessor: BuiltinPreprocessor,
}

impl Preprocessor for BuiltinEngine {
    fn preprocess(
        &self,
        filename: &str,
        source: &str,
        defines: &[MacroDefinition],
        includes: &mut dyn IncludeHandler,
    ) -> PreprocessResult {
        self.preprocessor
            .preprocess(filename, source, defines, includes)
    }
}

impl BytecodeParser for BuiltinEngine {
    fn parse_shader(&self, profile: &str, bytecode: &[u8]) -> ShaderReflection {
        d3d9::parse_shader(profile, bytecode)
    }

    fn parse_effect(&self, profile: &str, bytecode: &[u8]) -> EffectReflection {
        effect::parse_effect(profile, bytecode)
    }
}
