//! Glue between shader tooling front-ends and a shader compiler/preprocessor engine.
//!
//! The engine itself (preprocessor, bytecode parser) sits behind the traits in [`engine`]. This
//! crate owns everything on the harness side of that boundary:
//!
//! - loading source text ([`text`]),
//! - ordered include-directory lookup exposed as engine include callbacks ([`include`]),
//! - `NAME=VALUE` macro tables ([`defines`]),
//! - the preprocessing driver that ties them together and writes the result ([`preprocess`]),
//! - the reflection data model returned by bytecode parsers ([`reflect`]) and the text report
//!   renderer over it ([`report`]).

#![forbid(unsafe_code)]

pub mod defines;
pub mod diagnostic;
pub mod engine;
pub mod include;
pub mod preprocess;
pub mod reflect;
pub mod report;
pub mod search_path;
pub mod text;

pub use crate::defines::{build_macro_table, parse_definition, MacroDefinition, MalformedDefinitionError};
pub use crate::diagnostic::Diagnostic;
pub use crate::engine::{BytecodeParser, PreprocessResult, Preprocessor};
pub use crate::include::{
    resolve, IncludeHandle, IncludeHandler, IncludeKind, IncludeRequest, IncludeResolver,
    ResolutionFailure,
};
pub use crate::preprocess::{PreprocessError, PreprocessJob, ValidationError};
pub use crate::reflect::{
    is_effect_bytecode, parse_bytecode, Attribute, Constant, ConstantValue, EffectReflection,
    EffectShader, EffectState, Pass, ParsedBytecode, Sampler, SamplerType, ShaderKind,
    ShaderReflection, Technique, Texture, Uniform, UniformType, Usage, EFFECT_MAGIC,
};
pub use crate::report::{render_effect, render_report, render_shader};
pub use crate::search_path::SearchPath;
pub use crate::text::{load_source, normalize_line_endings, TextLoadError};
