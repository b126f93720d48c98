//! `fx_2_0` effect bundle parser.
//!
//! The layout handled here was worked out from real bundles rather than a published format
//! description, so anything unexpected is reported as a truncated file.

use shader_harness::{
    Diagnostic, EffectReflection, EffectShader, EffectState, Pass, Technique, Texture,
    EFFECT_MAGIC,
};
use thiserror::Error;

use crate::{d3d9, profile};

/// State types whose value is a compiled shader (vertex and pixel shader states).
const SHADER_STATE_TYPES: [u32; 2] = [0x92, 0x93];

/// Words per state record; the first one is the state type.
const STATE_WORDS: usize = 4;
/// Words per parameter record before its annotations.
const PARAM_WORDS: usize = 4;
const ANNOTATION_WORDS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EffectError {
    #[error("Not an Effects file")]
    NotAnEffect,
    #[error("Unexpected EOF")]
    UnexpectedEof,
}

/// An [`EffectError`] at a 1-based byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Located {
    position: usize,
    error: EffectError,
}

impl Located {
    fn into_diagnostic(self) -> Diagnostic {
        let position = u32::try_from(self.position).unwrap_or(u32::MAX);
        Diagnostic::new(None, position, self.error.to_string())
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn eof(&self) -> Located {
        Located {
            position: self.pos + 1,
            error: EffectError::UnexpectedEof,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], Located> {
        let end = self.pos.checked_add(len).ok_or_else(|| self.eof())?;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| self.eof())?;
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, Located> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn count(&mut self) -> Result<usize, Located> {
        self.u32().map(|v| v as usize)
    }

    fn skip_words(&mut self, words: usize) -> Result<(), Located> {
        let len = words.checked_mul(4).ok_or_else(|| self.eof())?;
        self.take(len).map(drop)
    }
}

/// Length-prefixed string stored at `base + offset`. Embedded NULs are dropped.
fn read_name(bytes: &[u8], base: usize, offset: u32) -> Result<String, Located> {
    let mut r = Reader::at(bytes, base.saturating_add(offset as usize));
    let len = r.count()?;
    Ok(decode_name(r.take(len)?))
}

fn decode_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|&c| c != '\0')
        .collect()
}

fn parse(profile: &str, bytes: &[u8]) -> Result<EffectReflection, Located> {
    if !bytes.starts_with(&EFFECT_MAGIC) {
        return Err(Located {
            position: 1,
            error: EffectError::NotAnEffect,
        });
    }
    let mut r = Reader::at(bytes, EFFECT_MAGIC.len());
    let offset = r.count()?;
    let base = r.pos;
    r.take(offset)?;

    let num_params = r.count()?;
    let num_techniques = r.count()?;
    r.skip_words(2)?;

    for _ in 0..num_params {
        r.skip_words(PARAM_WORDS - 1)?;
        let annotations = r.count()?;
        r.skip_words(annotations.saturating_mul(ANNOTATION_WORDS))?;
    }

    let mut effect = EffectReflection {
        profile: profile.to_owned(),
        ..EffectReflection::default()
    };
    let mut shader_states = 0usize;

    for _ in 0..num_techniques {
        let name = read_name(bytes, base, r.u32()?)?;
        let annotations = r.count()?;
        let num_passes = r.count()?;
        r.skip_words(annotations.saturating_mul(ANNOTATION_WORDS))?;

        let mut passes = Vec::new();
        for _ in 0..num_passes {
            let name = read_name(bytes, base, r.u32()?)?;
            let annotations = r.count()?;
            let num_states = r.count()?;
            r.skip_words(annotations.saturating_mul(ANNOTATION_WORDS))?;

            let mut states = Vec::new();
            for _ in 0..num_states {
                let ty = r.u32()?;
                r.skip_words(STATE_WORDS - 1)?;
                if SHADER_STATE_TYPES.contains(&ty) {
                    shader_states += 1;
                }
                states.push(EffectState { ty });
            }
            passes.push(Pass { name, states });
        }
        effect.techniques.push(Technique { name, passes });
    }

    let num_textures = r.count()?;
    let num_objects = r.count()?;
    tracing::trace!(num_textures, num_objects, "effect object counts");

    for _ in 0..num_textures {
        let param = r.u32()?;
        let size = r.count()?;
        let name = decode_name(r.take(size)?);
        r.take((4 - size % 4) % 4)?;
        effect.textures.push(Texture { name, param });
    }

    for _ in 0..shader_states {
        let technique = r.u32()?;
        let pass = r.u32()?;
        r.skip_words(3)?;
        let size = r.count()?;
        let blob = r.take(size)?;
        effect.shaders.push(EffectShader {
            technique,
            pass,
            shader: d3d9::parse_shader(profile, blob),
        });
    }

    Ok(effect)
}

/// Reflects an effect bundle, parsing every embedded shader with the D3D9 parser.
pub fn parse_effect(profile: &str, bytecode: &[u8]) -> EffectReflection {
    if !profile::is_supported(profile) {
        return EffectReflection::failed(
            profile,
            vec![Diagnostic::new(None, 0, profile::unsupported_message(profile))],
        );
    }
    match parse(profile, bytecode) {
        Ok(effect) => effect,
        Err(err) => {
            tracing::debug!(position = err.position, error = %err.error, "effect parse failed");
            EffectReflection::failed(profile, vec![err.into_diagnostic()])
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use shader_harness::render_effect;

    use super::*;

    fn push_u32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    /// Length-prefixed, NUL-terminated, padded to 4 bytes.
    fn push_name(out: &mut Vec<u8>, name: &str) {
        push_u32(out, name.len() as u32 + 1);
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }

    fn minimal_vs() -> Vec<u8> {
        [0xFFFE_0200u32, 0x0000_FFFF]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect()
    }

    fn bundle() -> Vec<u8> {
        let mut names = Vec::new();
        push_name(&mut names, "Main"); // offset 0
        let pass_name = names.len() as u32;
        push_name(&mut names, "P0");

        let mut fx = EFFECT_MAGIC.to_vec();
        push_u32(&mut fx, names.len() as u32);
        fx.extend_from_slice(&names);

        push_u32(&mut fx, 1); // parameters
        push_u32(&mut fx, 1); // techniques
        push_u32(&mut fx, 0);
        push_u32(&mut fx, 0);

        // Parameter with one annotation.
        for w in [0, 0, 0, 1, 7, 7] {
            push_u32(&mut fx, w);
        }

        // Technique "Main": no annotations, one pass.
        for w in [0, 0, 1] {
            push_u32(&mut fx, w);
        }
        // Pass "P0": one annotation, two states.
        for w in [pass_name, 1, 2, 9, 9] {
            push_u32(&mut fx, w);
        }
        for w in [0x92, 0, 0, 0, 0xA0, 0, 0, 0] {
            push_u32(&mut fx, w);
        }

        push_u32(&mut fx, 1); // textures
        push_u32(&mut fx, 0); // objects
        push_u32(&mut fx, 3); // param
        push_u32(&mut fx, 5); // name size
        fx.extend_from_slice(b"tex0\0\0\0\0");

        let vs = minimal_vs();
        for w in [0, 0, 0, 0, 0, vs.len() as u32] {
            push_u32(&mut fx, w);
        }
        fx.extend_from_slice(&vs);
        fx
    }

    #[test]
    fn bundle_round_trips_through_the_report() {
        let effect = parse_effect("glsl", &bundle());
        assert!(effect.is_ok(), "{effect:?}");

        let expected = "PROFILE: glsl

TECHNIQUE #0 ('Main'):
    PASS #0 ('P0'):
        STATE 0x92
        STATE 0xA0

TEXTURE #0 ('tex0'): 3

SHADER #0: technique 0, pass 0
    PROFILE: glsl
    SHADER TYPE: vertex
    VERSION: 2.0
    INSTRUCTION COUNT: 0
    ATTRIBUTES: (none.)
    CONSTANTS: (none.)
    UNIFORMS: (none.)
    SAMPLERS: (none.)


";
        assert_eq!(render_effect("fx.fxo", &effect, 0), expected);
    }

    #[test]
    fn truncation_reports_byte_position() {
        let full = bundle();
        let cut = &full[..full.len() - 4];
        let effect = parse_effect("glsl", cut);
        assert_eq!(effect.diagnostics.len(), 1);
        assert_eq!(effect.diagnostics[0].message, "Unexpected EOF");
        assert_eq!(effect.diagnostics[0].file, None);
        // The shader blob starts 4 bytes before the cut and needs 8.
        assert_eq!(effect.diagnostics[0].position as usize, full.len() - 8 + 1);
        assert!(effect.techniques.is_empty());

        let effect = parse_effect("glsl", &EFFECT_MAGIC);
        assert_eq!(effect.diagnostics[0].position, 5);
    }

    #[test]
    fn wrong_magic_and_profile() {
        let effect = parse_effect("glsl", &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(effect.diagnostics.len(), 1);
        assert_eq!(effect.diagnostics[0].message, "Not an Effects file");
        assert_eq!(effect.diagnostics[0].position, 1);

        let effect = parse_effect("nope", &bundle());
        assert_eq!(
            effect.diagnostics[0].message,
            "Profile 'nope' is unknown or unsupported"
        );
    }

    #[test]
    fn embedded_shader_errors_stay_with_the_shader() {
        let mut fx = bundle();
        let len = fx.len();
        // Corrupt the embedded shader's version token.
        fx[len - 8..len - 4].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        let effect = parse_effect("glsl", &fx);
        assert!(effect.diagnostics.is_empty());
        assert!(!effect.is_ok());
        assert_eq!(
            effect.shaders[0].shader.diagnostics[0].message,
            "Unsupported shader version token 0x12345678"
        );
    }
}
