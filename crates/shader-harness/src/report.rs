//! Text reports over reflection results.
//!
//! The layout (labels, bullets, number formatting, blank lines) is compared verbatim by
//! downstream tests; keep it stable.

use crate::reflect::{
    Attribute, Constant, ConstantValue, EffectReflection, ParsedBytecode, Sampler,
    ShaderReflection, Uniform,
};

const INDENT_UNIT: &str = "    ";

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
        }
    }

    fn push_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT_UNIT);
        }
    }

    fn line(&mut self, text: &str) {
        self.push_indent();
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn section<T>(&mut self, label: &str, items: &[T], entry: impl Fn(&T) -> String) {
        self.push_indent();
        self.out.push_str(label);
        self.out.push(':');
        if items.is_empty() {
            self.out.push_str(" (none.)\n");
            return;
        }
        self.out.push('\n');
        for item in items {
            self.line(&format!("{INDENT_UNIT}* {}", entry(item)));
        }
    }

    /// Copies `text` verbatim, re-indenting after every line break. The indent is raised by one
    /// for the block and restored afterwards.
    fn reindented_block(&mut self, text: &str) {
        self.indent += 1;
        self.push_indent();
        for ch in text.chars() {
            self.out.push(ch);
            if ch == '\n' {
                self.push_indent();
            }
        }
        self.out.push('\n');
        self.indent -= 1;
    }
}

fn name_suffix(name: Option<&str>) -> String {
    match name {
        Some(name) => format!(" (\"{name}\")"),
        None => String::new(),
    }
}

fn attribute_entry(attr: &Attribute) -> String {
    let index = if attr.index != 0 {
        attr.index.to_string()
    } else {
        String::new()
    };
    format!(
        "{}{index}{}",
        attr.usage.name(),
        name_suffix(attr.name.as_deref())
    )
}

fn constant_entry(constant: &Constant) -> String {
    let values = match constant.value {
        ConstantValue::Float([x, y, z, w]) => format!("{x:.6} {y:.6} {z:.6} {w:.6}"),
        ConstantValue::Int([x, y, z, w]) => format!("{x} {y} {z} {w}"),
        ConstantValue::Bool(b) => b.to_string(),
    };
    format!(
        "{}: {} ({values})",
        constant.index,
        constant.value.uniform_type().name()
    )
}

fn uniform_entry(uniform: &Uniform) -> String {
    let constant = if uniform.constant { "const " } else { "" };
    let array = if uniform.array_count > 0 {
        format!("array[{}] ", uniform.array_count)
    } else {
        String::new()
    };
    format!(
        "{}: {constant}{array}{}{}",
        uniform.index,
        uniform.ty.name(),
        name_suffix(uniform.name.as_deref())
    )
}

fn sampler_entry(sampler: &Sampler) -> String {
    format!(
        "{}: {}{}",
        sampler.index,
        sampler.ty.name(),
        name_suffix(sampler.name.as_deref())
    )
}

fn write_shader(p: &mut Printer, fname: &str, shader: &ShaderReflection) {
    p.line(&format!("PROFILE: {}", shader.profile));
    if !shader.diagnostics.is_empty() {
        for diag in &shader.diagnostics {
            p.line(&diag.display_with(fname).to_string());
        }
    } else {
        p.line(&format!("SHADER TYPE: {}", shader.kind.name()));
        p.line(&format!("VERSION: {}.{}", shader.major, shader.minor));
        p.line(&format!("INSTRUCTION COUNT: {}", shader.instruction_count));
        p.section("ATTRIBUTES", &shader.attributes, attribute_entry);
        p.section("CONSTANTS", &shader.constants, constant_entry);
        p.section("UNIFORMS", &shader.uniforms, uniform_entry);
        p.section("SAMPLERS", &shader.samplers, sampler_entry);

        if let Some(output) = &shader.output {
            p.line("OUTPUT:");
            p.reindented_block(output);
        }
    }
    p.blank();
    p.blank();
}

fn write_effect(p: &mut Printer, fname: &str, effect: &EffectReflection) {
    p.line(&format!("PROFILE: {}", effect.profile));
    p.blank();
    if !effect.diagnostics.is_empty() {
        for diag in &effect.diagnostics {
            p.line(&diag.display_with(fname).to_string());
        }
        return;
    }

    for (i, technique) in effect.techniques.iter().enumerate() {
        p.line(&format!("TECHNIQUE #{i} ('{}'):", technique.name));
        for (j, pass) in technique.passes.iter().enumerate() {
            p.line(&format!("{INDENT_UNIT}PASS #{j} ('{}'):", pass.name));
            for state in &pass.states {
                p.line(&format!("{INDENT_UNIT}{INDENT_UNIT}STATE 0x{:X}", state.ty));
            }
        }
        p.blank();
    }

    for (i, texture) in effect.textures.iter().enumerate() {
        p.line(&format!("TEXTURE #{i} ('{}'): {}", texture.name, texture.param));
    }
    p.blank();

    for (i, entry) in effect.shaders.iter().enumerate() {
        p.line(&format!(
            "SHADER #{i}: technique {}, pass {}",
            entry.technique, entry.pass
        ));
        p.indent += 1;
        write_shader(p, fname, &entry.shader);
        p.indent -= 1;
    }
}

/// Renders a shader report at `indent` levels. `fname` names diagnostics without a file.
pub fn render_shader(fname: &str, shader: &ShaderReflection, indent: usize) -> String {
    let mut p = Printer::new(indent);
    write_shader(&mut p, fname, shader);
    p.out
}

/// Renders an effect report at `indent` levels; embedded shaders render one level deeper.
pub fn render_effect(fname: &str, effect: &EffectReflection, indent: usize) -> String {
    let mut p = Printer::new(indent);
    write_effect(&mut p, fname, effect);
    p.out
}

/// Full per-file report: a `SHADER:`/`EFFECT:` header followed by the body at indent 1.
pub fn render_report(fname: &str, parsed: &ParsedBytecode) -> String {
    match parsed {
        ParsedBytecode::Shader(shader) => {
            format!("SHADER: {fname}\n{}", render_shader(fname, shader, 1))
        }
        ParsedBytecode::Effect(effect) => {
            format!("EFFECT: {fname}\n{}", render_effect(fname, effect, 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::diagnostic::Diagnostic;
    use crate::reflect::{
        EffectShader, EffectState, Pass, SamplerType, ShaderKind, Technique, Texture,
        UniformType, Usage,
    };

    fn empty_vertex_shader() -> ShaderReflection {
        ShaderReflection {
            profile: "glsl".into(),
            kind: ShaderKind::Vertex,
            major: 2,
            minor: 0,
            instruction_count: 0,
            ..Default::default()
        }
    }

    #[test]
    fn empty_sections_render_none() {
        let text = render_shader("a.vso", &empty_vertex_shader(), 0);
        assert_eq!(
            text,
            "PROFILE: glsl\n\
             SHADER TYPE: vertex\n\
             VERSION: 2.0\n\
             INSTRUCTION COUNT: 0\n\
             ATTRIBUTES: (none.)\n\
             CONSTANTS: (none.)\n\
             UNIFORMS: (none.)\n\
             SAMPLERS: (none.)\n\
             \n\n"
        );
    }

    #[test]
    fn populated_shader_report() {
        let shader = ShaderReflection {
            instruction_count: 3,
            attributes: vec![
                Attribute {
                    usage: Usage::Position,
                    index: 0,
                    name: None,
                },
                Attribute {
                    usage: Usage::TexCoord,
                    index: 1,
                    name: Some("uv".into()),
                },
            ],
            constants: vec![
                Constant {
                    index: 0,
                    value: ConstantValue::Float([1.0, 0.0, 0.0, 1.0]),
                },
                Constant {
                    index: 3,
                    value: ConstantValue::Int([1, -2, 3, 4]),
                },
                Constant {
                    index: 7,
                    value: ConstantValue::Bool(false),
                },
            ],
            uniforms: vec![
                Uniform {
                    index: 4,
                    ty: UniformType::Float,
                    array_count: 0,
                    constant: false,
                    name: Some("mvp".into()),
                },
                Uniform {
                    index: 0,
                    ty: UniformType::Float,
                    array_count: 4,
                    constant: true,
                    name: None,
                },
                Uniform {
                    index: 2,
                    ty: UniformType::Bool,
                    array_count: 0,
                    constant: false,
                    name: None,
                },
            ],
            samplers: vec![
                Sampler {
                    index: 0,
                    ty: SamplerType::TwoD,
                    name: Some("diffuse".into()),
                },
                Sampler {
                    index: 2,
                    ty: SamplerType::Volume,
                    name: None,
                },
                Sampler {
                    index: 3,
                    ty: SamplerType::Cube,
                    name: Some("sky".into()),
                },
            ],
            ..empty_vertex_shader()
        };

        let expected = "    PROFILE: glsl
    SHADER TYPE: vertex
    VERSION: 2.0
    INSTRUCTION COUNT: 3
    ATTRIBUTES:
        * position
        * texcoord1 (\"uv\")
    CONSTANTS:
        * 0: float (1.000000 0.000000 0.000000 1.000000)
        * 3: int (1 -2 3 4)
        * 7: bool (false)
    UNIFORMS:
        * 4: float (\"mvp\")
        * 0: const array[4] float
        * 2: bool
    SAMPLERS:
        * 0: 2d (\"diffuse\")
        * 2: volume
        * 3: cube (\"sky\")


";
        let first = render_shader("a.vso", &shader, 1);
        assert_eq!(first, expected);
        assert_eq!(render_shader("a.vso", &shader, 1), first);
    }

    #[test]
    fn every_shader_kind_has_a_type_line() {
        for (kind, line) in [
            (ShaderKind::Unknown, "SHADER TYPE: unknown\n"),
            (ShaderKind::Pixel, "SHADER TYPE: pixel\n"),
            (ShaderKind::Vertex, "SHADER TYPE: vertex\n"),
            (ShaderKind::Geometry, "SHADER TYPE: geometry\n"),
        ] {
            let shader = ShaderReflection {
                kind,
                ..empty_vertex_shader()
            };
            let text = render_shader("k.bin", &shader, 0);
            assert!(text.contains(line), "{text}");
        }
    }

    #[test]
    fn diagnostics_suppress_the_body() {
        let mut shader = empty_vertex_shader();
        shader.attributes.push(Attribute {
            usage: Usage::Normal,
            index: 0,
            name: None,
        });
        shader.diagnostics = vec![
            Diagnostic::new(None, 4, "Unexpected EOF"),
            Diagnostic::new(Some("inc.h"), 9, "bad"),
        ];

        assert_eq!(
            render_shader("a.pso", &shader, 1),
            "    PROFILE: glsl\n    a.pso:4: ERROR: Unexpected EOF\n    inc.h:9: ERROR: bad\n\n\n"
        );
    }

    #[test]
    fn output_is_reindented_one_level_deeper() {
        let mut shader = empty_vertex_shader();
        shader.output = Some("void main()\n{\n}".into());
        let text = render_shader("a", &shader, 1);
        assert!(
            text.ends_with(
                "    SAMPLERS: (none.)\n    OUTPUT:\n        void main()\n        {\n        }\n\n\n"
            ),
            "{text}"
        );

        shader.output = Some(String::new());
        let text = render_shader("a", &shader, 0);
        assert!(text.ends_with("OUTPUT:\n    \n\n\n"), "{text:?}");

        shader.output = Some("x\n".into());
        let text = render_shader("a", &shader, 0);
        assert!(text.ends_with("OUTPUT:\n    x\n    \n\n\n"), "{text:?}");
    }

    #[test]
    fn effect_with_only_a_shader() {
        let effect = EffectReflection {
            profile: "glsl".into(),
            shaders: vec![EffectShader {
                technique: 0,
                pass: 0,
                shader: empty_vertex_shader(),
            }],
            ..Default::default()
        };

        let expected = "    PROFILE: glsl

\n    SHADER #0: technique 0, pass 0
        PROFILE: glsl
        SHADER TYPE: vertex
        VERSION: 2.0
        INSTRUCTION COUNT: 0
        ATTRIBUTES: (none.)
        CONSTANTS: (none.)
        UNIFORMS: (none.)
        SAMPLERS: (none.)


";
        assert_eq!(render_effect("a.fxo", &effect, 1), expected);
    }

    #[test]
    fn effect_techniques_passes_states_and_textures() {
        let effect = EffectReflection {
            profile: "glsl".into(),
            techniques: vec![Technique {
                name: "Main".into(),
                passes: vec![
                    Pass {
                        name: "P0".into(),
                        states: vec![EffectState { ty: 0x92 }, EffectState { ty: 0xab }],
                    },
                    Pass {
                        name: "P1".into(),
                        states: vec![],
                    },
                ],
            }],
            textures: vec![Texture {
                name: "tex".into(),
                param: 5,
            }],
            ..Default::default()
        };

        let expected = "PROFILE: glsl

TECHNIQUE #0 ('Main'):
    PASS #0 ('P0'):
        STATE 0x92
        STATE 0xAB
    PASS #1 ('P1'):

TEXTURE #0 ('tex'): 5

";
        assert_eq!(render_effect("a.fxo", &effect, 0), expected);
    }

    #[test]
    fn effect_diagnostics_stop_rendering() {
        let effect = EffectReflection {
            profile: "glsl".into(),
            diagnostics: vec![Diagnostic::new(None, 9, "Unexpected EOF")],
            textures: vec![Texture {
                name: "ignored".into(),
                param: 1,
            }],
            ..Default::default()
        };
        assert_eq!(
            render_effect("a.fxo", &effect, 1),
            "    PROFILE: glsl\n\n    a.fxo:9: ERROR: Unexpected EOF\n"
        );
    }

    #[test]
    fn report_header_names_the_file() {
        let parsed = ParsedBytecode::Shader(empty_vertex_shader());
        let text = render_report("x.vso", &parsed);
        assert!(text.starts_with("SHADER: x.vso\n    PROFILE: glsl\n"), "{text}");

        let parsed = ParsedBytecode::Effect(EffectReflection {
            profile: "glsl".into(),
            ..Default::default()
        });
        assert_eq!(
            render_report("x.fxo", &parsed),
            "EFFECT: x.fxo\n    PROFILE: glsl\n\n\n"
        );
    }
}
