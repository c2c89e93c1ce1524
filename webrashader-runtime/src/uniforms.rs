use crate::graph::{UniformBinding, UniformSource};
use crate::parameters::ParameterTable;
use crate::semantics::{Semantic, TextureSemantics, UniqueSemantics};
use webrashader_common::Size;
use webrashader_transpile::UniformType;

/// A value ready to be written to a uniform location.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    /// `float`
    Float(f32),
    /// `vec2`
    Vec2([f32; 2]),
    /// `vec3`
    Vec3([f32; 3]),
    /// `vec4`
    Vec4([f32; 4]),
    /// `int` or `bool`
    Int(i32),
    /// `uint`
    UInt(u32),
    /// `mat4`, column major.
    Mat4([f32; 16]),
}

impl UniformValue {
    /// Convert the value to the type the shader declares.
    ///
    /// Sizes narrow to `vec2` for shaders that declare them so, and scalars
    /// convert between float and integer types. Returns `None` when there is
    /// no sensible conversion.
    pub fn cast(self, ty: UniformType) -> Option<UniformValue> {
        use UniformValue::*;
        let scalar = match self {
            Float(v) => Some(v),
            Int(v) => Some(v as f32),
            UInt(v) => Some(v as f32),
            _ => None,
        };

        Some(match (ty, self) {
            (UniformType::Float, _) => Float(scalar?),
            (UniformType::Int | UniformType::Bool, Int(v)) => Int(v),
            (UniformType::Int, UInt(v)) => Int(i32::try_from(v).unwrap_or(i32::MAX)),
            (UniformType::Int, Float(v)) => Int(v as i32),
            (UniformType::Bool, _) => Int((scalar? != 0.0) as i32),
            (UniformType::UInt, UInt(v)) => UInt(v),
            (UniformType::UInt, Int(v)) => UInt(v.max(0) as u32),
            (UniformType::UInt, Float(v)) => UInt(v.max(0.0) as u32),
            (UniformType::Vec(4), Vec4(v)) => Vec4(v),
            (UniformType::Vec(3), Vec4([x, y, z, _])) => Vec3([x, y, z]),
            (UniformType::Vec(2), Vec4([x, y, _, _])) => Vec2([x, y]),
            (UniformType::Vec(n), Float(v)) => match n {
                2 => Vec2([v; 2]),
                3 => Vec3([v; 3]),
                _ => Vec4([v; 4]),
            },
            (UniformType::Mat(4, 4), Mat4(v)) => Mat4(v),
            _ => return None,
        })
    }
}

/// The per frame values a pass binds.
#[derive(Debug, Copy, Clone)]
pub struct FrameUniforms<'a> {
    /// The model view projection of the quad.
    pub mvp: &'a [f32; 16],
    /// The frame count, already taken modulo the pass `frame_count_mod`.
    pub frame_count: u32,
    /// `-1` when rewinding, `1` otherwise.
    pub frame_direction: i32,
    /// The size of the pass output.
    pub output: Size<u32>,
    /// The size of the viewport of the final pass.
    pub viewport: Size<u32>,
    /// The current parameter values.
    pub parameters: &'a ParameterTable,
}

impl UniformBinding {
    /// The value to write for this uniform.
    ///
    /// `texture_size` gives the size of the texture bound to a semantic this
    /// frame. Returns `None` for textures that are not available yet, such as
    /// history before enough frames were drawn, and for values that can not be
    /// converted to the declared type.
    pub fn value(
        &self,
        frame: &FrameUniforms,
        texture_size: impl Fn(Semantic<TextureSemantics>) -> Option<Size<u32>>,
    ) -> Option<UniformValue> {
        let value = match &self.source {
            UniformSource::Unique(unique) => match unique {
                UniqueSemantics::MVP => UniformValue::Mat4(*frame.mvp),
                UniqueSemantics::Output => UniformValue::Vec4(frame.output.into()),
                UniqueSemantics::FinalViewport => UniformValue::Vec4(frame.viewport.into()),
                UniqueSemantics::FrameCount => UniformValue::UInt(frame.frame_count),
                UniqueSemantics::FrameDirection => UniformValue::Int(frame.frame_direction),
            },
            UniformSource::TextureSize(texture) => UniformValue::Vec4(texture_size(*texture)?.into()),
            UniformSource::Parameter(name) => UniformValue::Float(frame.parameters.get(name)?),
        };
        value.cast(self.ty)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const IDENTITY: [f32; 16] = [
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ];

    #[test]
    fn casts_to_the_declared_type() {
        let size = UniformValue::Vec4([320.0, 240.0, 1.0 / 320.0, 1.0 / 240.0]);
        assert_eq!(size.cast(UniformType::Vec(2)), Some(UniformValue::Vec2([320.0, 240.0])));
        assert_eq!(size.cast(UniformType::Float), None);
        assert_eq!(
            UniformValue::UInt(7).cast(UniformType::Int),
            Some(UniformValue::Int(7))
        );
        assert_eq!(
            UniformValue::UInt(7).cast(UniformType::Float),
            Some(UniformValue::Float(7.0))
        );
        assert_eq!(
            UniformValue::Float(1.6).cast(UniformType::Int),
            Some(UniformValue::Int(1))
        );
        assert_eq!(
            UniformValue::Float(0.0).cast(UniformType::Bool),
            Some(UniformValue::Int(0))
        );
        assert_eq!(UniformValue::Mat4(IDENTITY).cast(UniformType::Mat(3, 3)), None);
    }

    #[test]
    fn binds_frame_values() {
        let parameters = ParameterTable::default();
        let frame = FrameUniforms {
            mvp: &IDENTITY,
            frame_count: 3,
            frame_direction: -1,
            output: Size::new(4, 2),
            viewport: Size::new(8, 8),
            parameters: &parameters,
        };
        let binding = |ty, source| UniformBinding {
            name: String::new(),
            ty,
            source,
        };
        let no_textures = |_: Semantic<TextureSemantics>| None::<Size<u32>>;

        assert_eq!(
            binding(UniformType::Vec(4), UniformSource::Unique(UniqueSemantics::Output))
                .value(&frame, no_textures),
            Some(UniformValue::Vec4([4.0, 2.0, 0.25, 0.5]))
        );
        assert_eq!(
            binding(UniformType::Int, UniformSource::Unique(UniqueSemantics::FrameDirection))
                .value(&frame, no_textures),
            Some(UniformValue::Int(-1))
        );
        assert_eq!(
            binding(UniformType::UInt, UniformSource::Unique(UniqueSemantics::FrameCount))
                .value(&frame, no_textures),
            Some(UniformValue::UInt(3))
        );

        let history = TextureSemantics::OriginalHistory.semantics(2);
        let size = binding(UniformType::Vec(4), UniformSource::TextureSize(history));
        assert_eq!(size.value(&frame, no_textures), None);
        assert_eq!(
            size.value(&frame, |_| Some(Size::new(2, 2))),
            Some(UniformValue::Vec4([2.0, 2.0, 0.5, 0.5]))
        );

        let missing = binding(UniformType::Float, UniformSource::Parameter("GAMMA".into()));
        assert_eq!(missing.value(&frame, no_textures), None);
    }
}
