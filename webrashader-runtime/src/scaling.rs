use num_traits::AsPrimitive;
use webrashader_common::Size;
use webrashader_presets::{Scale2D, ScaleFactor, ScaleType, Scaling};

fn scale_axis<T>(scaling: &Scaling, source: T, viewport: T) -> f32
where
    T: AsPrimitive<f32>,
{
    let factor: f32 = scaling.factor.into();
    match scaling.scale_type {
        ScaleType::Input => source.as_() * factor,
        ScaleType::Absolute => match scaling.factor {
            ScaleFactor::Absolute(size) => size as f32,
            ScaleFactor::Float(size) => size,
        },
        ScaleType::Viewport => viewport.as_() * factor,
    }
}

/// Produce the output size of a pass with the given scaling options.
///
/// A pass without scaling renders at the size of its source, or at the size
/// of the viewport if it is the last pass. The result is rounded and never
/// smaller than 1x1.
pub fn scale(scaling: &Scale2D, source: Size<u32>, viewport: Size<u32>, is_final: bool) -> Size<u32> {
    if !scaling.valid {
        return if is_final {
            clamp(viewport)
        } else {
            clamp(source)
        };
    }

    let width = scale_axis(&scaling.x, source.width, viewport.width);
    let height = scale_axis(&scaling.y, source.height, viewport.height);
    clamp(Size {
        width: width.round().max(0.0).as_(),
        height: height.round().max(0.0).as_(),
    })
}

fn clamp(size: Size<u32>) -> Size<u32> {
    Size {
        width: size.width.max(1),
        height: size.height.max(1),
    }
}
