use webrashader_common::map::{FastHashMap, ShortString};
use webrashader_presets::TextureConfig;
use webrashader_transpile::TEXEL_SIZE_PREFIX;

/// Uniforms with a single value for the whole pass.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniqueSemantics {
    /// `mat4`, the model view projection of the quad.
    MVP,
    /// `vec4`, the size of the current pass output.
    Output,
    /// `vec4`, the size of the viewport the final pass draws to.
    FinalViewport,
    /// `uint`, the frame count, taken modulo the pass `frame_count_mod`.
    FrameCount,
    /// `int`, `-1` when rewinding, `1` otherwise.
    FrameDirection,
}

impl UniqueSemantics {
    /// The name of the uniform in slang sources.
    pub fn uniform_name(&self) -> &'static str {
        match self {
            UniqueSemantics::MVP => "MVP",
            UniqueSemantics::Output => "OutputSize",
            UniqueSemantics::FinalViewport => "FinalViewportSize",
            UniqueSemantics::FrameCount => "FrameCount",
            UniqueSemantics::FrameDirection => "FrameDirection",
        }
    }
}

/// Textures a pass can sample.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum TextureSemantics {
    /// The input frame of the chain.
    Original,
    /// The output of the previous pass, or the input frame for the first pass.
    Source,
    /// The input frame of an earlier frame. Index 0 is the current frame.
    OriginalHistory,
    /// The output of an earlier pass in this frame.
    PassOutput,
    /// The output of a pass in the previous frame.
    PassFeedback,
    /// A lookup texture declared by the preset.
    User,
}

impl TextureSemantics {
    /// Whether the semantic is indexed, `PassOutput0` rather than `Source`.
    pub fn is_indexed(&self) -> bool {
        !matches!(self, TextureSemantics::Original | TextureSemantics::Source)
    }

    /// The name of the sampler in slang sources, without the index.
    pub fn texture_name(&self) -> &'static str {
        match self {
            TextureSemantics::Original => "Original",
            TextureSemantics::Source => "Source",
            TextureSemantics::OriginalHistory => "OriginalHistory",
            TextureSemantics::PassOutput => "PassOutput",
            TextureSemantics::PassFeedback => "PassFeedback",
            TextureSemantics::User => "User",
        }
    }

    /// The semantic at `index`.
    pub fn semantics(self, index: usize) -> Semantic<TextureSemantics> {
        Semantic {
            semantics: self,
            index,
        }
    }
}

/// A semantic with an index.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Semantic<T, I = usize> {
    /// The semantic.
    pub semantics: T,
    /// The index of the semantic.
    pub index: I,
}

/// What a uniform name refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformSemantic {
    /// A builtin value.
    Unique(UniqueSemantics),
    /// The size of a texture, as `vec4(width, height, 1/width, 1/height)`.
    Texture(Semantic<TextureSemantics>),
}

const LEGACY_UNIFORMS: &[(&str, UniformSemantic)] = &[
    ("MVPMatrix", UniformSemantic::Unique(UniqueSemantics::MVP)),
    ("InputSize", UniformSemantic::Texture(Semantic { semantics: TextureSemantics::Source, index: 0 })),
    ("TextureSize", UniformSemantic::Texture(Semantic { semantics: TextureSemantics::Source, index: 0 })),
    ("OrigInputSize", UniformSemantic::Texture(Semantic { semantics: TextureSemantics::Original, index: 0 })),
    ("OrigTextureSize", UniformSemantic::Texture(Semantic { semantics: TextureSemantics::Original, index: 0 })),
];

const LEGACY_TEXTURES: &[(&str, TextureSemantics)] = &[
    ("Texture", TextureSemantics::Source),
    ("OrigTexture", TextureSemantics::Original),
];

/// Split `name` into a prefix and a trailing decimal index.
fn split_index(name: &str, prefix: &str) -> Option<usize> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// The texture a builtin sampler name refers to, as seen from `pass`.
///
/// Understands the slang names and the names legacy GLSL shaders use:
/// `Texture`, `OrigTexture`, `PrevTexture`, `PrevNTexture` and
/// `PassPrevNTexture`.
pub fn builtin_texture(name: &str, pass: usize) -> Option<Semantic<TextureSemantics>> {
    match name {
        "Original" => return Some(TextureSemantics::Original.semantics(0)),
        "Source" => return Some(TextureSemantics::Source.semantics(0)),
        _ => {}
    }
    for semantics in [
        TextureSemantics::OriginalHistory,
        TextureSemantics::PassOutput,
        TextureSemantics::PassFeedback,
    ] {
        if let Some(index) = split_index(name, semantics.texture_name()) {
            return Some(semantics.semantics(index));
        }
    }
    if let Some((_, semantics)) = LEGACY_TEXTURES.iter().find(|(legacy, _)| *legacy == name) {
        return Some(semantics.semantics(0));
    }
    legacy_relative(name, "Texture", pass)
}

/// `PrevTexture`, `Prev3Texture` and `PassPrev2Texture` style names, and
/// their `InputSize`/`TextureSize` counterparts.
fn legacy_relative(name: &str, suffix: &str, pass: usize) -> Option<Semantic<TextureSemantics>> {
    let stem = name.strip_suffix(suffix)?;
    if let Some(back) = stem.strip_prefix("PassPrev") {
        let back: usize = back.parse().ok()?;
        return (back >= 1 && back <= pass)
            .then(|| TextureSemantics::PassOutput.semantics(pass - back));
    }
    if stem == "Prev" {
        return Some(TextureSemantics::OriginalHistory.semantics(1));
    }
    let back: usize = stem.strip_prefix("Prev")?.parse().ok()?;
    Some(TextureSemantics::OriginalHistory.semantics(back + 1))
}

/// The builtin a uniform name refers to, as seen from `pass`.
pub fn builtin_uniform(name: &str, pass: usize) -> Option<UniformSemantic> {
    let unique = [
        UniqueSemantics::MVP,
        UniqueSemantics::Output,
        UniqueSemantics::FinalViewport,
        UniqueSemantics::FrameCount,
        UniqueSemantics::FrameDirection,
    ]
    .into_iter()
    .find(|s| s.uniform_name() == name);
    if let Some(unique) = unique {
        return Some(UniformSemantic::Unique(unique));
    }
    if let Some((_, semantic)) = LEGACY_UNIFORMS.iter().find(|(legacy, _)| *legacy == name) {
        return Some(*semantic);
    }
    if let Some(texture) = name.strip_suffix("Size") {
        if let Some(semantic) = builtin_texture(texture, pass) {
            return Some(UniformSemantic::Texture(semantic));
        }
    }
    ["InputSize", "TextureSize"]
        .iter()
        .find_map(|suffix| legacy_relative(name, suffix, pass))
        .map(UniformSemantic::Texture)
}

/// Names a preset gives to pass outputs and lookup textures.
#[derive(Debug, Default, Clone)]
pub struct SemanticMap {
    textures: FastHashMap<ShortString, Semantic<TextureSemantics>>,
}

impl SemanticMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the names of pass `index` called `alias`: the alias itself for
    /// its output and `<alias>Feedback` for its previous frame.
    ///
    /// Blank aliases are ignored.
    pub fn insert_pass(&mut self, alias: Option<&str>, index: usize) {
        let Some(alias) = alias.map(str::trim).filter(|a| !a.is_empty()) else {
            return;
        };
        self.textures.insert(
            ShortString::from(alias),
            TextureSemantics::PassOutput.semantics(index),
        );
        self.textures.insert(
            ShortString::from(format!("{alias}Feedback")),
            TextureSemantics::PassFeedback.semantics(index),
        );
    }

    /// Insert the names of the lookup textures.
    pub fn insert_luts(&mut self, textures: &[TextureConfig]) {
        for (index, texture) in textures.iter().enumerate() {
            self.textures.insert(
                ShortString::from(texture.name.as_str()),
                TextureSemantics::User.semantics(index),
            );
        }
    }

    /// The texture `name` refers to from `pass`.
    ///
    /// Preset names take precedence over builtin names.
    pub fn texture(&self, name: &str, pass: usize) -> Option<Semantic<TextureSemantics>> {
        self.textures
            .get(name)
            .copied()
            .or_else(|| builtin_texture(name, pass))
    }

    /// The uniform `name` refers to from `pass`.
    ///
    /// Size uniforms the transpiler declared under [`TEXEL_SIZE_PREFIX`] hold
    /// the size of the sampler named after the prefix.
    pub fn uniform(&self, name: &str, pass: usize) -> Option<UniformSemantic> {
        if let Some(sampler) = name
            .strip_prefix(TEXEL_SIZE_PREFIX)
            .and_then(|name| name.strip_suffix("Size"))
        {
            return self.texture(sampler, pass).map(UniformSemantic::Texture);
        }
        if let Some(texture) = name.strip_suffix("Size") {
            if let Some(semantic) = self.textures.get(texture) {
                return Some(UniformSemantic::Texture(*semantic));
            }
        }
        builtin_uniform(name, pass)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolves_builtin_names() {
        assert_eq!(
            builtin_texture("PassOutput2", 3),
            Some(TextureSemantics::PassOutput.semantics(2))
        );
        assert_eq!(
            builtin_texture("OriginalHistory4", 0),
            Some(TextureSemantics::OriginalHistory.semantics(4))
        );
        assert_eq!(builtin_texture("PassOutput", 3), None);
        assert_eq!(
            builtin_uniform("PassFeedback1Size", 0),
            Some(UniformSemantic::Texture(TextureSemantics::PassFeedback.semantics(1)))
        );
        assert_eq!(
            builtin_uniform("FrameCount", 0),
            Some(UniformSemantic::Unique(UniqueSemantics::FrameCount))
        );
    }

    #[test]
    fn resolves_legacy_names() {
        assert_eq!(builtin_texture("Texture", 2), Some(TextureSemantics::Source.semantics(0)));
        assert_eq!(
            builtin_texture("PrevTexture", 0),
            Some(TextureSemantics::OriginalHistory.semantics(1))
        );
        assert_eq!(
            builtin_texture("Prev2Texture", 0),
            Some(TextureSemantics::OriginalHistory.semantics(3))
        );
        assert_eq!(
            builtin_texture("PassPrev2Texture", 3),
            Some(TextureSemantics::PassOutput.semantics(1))
        );
        assert_eq!(builtin_texture("PassPrev4Texture", 3), None);
        assert_eq!(
            builtin_uniform("PassPrev1TextureSize", 2),
            Some(UniformSemantic::Texture(TextureSemantics::PassOutput.semantics(1)))
        );
        assert_eq!(
            builtin_uniform("MVPMatrix", 0),
            Some(UniformSemantic::Unique(UniqueSemantics::MVP))
        );
    }

    #[test]
    fn preset_names_shadow_builtins() {
        let mut map = SemanticMap::new();
        map.insert_pass(Some("Source"), 4);
        map.insert_pass(Some("  "), 5);
        assert_eq!(map.texture("Source", 6), Some(TextureSemantics::PassOutput.semantics(4)));
        assert_eq!(
            map.uniform("SourceFeedbackSize", 6),
            Some(UniformSemantic::Texture(TextureSemantics::PassFeedback.semantics(4)))
        );
        assert_eq!(map.texture("  ", 6), None);
    }

    #[test]
    fn transpiler_size_uniforms_follow_their_sampler() {
        let mut map = SemanticMap::new();
        map.insert_pass(Some("Blur"), 0);
        assert_eq!(
            map.uniform("_wr_TextureSize", 2),
            Some(UniformSemantic::Texture(TextureSemantics::Source.semantics(0)))
        );
        assert_eq!(
            map.uniform("_wr_BlurSize", 2),
            Some(UniformSemantic::Texture(TextureSemantics::PassOutput.semantics(0)))
        );
        assert_eq!(map.uniform("_wr_NowhereSize", 2), None);
    }
}
