use anyhow::anyhow;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use webrashader::presets::ShaderPreset;
use webrashader::preprocess::ShaderSource;
use webrashader::runtime::{compile_preset, ParameterTable, PassGraph};
use webrashader::transpile::{transpile, ShaderStage, TranspileOptions, WebGlVersion};
use webrashader::Resolver;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a preset and get a JSON representation of the data.
    Parse {
        /// The path to the shader preset to load.
        #[arg(short, long)]
        preset: PathBuf,
    },
    /// Get the raw GLSL output of a preprocessed shader.
    Preprocess {
        /// The path to the slang or GLSL shader.
        #[arg(short, long)]
        shader: PathBuf,
        /// The item to output.
        #[arg(value_enum, short, long)]
        output: PreprocessOutput,
    },
    /// Transpile a shader to GLSL ES for the given WebGL version.
    Transpile {
        /// The path to the slang or GLSL shader.
        #[arg(short, long)]
        shader: PathBuf,

        /// The shader stage to output.
        #[arg(value_enum, short = 'o', long)]
        stage: TranspileStage,

        /// The WebGL version to target.
        #[arg(value_enum, short, long, default_value = "webgl2")]
        target: Target,
    },
    /// Reflect a pass of a preset, giving the uniforms and samplers it reads and
    /// what each of them is bound to.
    Reflect {
        /// The path to the shader preset to load.
        #[arg(short, long)]
        preset: PathBuf,
        /// The index of the pass to reflect.
        #[arg(short, long)]
        index: usize,
        /// The WebGL version to target.
        #[arg(value_enum, short, long, default_value = "webgl2")]
        target: Target,
    },
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PreprocessOutput {
    #[clap(name = "fragment")]
    Fragment,
    #[clap(name = "vertex")]
    Vertex,
    #[clap(name = "params")]
    Params,
    #[clap(name = "format")]
    Format,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum TranspileStage {
    #[clap(name = "fragment")]
    Fragment,
    #[clap(name = "vertex")]
    Vertex,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum Target {
    #[clap(name = "webgl1")]
    WebGl1,
    #[clap(name = "webgl2")]
    WebGl2,
}

impl From<Target> for WebGlVersion {
    fn from(value: Target) -> Self {
        match value {
            Target::WebGl1 => WebGlVersion::WebGl1,
            Target::WebGl2 => WebGlVersion::WebGl2,
        }
    }
}

impl From<TranspileStage> for ShaderStage {
    fn from(value: TranspileStage) -> Self {
        match value {
            TranspileStage::Fragment => ShaderStage::Fragment,
            TranspileStage::Vertex => ShaderStage::Vertex,
        }
    }
}

pub fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut resolver = file_system();

    match args.command {
        Commands::Parse { preset } => {
            let preset = get_shader_preset(&preset, &mut resolver)?;
            let out = serde_json::to_string_pretty(&preset)?;
            print!("{out:}");
        }
        Commands::Preprocess { shader, output } => {
            let source = ShaderSource::load(&path_string(&shader)?, &mut resolver)?;
            match output {
                PreprocessOutput::Fragment => print!("{}", source.fragment.text),
                PreprocessOutput::Vertex => print!("{}", source.vertex.text),
                PreprocessOutput::Params => {
                    print!("{}", serde_json::to_string_pretty(&source.parameters)?)
                }
                PreprocessOutput::Format => print!("{:?}", source.format),
            }
        }
        Commands::Transpile {
            shader,
            stage,
            target,
        } => {
            let source = ShaderSource::load(&path_string(&shader)?, &mut resolver)?;
            let unit = transpile(&source, &TranspileOptions::for_target(target.into()))?;
            print!("{}", unit.stage(stage.into()).source)
        }
        Commands::Reflect {
            preset,
            index,
            target,
        } => {
            let preset = get_shader_preset(&preset, &mut resolver)?;
            if index >= preset.shaders.len() {
                return Err(anyhow!("Invalid pass index for the preset"));
            }

            let passes = compile_preset(
                &preset,
                &mut resolver,
                &TranspileOptions::for_target(target.into()),
            )?;
            let parameters = ParameterTable::resolve(
                passes.iter().map(|pass| pass.unit.parameters.as_slice()),
                &preset.parameters,
                &[],
            )?;
            let graph = PassGraph::build(&passes, &preset.textures, &parameters)?;

            println!(
                "{}",
                serde_json::to_string_pretty(&passes[index].unit.reflection)?
            );
            print!("{:#?}", graph.passes[index]);
        }
    }

    Ok(())
}

/// A resolver reading straight from the file system.
fn file_system() -> impl Resolver {
    |path: &str| match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            tracing::debug!(path, %err, "could not read file");
            None
        }
    }
}

fn path_string(path: &std::path::Path) -> anyhow::Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Path {} is not valid UTF-8", path.display()))
}

fn get_shader_preset(preset: &std::path::Path, resolver: &mut impl Resolver) -> anyhow::Result<ShaderPreset> {
    let path = path_string(preset)?;
    let text = std::fs::read_to_string(preset)?;
    let preset = ShaderPreset::parse_with_references(&path, &text, resolver)?;
    Ok(preset)
}
