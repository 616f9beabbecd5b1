//! Pipeline builder
//!
//! Builds a [`Pipeline`] from a line-oriented description:
//!
//! ```text
//! // comments start with two slashes
//! #include "shaders/common.glsl"
//! pass RenderPass
//!     shader vertex "shaders/default.vs"
//!     shader fragment "shaders/default.fs"
//!     polygon fill
//!     cull ccw back
//!     blend none
//!     clear color depth
//!     depth enabled less
//!     sampler texture2d 0
//!     stencil always 1 255
//! end
//! ```
//!
//! A top-level `#include` adds a shader fragment that is prepended to every
//! shader stage loaded after it. `#include` lines inside shader sources are
//! expanded recursively. All paths resolve through a [`SourceProvider`],
//! usually rooted at the configured shader include root.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::{Config, ConfigError, RenderCoreConfig};
use crate::foundation::object::Shared;

use super::error::RenderError;
use super::pipeline::{Pipeline, DEFAULT_MAX_PASSES};
use super::render_pass::RenderPass;
use super::shader::{Shader, ShaderType};
use super::states::{
    BlendFunc, BlendState, ClearState, CompareFunc, CullFace, CullMode, CullState, DepthState,
    PolygonMode, PolygonState, SamplerState, StencilState, TextureTarget,
};
use super::PassId;

/// Token marking an include directive
pub const INCLUDE_TOKEN: &str = "#include";

/// Name of the built-in 3D pipeline
pub const DEFAULT_3D: &str = "default3d";

/// Name of the built-in 2D pipeline
pub const DEFAULT_2D: &str = "default2d";

const DEFAULT_3D_DESCRIPTION: &str = r#"
pass RenderPass
    polygon fill
    cull ccw back
    blend none
    clear color depth
    depth enabled less
    sampler texture2d 0
end
pass UiPass
    polygon fill
    cull off back
    blend add
    clear depth
    depth disabled always
end
pass DbgPass
    polygon line
    cull off back
    blend none
    depth enabled lequal
end
"#;

const DEFAULT_2D_DESCRIPTION: &str = r#"
pass UiPass
    polygon fill
    cull off back
    blend add
    clear color depth
    depth disabled always
    sampler texture2d 0
end
"#;

/// Errors raised while building a pipeline
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// A line could not be parsed
    #[error("Line {line}: {message}")]
    Syntax {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// An `#include` line without a quoted path
    #[error("{file}:{line}: malformed include directive")]
    MalformedInclude {
        /// File containing the directive, `<description>` for the description itself
        file: String,
        /// 1-based line number
        line: usize,
    },

    /// A file includes itself directly or indirectly
    #[error("Include cycle through '{path}'")]
    IncludeCycle {
        /// File closing the cycle
        path: String,
    },

    /// A source could not be found
    #[error("Source '{0}' not found")]
    SourceNotFound(String),

    /// Reading a source failed
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Requested path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A pass was rejected by the pipeline
    #[error("Line {line}: {source}")]
    Pass {
        /// Line of the `end` closing the pass
        line: usize,
        /// Pipeline error
        #[source]
        source: RenderError,
    },

    /// `load` was called before `create`
    #[error("No pipeline created")]
    NoPipeline,

    /// Unknown built-in pipeline name
    #[error("Unknown default pipeline '{0}'")]
    UnknownDefault(String),

    /// Configuration rejected before building
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for pipeline building
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Quoted path of an `#include` line
///
/// Returns the text between the first and last `"` of a line containing the
/// include token, or `None` when the token or a quoted pair is missing.
pub fn parse_include(line: &str) -> Option<String> {
    if !line.contains(INCLUDE_TOKEN) {
        return None;
    }
    let first = line.find('"')?;
    let last = line.rfind('"')?;
    if last <= first + 1 {
        return None;
    }
    Some(line[first + 1..last].to_string())
}

/// Source of pipeline descriptions and shader files
pub trait SourceProvider {
    /// Read the text stored at `path`
    fn read(&self, path: &str) -> PipelineResult<String>;
}

/// Reads sources from the file system below a root directory
#[derive(Debug, Clone)]
pub struct FsSourceProvider {
    root: PathBuf,
}

impl FsSourceProvider {
    /// Provider resolving paths against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl SourceProvider for FsSourceProvider {
    fn read(&self, path: &str) -> PipelineResult<String> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PipelineError::SourceNotFound(full.display().to_string())
            } else {
                PipelineError::Io {
                    path: full.display().to_string(),
                    source,
                }
            }
        })
    }
}

/// In-memory sources keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemorySourceProvider {
    files: HashMap<String, String>,
}

impl MemorySourceProvider {
    /// Empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Add or replace a file in place
    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }
}

impl SourceProvider for MemorySourceProvider {
    fn read(&self, path: &str) -> PipelineResult<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| PipelineError::SourceNotFound(path.to_string()))
    }
}

/// Read `path` and expand its `#include` lines recursively
pub fn expand_includes(provider: &dyn SourceProvider, path: &str) -> PipelineResult<String> {
    let mut stack = Vec::new();
    expand_into(provider, path, &mut stack)
}

fn expand_into(
    provider: &dyn SourceProvider,
    path: &str,
    stack: &mut Vec<String>,
) -> PipelineResult<String> {
    if stack.iter().any(|p| p == path) {
        return Err(PipelineError::IncludeCycle {
            path: path.to_string(),
        });
    }
    stack.push(path.to_string());

    let text = provider.read(path)?;
    let mut out = String::with_capacity(text.len());
    for (index, line) in text.lines().enumerate() {
        if line.contains(INCLUDE_TOKEN) {
            let include = parse_include(line).ok_or_else(|| PipelineError::MalformedInclude {
                file: path.to_string(),
                line: index + 1,
            })?;
            out.push_str(&expand_into(provider, &include, stack)?);
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }

    stack.pop();
    Ok(out)
}

/// Pass being assembled between `pass` and `end`
struct PassDraft {
    start_line: usize,
    name: String,
    pass: RenderPass,
    shader: Option<Shader>,
}

/// Assembles one pipeline from descriptions
pub struct PipelineBuilder {
    pipeline: Option<Pipeline>,
    max_passes: u32,
    provider: Box<dyn SourceProvider>,
}

impl PipelineBuilder {
    /// Builder reading sources through `provider`
    pub fn new(provider: impl SourceProvider + 'static) -> Self {
        Self {
            pipeline: None,
            max_passes: DEFAULT_MAX_PASSES,
            provider: Box::new(provider),
        }
    }

    /// Builder reading from the configured include root with the configured pass ceiling
    ///
    /// The configuration is validated first.
    pub fn from_config(config: &RenderCoreConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self::new(FsSourceProvider::new(config.shader_include_root.clone()))
            .with_max_passes(config.max_pass_count))
    }

    /// Set the pass id ceiling of pipelines created afterwards
    pub fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Start a pipeline named `name`
    ///
    /// Does nothing while a pipeline exists; call [`PipelineBuilder::destroy`]
    /// first to rebuild.
    pub fn create(&mut self, name: &str) -> &mut Self {
        if self.pipeline.is_none() {
            log::debug!("Creating pipeline '{}'", name);
            self.pipeline = Some(Pipeline::with_max_passes(name, self.max_passes));
        }
        self
    }

    /// Drop the current pipeline
    pub fn destroy(&mut self) {
        self.pipeline = None;
    }

    /// Current pipeline
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    /// Hand out the current pipeline, leaving the builder empty
    pub fn take(&mut self) -> Option<Pipeline> {
        self.pipeline.take()
    }

    /// Read a description through the provider and load it
    pub fn load_file(&mut self, path: &str) -> PipelineResult<()> {
        let description = self.provider.read(path)?;
        self.load(&description)
    }

    /// Create and fill one of the built-in pipelines
    pub fn build_default(&mut self, name: &str) -> PipelineResult<()> {
        let description = match name {
            DEFAULT_3D => DEFAULT_3D_DESCRIPTION,
            DEFAULT_2D => DEFAULT_2D_DESCRIPTION,
            other => return Err(PipelineError::UnknownDefault(other.to_string())),
        };
        self.create(name);
        self.load(description)
    }

    /// Build the default pipeline named by `config` and hand it out
    pub fn build_configured(&mut self, config: &RenderCoreConfig) -> PipelineResult<Pipeline> {
        self.destroy();
        self.build_default(&config.default_pipeline)?;
        self.take().ok_or(PipelineError::NoPipeline)
    }

    /// Append the passes of `description` to the current pipeline
    ///
    /// Passes are validated as a whole: on error the pipeline is left
    /// unchanged.
    pub fn load(&mut self, description: &str) -> PipelineResult<()> {
        let max_passes = match &self.pipeline {
            Some(pipeline) => pipeline.max_passes(),
            None => return Err(PipelineError::NoPipeline),
        };
        let pipeline_name = self.pipeline.as_ref().map(|p| p.name().to_string()).unwrap_or_default();

        let mut staged = Pipeline::with_max_passes(pipeline_name.as_str(), max_passes);
        if let Some(existing) = &self.pipeline {
            for pass in existing.passes() {
                staged
                    .add_pass(pass.clone())
                    .map_err(|source| PipelineError::Pass { line: 0, source })?;
            }
        }

        let mut preamble = String::new();
        let mut draft: Option<PassDraft> = None;

        for (index, raw) in description.lines().enumerate() {
            let line_no = index + 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with(INCLUDE_TOKEN) {
                let path = parse_include(line).ok_or_else(|| PipelineError::MalformedInclude {
                    file: "<description>".to_string(),
                    line: line_no,
                })?;
                preamble.push_str(&expand_includes(self.provider.as_ref(), &path)?);
                continue;
            }

            let mut words = line.split_whitespace();
            let directive = words.next().unwrap_or_default();
            let args: Vec<&str> = words.collect();

            match directive {
                "pass" => {
                    if let Some(open) = &draft {
                        return Err(syntax(
                            line_no,
                            format!("pass '{}' opened on line {} is not closed", open.name, open.start_line),
                        ));
                    }
                    let name = single_arg(line_no, directive, &args)?;
                    let id = parse_pass_id(name)
                        .ok_or_else(|| syntax(line_no, format!("unknown pass '{}'", name)))?;
                    draft = Some(PassDraft {
                        start_line: line_no,
                        name: name.to_string(),
                        pass: RenderPass::create(id, None),
                        shader: None,
                    });
                }
                "end" => {
                    let open = draft
                        .take()
                        .ok_or_else(|| syntax(line_no, "'end' without an open pass"))?;
                    let mut pass = open.pass;
                    if let Some(shader) = open.shader {
                        pass.set_shader(Some(Shared::new(shader)));
                    }
                    staged
                        .add_pass(pass)
                        .map_err(|source| PipelineError::Pass { line: line_no, source })?;
                }
                _ => {
                    let open = draft.as_mut().ok_or_else(|| {
                        syntax(line_no, format!("'{}' outside of a pass block", directive))
                    })?;
                    apply_directive(
                        open,
                        directive,
                        &args,
                        line_no,
                        &pipeline_name,
                        &preamble,
                        self.provider.as_ref(),
                    )?;
                }
            }
        }

        if let Some(open) = draft {
            return Err(syntax(
                open.start_line,
                format!("pass '{}' is missing 'end'", open.name),
            ));
        }

        log::debug!(
            "Pipeline '{}' loaded with {} passes",
            staged.name(),
            staged.pass_count()
        );
        self.pipeline = Some(staged);
        Ok(())
    }
}

fn apply_directive(
    draft: &mut PassDraft,
    directive: &str,
    args: &[&str],
    line: usize,
    pipeline_name: &str,
    preamble: &str,
    provider: &dyn SourceProvider,
) -> PipelineResult<()> {
    let states = draft.pass.states_mut();
    match directive {
        "shader" => {
            if args.len() != 2 {
                return Err(syntax(line, "expected 'shader <stage> \"<path>\"'"));
            }
            let stage = ShaderType::from_keyword(args[0])
                .ok_or_else(|| syntax(line, format!("unknown shader stage '{}'", args[0])))?;
            let path = unquote(args[1])
                .ok_or_else(|| syntax(line, "shader path must be quoted"))?;

            let mut source = preamble.to_string();
            source.push_str(&expand_includes(provider, path)?);

            let shader_name = format!("{}.{}", pipeline_name, draft.name);
            draft
                .shader
                .get_or_insert_with(|| Shader::new(shader_name))
                .set_source(stage, source);
        }
        "polygon" => {
            let mode = match single_arg(line, directive, args)? {
                "point" => PolygonMode::Point,
                "line" => PolygonMode::Line,
                "fill" => PolygonMode::Fill,
                other => return Err(unknown_value(line, directive, other)),
            };
            states.polygon = PolygonState::new(mode);
        }
        "cull" => {
            if args.len() != 2 {
                return Err(syntax(line, "expected 'cull <cw|ccw|off> <front|back|front_and_back>'"));
            }
            let mode = match args[0] {
                "cw" => CullMode::Cw,
                "ccw" => CullMode::Ccw,
                "off" => CullMode::Off,
                other => return Err(unknown_value(line, directive, other)),
            };
            let face = match args[1] {
                "front" => CullFace::Front,
                "back" => CullFace::Back,
                "front_and_back" => CullFace::FrontAndBack,
                other => return Err(unknown_value(line, directive, other)),
            };
            states.cull = CullState::new(mode, face);
        }
        "blend" => {
            let func = match single_arg(line, directive, args)? {
                "none" => BlendFunc::None,
                "add" => BlendFunc::Add,
                "subtract" => BlendFunc::Subtract,
                "reverse_subtract" => BlendFunc::ReverseSubtract,
                "min" => BlendFunc::Min,
                "max" => BlendFunc::Max,
                "off" => BlendFunc::Off,
                other => return Err(unknown_value(line, directive, other)),
            };
            states.blend = BlendState::new(func);
        }
        "clear" => {
            let mut clear = ClearState::empty();
            for arg in args {
                clear |= match *arg {
                    "color" => ClearState::COLOR,
                    "depth" => ClearState::DEPTH,
                    "stencil" => ClearState::STENCIL,
                    "none" => ClearState::empty(),
                    other => return Err(unknown_value(line, directive, other)),
                };
            }
            states.clear = clear;
        }
        "depth" => {
            if args.len() != 2 {
                return Err(syntax(line, "expected 'depth <enabled|disabled> <func>'"));
            }
            let enabled = match args[0] {
                "enabled" => true,
                "disabled" => false,
                other => return Err(unknown_value(line, directive, other)),
            };
            let func = parse_compare(args[1]).ok_or_else(|| unknown_value(line, directive, args[1]))?;
            states.depth = DepthState::new(enabled, func);
        }
        "sampler" => {
            if args.len() != 2 {
                return Err(syntax(line, "expected 'sampler <target> <stage>'"));
            }
            let target = match args[0] {
                "texture1d" => TextureTarget::Texture1D,
                "texture2d" => TextureTarget::Texture2D,
                "texture3d" => TextureTarget::Texture3D,
                other => return Err(unknown_value(line, directive, other)),
            };
            let stage = args[1]
                .parse::<u32>()
                .map_err(|_| unknown_value(line, directive, args[1]))?;
            states.sampler = SamplerState::new(target, stage);
        }
        "stencil" => {
            if args.len() != 3 {
                return Err(syntax(line, "expected 'stencil <func> <ref> <mask>'"));
            }
            let func = parse_compare(args[0]).ok_or_else(|| unknown_value(line, directive, args[0]))?;
            let reference = args[1]
                .parse::<i32>()
                .map_err(|_| unknown_value(line, directive, args[1]))?;
            let mask = parse_mask(args[2]).ok_or_else(|| unknown_value(line, directive, args[2]))?;
            states.stencil = StencilState::default().with_func(func, reference, mask);
        }
        other => return Err(syntax(line, format!("unknown directive '{}'", other))),
    }
    Ok(())
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn syntax(line: usize, message: impl Into<String>) -> PipelineError {
    PipelineError::Syntax {
        line,
        message: message.into(),
    }
}

fn unknown_value(line: usize, directive: &str, value: &str) -> PipelineError {
    syntax(line, format!("invalid value '{}' for '{}'", value, directive))
}

fn single_arg<'a>(line: usize, directive: &str, args: &[&'a str]) -> PipelineResult<&'a str> {
    match args {
        [arg] => Ok(arg),
        _ => Err(syntax(line, format!("'{}' takes exactly one argument", directive))),
    }
}

fn unquote(arg: &str) -> Option<&str> {
    arg.strip_prefix('"')?.strip_suffix('"')
}

fn parse_pass_id(name: &str) -> Option<PassId> {
    match name {
        "RenderPass" => Some(PassId::RENDER),
        "UiPass" => Some(PassId::UI),
        "DbgPass" => Some(PassId::DBG),
        number => number.parse::<u32>().ok().map(PassId),
    }
}

fn parse_compare(word: &str) -> Option<CompareFunc> {
    Some(match word {
        "always" => CompareFunc::Always,
        "never" => CompareFunc::Never,
        "less" => CompareFunc::Less,
        "equal" => CompareFunc::Equal,
        "lequal" => CompareFunc::LessEqual,
        "greater" => CompareFunc::Greater,
        "notequal" => CompareFunc::NotEqual,
        "gequal" => CompareFunc::GreaterEqual,
        _ => return None,
    })
}

fn parse_mask(word: &str) -> Option<u8> {
    match word.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => word.parse::<u8>().ok(),
    }
}
