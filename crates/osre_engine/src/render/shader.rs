//! Shader descriptions
//!
//! A [`Shader`] is the CPU-side description of a shader program: one source
//! per stage plus the vertex attributes and uniform buffers the program
//! expects. Compilation happens in the device when a pipeline is installed.

use std::fmt;

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderType {
    /// Runs once per vertex
    Vertex,
    /// Runs once per primitive
    Geometry,
    /// Tessellation evaluation
    Tessellation,
    /// Runs once per fragment
    Fragment,
}

impl ShaderType {
    /// Number of stages
    pub const COUNT: usize = 4;

    /// All stages in pipeline order
    pub const ALL: [ShaderType; Self::COUNT] = [
        ShaderType::Vertex,
        ShaderType::Geometry,
        ShaderType::Tessellation,
        ShaderType::Fragment,
    ];

    /// Stage a shader file belongs to, derived from its extension
    ///
    /// Accepts the extension with or without the leading dot.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "vs" | "vert" => Some(ShaderType::Vertex),
            "gs" | "geom" => Some(ShaderType::Geometry),
            "ts" | "tesc" | "tese" => Some(ShaderType::Tessellation),
            "fs" | "frag" => Some(ShaderType::Fragment),
            _ => None,
        }
    }

    /// Stage keyword as written in pipeline descriptions
    pub fn keyword(self) -> &'static str {
        match self {
            ShaderType::Vertex => "vertex",
            ShaderType::Geometry => "geometry",
            ShaderType::Tessellation => "tessellation",
            ShaderType::Fragment => "fragment",
        }
    }

    /// Parse a stage keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.keyword() == keyword)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ShaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Shader program description
#[derive(Debug, PartialEq, Eq)]
pub struct Shader {
    name: String,
    sources: [Option<String>; ShaderType::COUNT],
    vertex_attributes: Vec<String>,
    uniform_buffers: Vec<String>,
}

impl Shader {
    /// Empty shader with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Default::default(),
            vertex_attributes: Vec::new(),
            uniform_buffers: Vec::new(),
        }
    }

    /// Shader name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the source of one stage, replacing any previous source
    pub fn set_source(&mut self, stage: ShaderType, source: impl Into<String>) {
        self.sources[stage.index()] = Some(source.into());
    }

    /// Builder form of [`Shader::set_source`]
    pub fn with_source(mut self, stage: ShaderType, source: impl Into<String>) -> Self {
        self.set_source(stage, source);
        self
    }

    /// Whether a non-empty source is assigned to `stage`
    pub fn has_source(&self, stage: ShaderType) -> bool {
        self.sources[stage.index()]
            .as_deref()
            .is_some_and(|src| !src.is_empty())
    }

    /// Source assigned to `stage`
    pub fn source(&self, stage: ShaderType) -> Option<&str> {
        self.sources[stage.index()].as_deref()
    }

    /// Stages with a source, in pipeline order
    pub fn stages(&self) -> impl Iterator<Item = ShaderType> + '_ {
        ShaderType::ALL.into_iter().filter(|stage| self.has_source(*stage))
    }

    /// Append a vertex attribute; its location is its insertion index
    pub fn add_vertex_attribute(&mut self, name: impl Into<String>) {
        self.vertex_attributes.push(name.into());
    }

    /// Append several vertex attributes in order
    pub fn add_vertex_attributes<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vertex_attributes.extend(names.into_iter().map(Into::into));
    }

    /// Number of vertex attributes
    pub fn vertex_attribute_count(&self) -> usize {
        self.vertex_attributes.len()
    }

    /// Vertex attribute at `location`
    pub fn vertex_attribute_at(&self, location: usize) -> Option<&str> {
        self.vertex_attributes.get(location).map(String::as_str)
    }

    /// Location of the named vertex attribute
    pub fn location(&self, attribute: &str) -> Option<usize> {
        self.vertex_attributes.iter().position(|a| a == attribute)
    }

    /// Append a uniform buffer
    pub fn add_uniform_buffer(&mut self, name: impl Into<String>) {
        self.uniform_buffers.push(name.into());
    }

    /// Number of uniform buffers
    pub fn uniform_buffer_count(&self) -> usize {
        self.uniform_buffers.len()
    }

    /// Uniform buffer at `index`
    pub fn uniform_buffer_at(&self, index: usize) -> Option<&str> {
        self.uniform_buffers.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_from_extension() {
        assert_eq!(ShaderType::from_extension("vs"), Some(ShaderType::Vertex));
        assert_eq!(ShaderType::from_extension(".frag"), Some(ShaderType::Fragment));
        assert_eq!(ShaderType::from_extension("GS"), Some(ShaderType::Geometry));
        assert_eq!(ShaderType::from_extension("tesc"), Some(ShaderType::Tessellation));
        assert_eq!(ShaderType::from_extension("glsl"), None);
    }

    #[test]
    fn test_sources_per_stage() {
        let shader = Shader::new("default")
            .with_source(ShaderType::Vertex, "void main() {}")
            .with_source(ShaderType::Fragment, "void main() {}");

        assert!(shader.has_source(ShaderType::Vertex));
        assert!(!shader.has_source(ShaderType::Geometry));
        assert_eq!(
            shader.stages().collect::<Vec<_>>(),
            vec![ShaderType::Vertex, ShaderType::Fragment]
        );
    }

    #[test]
    fn test_empty_source_does_not_count() {
        let shader = Shader::new("empty").with_source(ShaderType::Vertex, "");
        assert!(!shader.has_source(ShaderType::Vertex));
        assert_eq!(shader.source(ShaderType::Vertex), Some(""));
    }

    #[test]
    fn test_vertex_attribute_locations() {
        let mut shader = Shader::new("lit");
        shader.add_vertex_attributes(["position", "normal", "texcoord0"]);

        assert_eq!(shader.vertex_attribute_count(), 3);
        assert_eq!(shader.location("normal"), Some(1));
        assert_eq!(shader.location("color"), None);
        assert_eq!(shader.vertex_attribute_at(2), Some("texcoord0"));
    }

    #[test]
    fn test_uniform_buffers() {
        let mut shader = Shader::new("lit");
        shader.add_uniform_buffer("MVP");
        assert_eq!(shader.uniform_buffer_count(), 1);
        assert_eq!(shader.uniform_buffer_at(0), Some("MVP"));
        assert_eq!(shader.uniform_buffer_at(1), None);
    }

    #[test]
    fn test_keyword_round_trip() {
        for stage in ShaderType::ALL {
            assert_eq!(ShaderType::from_keyword(stage.keyword()), Some(stage));
        }
    }
}
