//! Material system for rendering
//!
//! Materials arrive already parsed from the asset layer. The render core
//! needs the data the device binds: shader, textures, colors and uniform
//! parameters. Draws are batched by the [`Shared`] handle a material lives
//! in, not by its name: two materials may share a name.

use crate::foundation::math::{Color4, Mat4, Vec3, Vec4};
use crate::foundation::object::{Object, ObjectId, Shared};

use super::shader::Shader;

/// Name-derived identity of a material, used for lookup by name
pub type MaterialId = ObjectId;

/// Color slots of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialColor {
    /// Diffuse color
    Diffuse,
    /// Specular color
    Specular,
    /// Ambient color
    Ambient,
    /// Emissive color
    Emission,
}

impl MaterialColor {
    /// Number of color slots
    pub const COUNT: usize = 4;
}

/// Scalar material parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialParameter {
    /// Specular exponent
    Shininess,
    /// Specular strength multiplier
    ShininessStrength,
}

/// Texture referenced by a material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRef {
    /// Texture name
    pub name: String,
    /// Asset location the texture was loaded from
    pub uri: String,
}

impl TextureRef {
    /// Texture reference by name and location
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
        }
    }
}

/// Value of a uniform parameter
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 3-component vector
    Vec3(Vec3),
    /// 4-component vector
    Vec4(Vec4),
    /// 4x4 matrix
    Mat4(Mat4),
}

/// Named uniform value bound with a material
#[derive(Debug, Clone, PartialEq)]
pub struct UniformVar {
    /// Uniform name in the shader
    pub name: String,
    /// Bound value
    pub value: UniformValue,
}

/// Surface description bound by the device before a draw
///
/// Not `Clone`: materials are shared through [`Shared`] handles.
#[derive(Debug)]
pub struct Material {
    object: Object,
    uri: String,
    textures: Vec<TextureRef>,
    shader: Option<Shared<Shader>>,
    parameters: Vec<UniformVar>,
    colors: [Color4; MaterialColor::COUNT],
    shininess: f32,
    shininess_strength: f32,
}

impl Material {
    /// Material named `name`, loaded from `uri`
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            object: Object::new(name),
            uri: uri.into(),
            textures: Vec::new(),
            shader: None,
            parameters: Vec::new(),
            colors: [[1.0, 1.0, 1.0, 1.0]; MaterialColor::COUNT],
            shininess: 0.0,
            shininess_strength: 0.0,
        }
    }

    /// Material name
    pub fn name(&self) -> &str {
        self.object.name()
    }

    /// Identity derived from the name
    pub fn id(&self) -> MaterialId {
        self.object.id()
    }

    /// Asset location the material came from
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Assign a shader, replacing the previous one
    pub fn set_shader(&mut self, shader: Shared<Shader>) {
        if let Some(old) = self.shader.replace(shader) {
            old.release();
        }
    }

    /// Builder form of [`Material::set_shader`]
    pub fn with_shader(mut self, shader: Shared<Shader>) -> Self {
        self.set_shader(shader);
        self
    }

    /// Assigned shader
    pub fn shader(&self) -> Option<&Shared<Shader>> {
        self.shader.as_ref()
    }

    /// Whether a shader is assigned
    pub fn has_shader(&self) -> bool {
        self.shader.is_some()
    }

    /// Set one color slot
    pub fn set_color(&mut self, slot: MaterialColor, color: Color4) {
        self.colors[slot as usize] = color;
    }

    /// Color of one slot
    pub fn color(&self, slot: MaterialColor) -> Color4 {
        self.colors[slot as usize]
    }

    /// Set a scalar parameter
    pub fn set_float_parameter(&mut self, parameter: MaterialParameter, value: f32) {
        match parameter {
            MaterialParameter::Shininess => self.shininess = value,
            MaterialParameter::ShininessStrength => self.shininess_strength = value,
        }
    }

    /// Scalar parameter value
    pub fn float_parameter(&self, parameter: MaterialParameter) -> f32 {
        match parameter {
            MaterialParameter::Shininess => self.shininess,
            MaterialParameter::ShininessStrength => self.shininess_strength,
        }
    }

    /// Attach a texture
    pub fn add_texture(&mut self, texture: TextureRef) {
        self.textures.push(texture);
    }

    /// Attached textures in binding order
    pub fn textures(&self) -> &[TextureRef] {
        &self.textures
    }

    /// Set a uniform, replacing an existing one with the same name
    pub fn set_uniform(&mut self, name: impl Into<String>, value: UniformValue) {
        let name = name.into();
        match self.parameters.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.parameters.push(UniformVar { name, value }),
        }
    }

    /// Uniform parameters in insertion order
    pub fn uniforms(&self) -> &[UniformVar] {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_identity_from_name() {
        let a = Material::new("brick", "assets/brick.mat");
        let b = Material::new("brick", "other/brick.mat");
        assert_eq!(a.id(), b.id());
        assert_eq!(a.uri(), "assets/brick.mat");
    }

    #[test]
    fn test_colors_default_to_white() {
        let mut material = Material::new("m", "");
        assert_eq!(material.color(MaterialColor::Ambient), [1.0, 1.0, 1.0, 1.0]);

        material.set_color(MaterialColor::Diffuse, [0.5, 0.0, 0.0, 1.0]);
        assert_eq!(material.color(MaterialColor::Diffuse), [0.5, 0.0, 0.0, 1.0]);
        assert_eq!(material.color(MaterialColor::Specular), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_float_parameters() {
        let mut material = Material::new("m", "");
        material.set_float_parameter(MaterialParameter::Shininess, 32.0);
        material.set_float_parameter(MaterialParameter::ShininessStrength, 0.8);
        assert_eq!(material.float_parameter(MaterialParameter::Shininess), 32.0);
        assert_eq!(material.float_parameter(MaterialParameter::ShininessStrength), 0.8);
    }

    #[test]
    fn test_shader_replacement_releases_previous() {
        let first = Shared::new(Shader::new("first"));
        let second = Shared::new(Shader::new("second"));

        let mut material = Material::new("m", "").with_shader(first.acquire());
        assert_eq!(first.ref_count(), 2);

        material.set_shader(second.acquire());
        assert_eq!(first.ref_count(), 1);
        assert_eq!(material.shader().map(|s| s.name()), Some("second"));
    }

    #[test]
    fn test_uniform_overwrite_keeps_order() {
        let mut material = Material::new("m", "");
        material.set_uniform("time", UniformValue::Float(0.0));
        material.set_uniform("tint", UniformValue::Vec3(Vec3::new(1.0, 0.0, 0.0)));
        material.set_uniform("time", UniformValue::Float(2.5));

        let uniforms = material.uniforms();
        assert_eq!(uniforms.len(), 2);
        assert_eq!(uniforms[0].name, "time");
        assert_eq!(uniforms[0].value, UniformValue::Float(2.5));
    }
}
